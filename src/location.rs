//! Device location passed to the model as context

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Where the traveler currently is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,

    /// Reverse-geocoded place name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
}

impl Location {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            place_name: None,
        }
    }

    #[must_use]
    pub fn with_place_name(mut self, place_name: impl Into<String>) -> Self {
        self.place_name = Some(place_name.into());
        self
    }

    /// Context line embedded in prompts
    #[must_use]
    pub fn context_line(&self) -> String {
        format!("Current location: {self}")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.place_name.as_deref().filter(|p| !p.is_empty()) {
            Some(name) => f.write_str(name),
            None => write!(f, "{}, {}", self.latitude, self.longitude),
        }
    }
}

/// Parses `lat,lon` or `lat,lon,place name`
impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ',').map(str::trim);
        let (Some(lat), Some(lon)) = (parts.next(), parts.next()) else {
            return Err(Error::Config(format!("invalid location: {s}")));
        };

        let latitude: f64 = lat
            .parse()
            .map_err(|_| Error::Config(format!("invalid latitude: {lat}")))?;
        let longitude: f64 = lon
            .parse()
            .map_err(|_| Error::Config(format!("invalid longitude: {lon}")))?;

        let mut location = Self::new(latitude, longitude);
        location.place_name = parts.next().filter(|p| !p.is_empty()).map(str::to_string);
        Ok(location)
    }
}
