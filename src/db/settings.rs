//! Settings repository for provider and voice configuration

use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::DbPool;
use crate::config::{ProviderConfig, VoiceConfig};
use crate::{Error, Result};

const PROVIDER_KEY: &str = "llm_config";
const VOICE_KEY: &str = "voice_config";

/// Persisted user settings
#[derive(Clone)]
pub struct SettingsStore {
    pool: DbPool,
}

impl SettingsStore {
    /// Create a new settings store
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Save the chat provider configuration
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn save_provider_config(&self, config: &ProviderConfig) -> Result<()> {
        self.save(PROVIDER_KEY, config)
    }

    /// Saved chat provider configuration, if any
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails or the stored value is invalid
    pub fn provider_config(&self) -> Result<Option<ProviderConfig>> {
        self.load(PROVIDER_KEY)
    }

    /// Forget the chat provider configuration
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn clear_provider_config(&self) -> Result<()> {
        self.clear(PROVIDER_KEY)
    }

    /// Save the voice configuration
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn save_voice_config(&self, config: &VoiceConfig) -> Result<()> {
        self.save(VOICE_KEY, config)
    }

    /// Saved voice configuration, if any
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails or the stored value is invalid
    pub fn voice_config(&self) -> Result<Option<VoiceConfig>> {
        self.load(VOICE_KEY)
    }

    /// Forget the voice configuration
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn clear_voice_config(&self) -> Result<()> {
        self.clear(VOICE_KEY)
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let json = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            [key, &json, &now],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(key, "settings saved");
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let json: Option<String> = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        json.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| Error::Config(format!("stored {key} is invalid: {e}")))
        })
        .transpose()
    }

    fn clear(&self, key: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute("DELETE FROM settings WHERE key = ?1", [key])
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}
