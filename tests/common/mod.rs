//! Shared test utilities
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tour_guide::config::{BaiduCredentials, Endpoints, TencentCredentials, TtsVendor};
use tour_guide::voice::{
    AudioPlayer, PlatformSpeech, PlaybackHandle, SpeechDispatcher, SystemVoice, TokenCache,
    Utterance, VoiceQuality,
};
use tour_guide::{DbPool, VoiceConfig, db};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Voice settings for the Tencent backend with test credentials
pub fn tencent_voice() -> VoiceConfig {
    VoiceConfig {
        provider: TtsVendor::Tencent,
        voice: "1001".to_string(),
        tencent: Some(TencentCredentials {
            secret_id: "AKIDTEST".into(),
            secret_key: "SECRETTEST".into(),
        }),
        ..VoiceConfig::default()
    }
}

/// Voice settings for the Baidu backend with test credentials
pub fn baidu_voice() -> VoiceConfig {
    VoiceConfig {
        provider: TtsVendor::Baidu,
        voice: "0".to_string(),
        baidu: Some(BaiduCredentials {
            api_key: "ak-test".into(),
            secret_key: "sk-test".into(),
        }),
        ..VoiceConfig::default()
    }
}

/// Serve a Baidu token for any credentials
pub async fn mount_baidu_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": token,
            "expires_in": 2_592_000
        })))
        .mount(server)
        .await;
}

/// Local engine stand-in that records what it was asked to say
#[derive(Default)]
pub struct FakeSpeech {
    spoken: Mutex<Vec<(String, Utterance)>>,
}

impl FakeSpeech {
    pub fn spoken(&self) -> Vec<(String, Utterance)> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformSpeech for FakeSpeech {
    async fn voices(&self) -> tour_guide::Result<Vec<SystemVoice>> {
        Ok(vec![
            SystemVoice {
                identifier: "zh-basic".to_string(),
                name: "Basic".to_string(),
                language: "zh-CN".to_string(),
                quality: VoiceQuality::Default,
            },
            SystemVoice {
                identifier: "zh-enhanced".to_string(),
                name: "Enhanced".to_string(),
                language: "zh-CN".to_string(),
                quality: VoiceQuality::Enhanced,
            },
        ])
    }

    async fn speak(&self, text: &str, utterance: &Utterance) -> tour_guide::Result<PlaybackHandle> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), utterance.clone()));
        Ok(PlaybackHandle::finished())
    }
}

/// Player stand-in that captures the file contents it was given
#[derive(Default)]
pub struct FakePlayer {
    played: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl FakePlayer {
    pub fn played(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn play(&self, path: &Path) -> tour_guide::Result<PlaybackHandle> {
        let bytes = std::fs::read(path)?;
        self.played.lock().unwrap().push((path.to_path_buf(), bytes));
        Ok(PlaybackHandle::finished())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Player that keeps playing until stopped
#[derive(Default)]
pub struct HoldingPlayer {
    played: Mutex<Vec<PathBuf>>,
}

impl HoldingPlayer {
    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioPlayer for HoldingPlayer {
    async fn play(&self, path: &Path) -> tour_guide::Result<PlaybackHandle> {
        self.played.lock().unwrap().push(path.to_path_buf());
        let (handle, mut control) = PlaybackHandle::channel();
        tokio::spawn(async move {
            control.stopped().await;
            control.finish(Ok(()));
        });
        Ok(handle)
    }

    fn name(&self) -> &'static str {
        "holding"
    }
}

/// Player that cannot start
pub struct BrokenPlayer;

#[async_trait]
impl AudioPlayer for BrokenPlayer {
    async fn play(&self, _path: &Path) -> tour_guide::Result<PlaybackHandle> {
        Err(tour_guide::Error::Audio("no output device".to_string()))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

/// Speech dispatcher whose vendors all point at `server`
pub fn dispatcher(
    server: &MockServer,
    voice: VoiceConfig,
    speech: &Arc<FakeSpeech>,
    player: &Arc<FakePlayer>,
    cache_dir: &Path,
) -> SpeechDispatcher {
    dispatcher_with_player(
        server,
        voice,
        speech,
        Arc::clone(player) as Arc<dyn AudioPlayer>,
        cache_dir,
    )
}

/// Speech dispatcher with any audio player
pub fn dispatcher_with_player(
    server: &MockServer,
    voice: VoiceConfig,
    speech: &Arc<FakeSpeech>,
    player: Arc<dyn AudioPlayer>,
    cache_dir: &Path,
) -> SpeechDispatcher {
    let client = reqwest::Client::new();
    let endpoints = Endpoints::with_base(&server.uri());
    let tokens = Arc::new(TokenCache::new(client.clone(), endpoints.baidu_token.clone()));
    SpeechDispatcher::new(
        voice,
        client,
        &endpoints,
        tokens,
        Arc::clone(speech) as Arc<dyn PlatformSpeech>,
        player,
        cache_dir,
    )
}

/// Write a silent 16-bit WAV file
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: usize) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("failed to create wav");
    for _ in 0..samples {
        writer.write_sample(0_i16).expect("failed to write sample");
    }
    writer.finalize().expect("failed to finalize wav");
}
