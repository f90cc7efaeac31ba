//! Speech synthesis, token cache and recognition against mock vendors
//!
//! Runs without audio hardware: the local engine and player are fakes.

use std::sync::Arc;

use base64::Engine;
use tokio_test::{assert_err, assert_ok};
use tour_guide::config::{BaiduCredentials, Endpoints};
use tour_guide::signing::{self, SigningRequest};
use tour_guide::voice::tencent::TencentTts;
use tour_guide::voice::{AudioPlayer, SpeechRecognizer, TokenCache};
use tour_guide::{Error, VoiceConfig};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{
    BrokenPlayer, FakePlayer, FakeSpeech, HoldingPlayer, baidu_voice, dispatcher,
    dispatcher_with_player, mount_baidu_token, tencent_voice, write_wav,
};

const MP3_BYTES: &[u8] = b"ID3\x04\x00fake-mp3-frames";

fn credentials(api_key: &str) -> BaiduCredentials {
    BaiduCredentials {
        api_key: api_key.into(),
        secret_key: "sk-test".into(),
    }
}

fn token_response(token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": token,
        "expires_in": expires_in,
        "scope": "audio_voice_assistant_get audio_tts_post"
    }))
}

fn tencent_audio(bytes: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "Response": {
            "Audio": base64::engine::general_purpose::STANDARD.encode(bytes),
            "SessionId": "session-1",
            "RequestId": "req-1"
        }
    }))
}

// Token cache

#[tokio::test]
async fn test_token_is_cached_until_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .and(query_param("grant_type", "client_credentials"))
        .and(query_param("client_id", "ak-test"))
        .and(query_param("client_secret", "sk-test"))
        .respond_with(token_response("tok-1", 2_592_000))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TokenCache::new(reqwest::Client::new(), format!("{}/oauth/2.0/token", server.uri()));
    let first = assert_ok!(cache.get_token(&credentials("ak-test")).await);
    let second = assert_ok!(cache.get_token(&credentials("ak-test")).await);
    assert_eq!(first, "tok-1");
    assert_eq!(second, "tok-1");

    let cached = cache.cached().await.unwrap();
    assert!(cached.expiry_epoch_millis > chrono::Utc::now().timestamp_millis());
}

#[tokio::test]
async fn test_expired_token_is_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .respond_with(token_response("short-lived", 0))
        .expect(2)
        .mount(&server)
        .await;

    let cache = TokenCache::new(reqwest::Client::new(), format!("{}/oauth/2.0/token", server.uri()));
    assert_ok!(cache.get_token(&credentials("ak-test")).await);
    assert_ok!(cache.get_token(&credentials("ak-test")).await);
}

#[tokio::test]
async fn test_changed_credentials_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .and(query_param("client_id", "ak-one"))
        .respond_with(token_response("tok-one", 2_592_000))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .and(query_param("client_id", "ak-two"))
        .respond_with(token_response("tok-two", 2_592_000))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TokenCache::new(reqwest::Client::new(), format!("{}/oauth/2.0/token", server.uri()));
    assert_eq!(assert_ok!(cache.get_token(&credentials("ak-one")).await), "tok-one");
    assert_eq!(assert_ok!(cache.get_token(&credentials("ak-two")).await), "tok-two");
}

#[tokio::test]
async fn test_token_missing_expiry_defaults_to_thirty_days() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "tok"})))
        .mount(&server)
        .await;

    let cache = TokenCache::new(reqwest::Client::new(), format!("{}/oauth/2.0/token", server.uri()));
    assert_ok!(cache.get_token(&credentials("ak-test")).await);

    let remaining = cache.cached().await.unwrap().expiry_epoch_millis - chrono::Utc::now().timestamp_millis();
    let twenty_nine_days = 29 * 24 * 60 * 60 * 1000;
    assert!(remaining > twenty_nine_days);
}

#[tokio::test]
async fn test_token_rejection_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "unknown client id"
        })))
        .mount(&server)
        .await;

    let cache = TokenCache::new(reqwest::Client::new(), format!("{}/oauth/2.0/token", server.uri()));
    let err = assert_err!(cache.get_token(&credentials("bad")).await);
    assert!(matches!(&err, Error::Auth(msg) if msg.contains("unknown client id")), "got {err:?}");
    assert!(cache.cached().await.is_none());
}

#[tokio::test]
async fn test_token_without_access_token_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"expires_in": 100})))
        .mount(&server)
        .await;

    let cache = TokenCache::new(reqwest::Client::new(), format!("{}/oauth/2.0/token", server.uri()));
    let err = assert_err!(cache.get_token(&credentials("ak-test")).await);
    assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
}

// Baidu synthesis

#[tokio::test]
async fn test_baidu_truncates_long_text() {
    let server = MockServer::start().await;
    mount_baidu_token(&server, "tok-baidu").await;
    Mock::given(method("POST"))
        .and(path("/text2audio"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(MP3_BYTES, "audio/mp3"))
        .expect(1)
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeech::default());
    let player = Arc::new(FakePlayer::default());
    let dispatcher = dispatcher(&server, baidu_voice(), &speech, &player, cache_dir.path());

    let completion = assert_ok!(dispatcher.speak(&"a".repeat(2000)).await);
    assert_ok!(completion.wait().await);

    let requests = server.received_requests().await.unwrap();
    let synthesis = requests
        .iter()
        .find(|r| r.url.path() == "/text2audio")
        .unwrap();
    let body = String::from_utf8(synthesis.body.clone()).unwrap();
    assert!(body.starts_with(&format!("tex={}&tok=tok-baidu&", "a".repeat(1024))));
    assert!(body.contains("&lan=zh&"));
    assert!(body.ends_with("&aue=3"));

    // Played once, then the temporary file is gone
    let played = player.played();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].1, MP3_BYTES);
    assert!(!played[0].0.exists());
    assert!(speech.spoken().is_empty());
}

#[tokio::test]
async fn test_baidu_empty_text_makes_no_request() {
    let server = MockServer::start().await;

    let cache_dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeech::default());
    let player = Arc::new(FakePlayer::default());
    let dispatcher = dispatcher(&server, baidu_voice(), &speech, &player, cache_dir.path());

    let completion = assert_ok!(dispatcher.speak("").await);
    assert_ok!(completion.wait().await);

    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(player.played().is_empty());
    assert!(speech.spoken().is_empty());
}

#[tokio::test]
async fn test_baidu_error_payload_falls_back_to_local() {
    let server = MockServer::start().await;
    mount_baidu_token(&server, "tok-baidu").await;
    Mock::given(method("POST"))
        .and(path("/text2audio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "err_no": 502,
            "err_msg": "access token invalid or no longer valid",
            "tts_logid": 1
        })))
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeech::default());
    let player = Arc::new(FakePlayer::default());
    let dispatcher = dispatcher(&server, baidu_voice(), &speech, &player, cache_dir.path());

    assert_ok!(dispatcher.speak("你好").await);

    let spoken = speech.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].0, "你好");
    assert_eq!(spoken[0].1.voice.as_deref(), Some("zh-enhanced"));
    assert!(player.played().is_empty());
}

// Tencent synthesis

#[tokio::test]
async fn test_tencent_request_is_signed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tencent/tts"))
        .and(header_exists("authorization"))
        .and(header_exists("x-tc-timestamp"))
        .and(header("x-tc-action", "TextToVoice"))
        .and(header("x-tc-version", "2019-08-23"))
        .and(header("x-tc-region", "ap-guangzhou"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "Text": "欢迎来到故宫",
            "VoiceType": 1001,
            "Volume": 5,
            "Codec": "mp3",
            "SampleRate": 16000
        })))
        .respond_with(tencent_audio(MP3_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let endpoints = Endpoints::with_base(&server.uri());
    let tts = TencentTts::new(reqwest::Client::new(), endpoints.tencent_tts, endpoints.tencent_region);
    let audio = assert_ok!(tts.synthesize("欢迎来到故宫", &tencent_voice()).await);
    assert_eq!(audio, MP3_BYTES);

    // The signature covers exactly the bytes that were sent
    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let header_value = |name: &str| request.headers.get(name).unwrap().to_str().unwrap().to_string();
    let timestamp: i64 = header_value("x-tc-timestamp").parse().unwrap();
    let host = header_value("host");

    let expected = signing::sign(&SigningRequest {
        secret_id: "AKIDTEST",
        secret_key: "SECRETTEST",
        method: "POST",
        path: "/",
        content_type: "application/json",
        host: &host,
        service: "tts",
        action: "TextToVoice",
        version: "2019-08-23",
        region: "ap-guangzhou",
        body: &request.body,
        timestamp,
    })
    .unwrap();
    assert_eq!(header_value("authorization"), expected.authorization);
    assert!(expected.authorization.starts_with("TC3-HMAC-SHA256 Credential=AKIDTEST/"));
}

#[tokio::test]
async fn test_tencent_vendor_error_is_tts_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tencent/tts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Response": {
                "Error": {"Code": "AuthFailure.SignatureFailure", "Message": "signature mismatch"},
                "RequestId": "req-2"
            }
        })))
        .mount(&server)
        .await;

    let endpoints = Endpoints::with_base(&server.uri());
    let tts = TencentTts::new(reqwest::Client::new(), endpoints.tencent_tts, endpoints.tencent_region);
    let err = assert_err!(tts.synthesize("hello", &tencent_voice()).await);
    assert!(matches!(&err, Error::Tts(msg) if msg.contains("AuthFailure.SignatureFailure")), "got {err:?}");
}

#[tokio::test]
async fn test_tencent_missing_audio_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tencent/tts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"Response": {"RequestId": "r"}})))
        .mount(&server)
        .await;

    let endpoints = Endpoints::with_base(&server.uri());
    let tts = TencentTts::new(reqwest::Client::new(), endpoints.tencent_tts, endpoints.tencent_region);
    let err = assert_err!(tts.synthesize("hello", &tencent_voice()).await);
    assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
}

#[tokio::test]
async fn test_tencent_audio_is_played() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tencent/tts"))
        .respond_with(tencent_audio(MP3_BYTES))
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeech::default());
    let player = Arc::new(FakePlayer::default());
    let dispatcher = dispatcher(&server, tencent_voice(), &speech, &player, cache_dir.path());

    let completion = assert_ok!(dispatcher.speak("hello").await);
    assert_ok!(completion.wait().await);

    let played = player.played();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].1, MP3_BYTES);
    assert!(played[0].0.starts_with(cache_dir.path()));
    assert!(!played[0].0.exists());
    assert!(speech.spoken().is_empty());
}

#[tokio::test]
async fn test_tencent_failure_falls_back_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tencent/tts"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeech::default());
    let player = Arc::new(FakePlayer::default());
    let voice = VoiceConfig {
        rate: 1.5,
        ..tencent_voice()
    };
    let dispatcher = dispatcher(&server, voice, &speech, &player, cache_dir.path());

    let completion = assert_ok!(dispatcher.speak("fallback please").await);
    assert_ok!(completion.wait().await);

    let spoken = speech.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].0, "fallback please");
    assert_eq!(spoken[0].1.language, "zh-CN");
    assert!((spoken[0].1.rate - 1.5).abs() < f32::EPSILON);
    assert!(player.played().is_empty());
    assert!(!dispatcher.is_speaking().await);
}

#[tokio::test]
async fn test_stop_releases_playback_and_deletes_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tencent/tts"))
        .respond_with(tencent_audio(MP3_BYTES))
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeech::default());
    let player = Arc::new(HoldingPlayer::default());
    let dispatcher = dispatcher_with_player(
        &server,
        tencent_voice(),
        &speech,
        Arc::clone(&player) as Arc<dyn AudioPlayer>,
        cache_dir.path(),
    );

    let completion = assert_ok!(dispatcher.speak("a long story").await);
    let played = player.played();
    assert_eq!(played.len(), 1);
    assert!(played[0].exists());
    assert!(dispatcher.is_speaking().await);

    dispatcher.stop_speaking().await;
    assert_ok!(completion.wait().await);

    assert!(!played[0].exists());
    assert!(!dispatcher.is_speaking().await);
    assert!(speech.spoken().is_empty());
}

#[tokio::test]
async fn test_player_start_failure_cleans_up_and_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tencent/tts"))
        .respond_with(tencent_audio(MP3_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let cache_dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeech::default());
    let dispatcher = dispatcher_with_player(
        &server,
        tencent_voice(),
        &speech,
        Arc::new(BrokenPlayer),
        cache_dir.path(),
    );

    let completion = assert_ok!(dispatcher.speak("no speakers").await);
    assert_ok!(completion.wait().await);

    assert_eq!(speech.spoken().len(), 1);
    assert_eq!(speech.spoken()[0].0, "no speakers");
    assert_eq!(std::fs::read_dir(cache_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_disabled_voice_does_nothing() {
    let server = MockServer::start().await;

    let cache_dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeech::default());
    let player = Arc::new(FakePlayer::default());
    let voice = VoiceConfig {
        enabled: false,
        ..tencent_voice()
    };
    let dispatcher = dispatcher(&server, voice, &speech, &player, cache_dir.path());

    assert_ok!(dispatcher.speak("quiet").await);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(speech.spoken().is_empty());
}

// Recognition

fn recognizer(server: &MockServer) -> SpeechRecognizer {
    let client = reqwest::Client::new();
    let endpoints = Endpoints::with_base(&server.uri());
    let tokens = Arc::new(TokenCache::new(client.clone(), endpoints.baidu_token));
    SpeechRecognizer::new(client, endpoints.baidu_asr, tokens)
}

#[tokio::test]
async fn test_recognition_returns_first_result() {
    let server = MockServer::start().await;
    mount_baidu_token(&server, "tok-asr").await;
    Mock::given(method("POST"))
        .and(path("/server_api"))
        .and(body_partial_json(serde_json::json!({
            "format": "wav",
            "rate": 16000,
            "channel": 1,
            "token": "tok-asr",
            "dev_pid": 1537
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "corpus_no": "1",
            "err_msg": "success.",
            "err_no": 0,
            "result": ["故宫几点开门"],
            "sn": "sn-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("question.wav");
    write_wav(&wav, 16_000, 1, 1600);
    let file_len = std::fs::metadata(&wav).unwrap().len();

    let text = assert_ok!(recognizer(&server).recognize(&wav, &baidu_voice()).await);
    assert_eq!(text, "故宫几点开门");

    let requests = server.received_requests().await.unwrap();
    let asr = requests.iter().find(|r| r.url.path() == "/server_api").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&asr.body).unwrap();
    assert_eq!(body["len"], file_len);
    let speech = base64::engine::general_purpose::STANDARD
        .decode(body["speech"].as_str().unwrap())
        .unwrap();
    assert_eq!(speech, std::fs::read(&wav).unwrap());
}

#[tokio::test]
async fn test_recognition_uses_english_model() {
    let server = MockServer::start().await;
    mount_baidu_token(&server, "tok-asr").await;
    Mock::given(method("POST"))
        .and(path("/server_api"))
        .and(body_partial_json(serde_json::json!({"dev_pid": 1737})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "err_no": 0,
            "result": ["where is the exit"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("question.wav");
    write_wav(&wav, 16_000, 1, 160);

    let voice = VoiceConfig {
        language: "en-US".to_string(),
        ..baidu_voice()
    };
    let text = assert_ok!(recognizer(&server).recognize(&wav, &voice).await);
    assert_eq!(text, "where is the exit");
}

#[tokio::test]
async fn test_recognition_vendor_error() {
    let server = MockServer::start().await;
    mount_baidu_token(&server, "tok-asr").await;
    Mock::given(method("POST"))
        .and(path("/server_api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "err_no": 3301,
            "err_msg": "speech quality error."
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("noise.wav");
    // Wrong format is still submitted
    write_wav(&wav, 44_100, 2, 882);

    let err = assert_err!(recognizer(&server).recognize(&wav, &baidu_voice()).await);
    assert!(matches!(&err, Error::Recognition(msg) if msg.contains("speech quality error")), "got {err:?}");
}

#[tokio::test]
async fn test_recognition_empty_result() {
    let server = MockServer::start().await;
    mount_baidu_token(&server, "tok-asr").await;
    Mock::given(method("POST"))
        .and(path("/server_api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "err_no": 0,
            "err_msg": "success.",
            "result": []
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("silence.wav");
    write_wav(&wav, 16_000, 1, 160);

    let err = assert_err!(recognizer(&server).recognize(&wav, &baidu_voice()).await);
    assert!(matches!(err, Error::Recognition(_)), "got {err:?}");
}
