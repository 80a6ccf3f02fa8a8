use super::SpeechSource;
use crate::config::{Credentials, Settings};
use crate::error::{Result, ShortsError};
use crate::logi;
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use tokio::fs;

/// VoiceRSS answers most failures with HTTP 200 and a plain-text body starting with this.
const ERROR_PREFIX: &[u8] = b"ERROR";

pub struct VoiceRssClient {
    client: Client,
    url: String,
    key: String,
    locale: String,
    voice: String,
    codec: String,
}

impl VoiceRssClient {
    pub fn new(client: Client, settings: &Settings, credentials: &Credentials) -> Self {
        Self {
            client,
            url: settings.tts_url.clone(),
            key: credentials.voice_rss_key.clone(),
            locale: settings.tts_locale.clone(),
            voice: settings.tts_voice.clone(),
            codec: settings.tts_codec.clone(),
        }
    }
}

#[async_trait]
impl SpeechSource for VoiceRssClient {
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<()> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("key", self.key.as_str()),
                ("hl", self.locale.as_str()),
                ("v", self.voice.as_str()),
                ("c", self.codec.as_str()),
                ("src", text),
            ])
            .send()
            .await
            .map_err(|e| ShortsError::Network(format!("TTS request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ShortsError::Network(format!(
                "TTS failed HTTP {}",
                status.as_u16()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ShortsError::Network(format!("TTS response read: {e}")))?;
        if bytes.starts_with(ERROR_PREFIX) {
            return Err(ShortsError::Network(format!(
                "TTS service: {}",
                String::from_utf8_lossy(&bytes).trim()
            )));
        }
        if bytes.is_empty() {
            return Err(ShortsError::Network("TTS returned no audio".to_string()));
        }

        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(out_path, &bytes).await?;
        logi(format!("Audio saved: {}", out_path.display()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> VoiceRssClient {
        let settings = Settings {
            tts_url: format!("{}/", server.uri()),
            ..Settings::default()
        };
        let creds = Credentials {
            images_api_key: "k".to_string(),
            images_cse_id: "cx".to_string(),
            voice_rss_key: "secret".to_string(),
        };
        VoiceRssClient::new(Client::new(), &settings, &creds)
    }

    #[tokio::test]
    async fn writes_audio_bytes_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("key", "secret"))
            .and(query_param("hl", "en-ca"))
            .and(query_param("v", "Mason"))
            .and(query_param("src", "Hello there"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3fakeaudio".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a/slide_1.mp3");
        client_for(&server).synthesize("Hello there", &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"ID3fakeaudio");
    }

    #[tokio::test]
    async fn http_failure_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("slide_1.mp3");
        let err = client_for(&server).synthesize("x", &out).await.unwrap_err();
        assert!(matches!(err, ShortsError::Network(_)));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn error_body_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("ERROR: The API key is not available!"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("slide_1.mp3");
        assert!(client_for(&server).synthesize("x", &out).await.is_err());
        assert!(!out.exists());
    }
}
