pub mod image_search;
pub mod voicerss;

use crate::config::Settings;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use image_search::ImageSearchClient;
pub use voicerss::VoiceRssClient;

/// Remote image search plus download/validation of the results.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch_images(&self, query: &str, num: u32) -> Result<Vec<String>>;

    async fn download_images(&self, urls: &[String], dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Text-to-speech into an audio file at `out_path`.
#[async_trait]
pub trait SpeechSource: Send + Sync {
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<()>;
}

pub fn http_client(settings: &Settings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .connect_timeout(Duration::from_secs(settings.http_timeout_secs.min(30)))
        .build()?;
    Ok(client)
}
