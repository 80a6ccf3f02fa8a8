use crate::error::{Result, ShortsError};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

pub const ENV_IMAGES_API_KEY: &str = "IMAGES_API_KEY";
pub const ENV_IMAGES_CSE_ID: &str = "IMAGES_CSE_ID";
pub const ENV_VOICE_RSS_KEY: &str = "VOICE_RSS_KEY";

/// API credentials. Always taken from the environment, never from the settings file.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub images_api_key: String,
    pub images_cse_id: String,
    pub voice_rss_key: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds credentials from an arbitrary variable lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| -> Result<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(ShortsError::Config(format!("{name} is not set"))),
            }
        };

        Ok(Self {
            images_api_key: get(ENV_IMAGES_API_KEY)?,
            images_cse_id: get(ENV_IMAGES_CSE_ID)?,
            voice_rss_key: get(ENV_VOICE_RSS_KEY)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search_url: String,
    pub tts_url: String,
    pub tts_locale: String,
    pub tts_voice: String,
    pub tts_codec: String,
    pub http_timeout_secs: u64,
    pub images_per_query: u32,

    pub width: u32,
    pub height: u32,
    pub text_margin: u32,
    pub overlay_alpha: u8,
    pub font_path: PathBuf,
    pub font_size: f32,

    pub music_path: PathBuf,
    pub music_volume: f64,
    pub fps: u32,
    pub crossfade: bool,
    pub crossfade_padding: f64,

    pub work_dir: PathBuf,
    pub images_dir: PathBuf,
    pub output_dir: PathBuf,

    pub quotes_path: PathBuf,
    pub title_hooks_path: PathBuf,
    pub end_slides_path: PathBuf,
    pub progress_path: PathBuf,

    pub batch_topic: String,
    pub batch_output_suffix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            tts_url: "http://api.voicerss.org/".to_string(),
            tts_locale: "en-ca".to_string(),
            tts_voice: "Mason".to_string(),
            tts_codec: "MP3".to_string(),
            http_timeout_secs: 60,
            images_per_query: 10,

            width: 1080,
            height: 1920,
            text_margin: 200,
            overlay_alpha: 200,
            font_path: PathBuf::from("resources/arial.ttf"),
            font_size: 60.0,

            music_path: PathBuf::from("music/emotional-music.mp3"),
            music_volume: 0.5,
            fps: 24,
            crossfade: false,
            crossfade_padding: 1.0,

            work_dir: PathBuf::from("work"),
            images_dir: PathBuf::from("images"),
            output_dir: PathBuf::from("output"),

            quotes_path: PathBuf::from("data/quotes.json"),
            title_hooks_path: PathBuf::from("data/titles_hooks.json"),
            end_slides_path: PathBuf::from("data/end_slide.json"),
            progress_path: PathBuf::from("progress.json"),

            batch_topic: "Jesus God".to_string(),
            batch_output_suffix: "bible_quote_with_meaning".to_string(),
        }
    }
}

impl Settings {
    /// Reads settings from a JSON file. A missing file yields the defaults.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ShortsError::Config("frame size must be non-zero".to_string()));
        }
        if self.text_margin >= self.width {
            return Err(ShortsError::Config(format!(
                "text_margin {} leaves no room in a {}px frame",
                self.text_margin, self.width
            )));
        }
        if self.fps == 0 {
            return Err(ShortsError::Config("fps must be non-zero".to_string()));
        }
        if self.crossfade_padding < 0.0 {
            return Err(ShortsError::Config("crossfade_padding must be >= 0".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ShortsError::Config("http_timeout_secs must be non-zero".to_string()));
        }
        self.validate_work_dir()
    }

    /// The work dir is scratch space emptied on every run, so it must not hold
    /// or contain any other configured location.
    fn validate_work_dir(&self) -> Result<()> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(ShortsError::Config("work_dir must not be empty".to_string()));
        }
        let work = lexical_absolute(&self.work_dir);
        let guarded = [
            ("output_dir", &self.output_dir),
            ("images_dir", &self.images_dir),
            ("quotes_path", &self.quotes_path),
            ("title_hooks_path", &self.title_hooks_path),
            ("end_slides_path", &self.end_slides_path),
            ("progress_path", &self.progress_path),
            ("font_path", &self.font_path),
            ("music_path", &self.music_path),
        ];
        for (name, path) in guarded {
            if lexical_absolute(path).starts_with(&work) {
                return Err(ShortsError::Config(format!(
                    "work_dir {} would contain {} ({})",
                    self.work_dir.display(),
                    name,
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` folded away, without touching the
/// filesystem.
fn lexical_absolute(path: &Path) -> PathBuf {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in abs.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub settings: Settings,
}

impl Config {
    pub async fn load<P: AsRef<Path>>(settings_path: P) -> Result<Self> {
        let credentials = Credentials::from_env()?;
        let settings = Settings::load(settings_path).await?;
        Ok(Self { credentials, settings })
    }
}
