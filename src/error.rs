use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShortsError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cannot decode image {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("not enough valid images: have {have}, need {need}")]
    InsufficientImages { have: usize, need: usize },

    #[error("media write error: {0}")]
    MediaWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ShortsError>;
