pub mod api;
pub mod assembler;
pub mod config;
pub mod content;
pub mod error;
pub mod ffmpeg;
pub mod generator;
pub mod init;
pub mod progress;
pub mod sequencer;
pub mod slide;
pub mod storyboard;
pub mod text_wrap;
pub mod timeline;

pub use error::{Result, ShortsError};

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("[{}] {}", tag, message),
        _ => tracing::info!("[{}] {}", tag, message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
