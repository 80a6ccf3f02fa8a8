use crate::error::{Result, ShortsError};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub meaning: String,
}

#[derive(Debug, Deserialize)]
struct QuotesRoot {
    verses: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct TitleHooksRoot {
    titles_hooks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EndSlidesRoot {
    end_slides: Vec<String>,
}

/// The batch flow's inputs: queued quotes and the two pools of framing text.
#[derive(Debug, Clone, Default)]
pub struct ContentLibrary {
    pub quotes: Vec<Quote>,
    pub title_hooks: Vec<String>,
    pub end_slides: Vec<String>,
}

impl ContentLibrary {
    pub async fn load(quotes: &Path, title_hooks: &Path, end_slides: &Path) -> Result<Self> {
        let quotes: QuotesRoot = read_json(quotes).await?;
        let hooks: TitleHooksRoot = read_json(title_hooks).await?;
        let ends: EndSlidesRoot = read_json(end_slides).await?;

        if hooks.titles_hooks.is_empty() {
            return Err(ShortsError::Config(format!(
                "{} has no titles_hooks",
                title_hooks.display()
            )));
        }
        if ends.end_slides.is_empty() {
            return Err(ShortsError::Config(format!(
                "{} has no end_slides",
                end_slides.display()
            )));
        }

        Ok(Self {
            quotes: quotes.verses,
            title_hooks: hooks.titles_hooks,
            end_slides: ends.end_slides,
        })
    }

    pub fn random_title_hook<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.title_hooks.choose(rng).map(String::as_str)
    }

    pub fn random_end_slide<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.end_slides.choose(rng).map(String::as_str)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        ShortsError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_str(&content)?)
}
