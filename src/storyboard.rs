use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One narration line, the picture behind it and where the rendered slide goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideSpec {
    pub text: String,
    pub image_path: PathBuf,
    pub output_slide_path: PathBuf,
}

/// A rendered slide paired with its narration. `duration` drives both the
/// on-screen time and the audio trim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub image_path: PathBuf,
    pub audio_path: PathBuf,
    pub duration: f64,
}

/// Output of the sequencer: every slide that was attempted and the clips that
/// made it through rendering, TTS and probing.
#[derive(Debug, Clone, Default)]
pub struct Storyboard {
    pub slides: Vec<SlideSpec>,
    pub clips: Vec<Clip>,
    pub audio_paths: Vec<PathBuf>,
}

impl Storyboard {
    /// Every per-slide file the run may have written, for cleanup.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.slides
            .iter()
            .map(|s| s.output_slide_path.clone())
            .chain(self.audio_paths.iter().cloned())
            .collect()
    }
}
