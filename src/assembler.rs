use crate::config::Settings;
use crate::error::{Result, ShortsError};
use crate::ffmpeg;
use crate::storyboard::Clip;
use crate::timeline::{Transition, frame_aligned, schedule};
use crate::{logi, logok, logw};
use rand::Rng;
use rand::seq::SliceRandom;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

const MUSIC_EXTENSIONS: &[&str] = &["mp3", "m4a"];

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub clips_used: usize,
    pub total_duration: f64,
    pub with_music: bool,
}

pub struct VideoAssembler {
    work_dir: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
    transition: Transition,
    music_path: PathBuf,
    music_volume: f64,
}

impl VideoAssembler {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            work_dir: settings.work_dir.clone(),
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
            transition: Transition::from_settings(settings.crossfade, settings.crossfade_padding),
            music_path: settings.music_path.clone(),
            music_volume: settings.music_volume,
        }
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// Builds one clip per slide, joins them, lays music under the result and
    /// writes `output`. Intermediate files in the work dir are removed either way.
    pub async fn assemble<R: Rng + ?Sized>(
        &self,
        clips: &[Clip],
        output: &Path,
        rng: &mut R,
    ) -> Result<AssemblyReport> {
        fs::create_dir_all(&self.work_dir).await?;
        let mut intermediates = Vec::new();
        let result = self.assemble_inner(clips, output, rng, &mut intermediates).await;
        for path in &intermediates {
            fs::remove_file(path).await.ok();
        }
        result
    }

    async fn assemble_inner<R: Rng + ?Sized>(
        &self,
        clips: &[Clip],
        output: &Path,
        rng: &mut R,
        intermediates: &mut Vec<PathBuf>,
    ) -> Result<AssemblyReport> {
        let mut parts: Vec<PathBuf> = Vec::new();
        let mut durations = Vec::new();

        for (idx, clip) in clips.iter().enumerate() {
            let part = self.work_dir.join(format!("clip_{}.mp4", idx + 1));
            intermediates.push(part.clone());
            let duration = frame_aligned(clip.duration, self.fps);
            logi(format!(
                "Building clip {}/{} ({:.2}s) -> {}",
                idx + 1,
                clips.len(),
                duration,
                part.display()
            ));
            match ffmpeg::ffmpeg_image_clip(
                &clip.image_path,
                &clip.audio_path,
                duration,
                self.width,
                self.height,
                self.fps,
                &part,
            )
            .await
            {
                Ok(()) => {
                    parts.push(part);
                    durations.push(duration);
                }
                Err(e) => logw(format!(
                    "Error processing {} or {}: {}",
                    clip.image_path.display(),
                    clip.audio_path.display(),
                    e
                )),
            }
        }

        if parts.is_empty() {
            return Err(ShortsError::MediaWrite("no valid clips to create the video".to_string()));
        }

        // A lone clip has nothing to fade into.
        let transition = if parts.len() == 1 {
            Transition::Cut
        } else {
            self.transition
        };
        let timeline = schedule(&durations, transition);

        let composed = self.work_dir.join("composed.mp4");
        intermediates.push(composed.clone());
        match transition {
            Transition::Cut => {
                let list = self.work_dir.join("concat_list.txt");
                intermediates.push(list.clone());
                fs::write(&list, concat_list(&parts)).await?;
                logi(format!("Concatenating {} clips", parts.len()));
                ffmpeg::ffmpeg_concat_videos(&list, self.fps, &composed).await?;
            }
            Transition::Crossfade { padding } => {
                logi(format!(
                    "Crossfading {} clips (padding {:.2}s, offsets {:?})",
                    parts.len(),
                    padding,
                    timeline.starts
                ));
                let inputs: Vec<&Path> = parts.iter().map(PathBuf::as_path).collect();
                ffmpeg::ffmpeg_crossfade_videos(
                    &inputs,
                    &timeline.starts,
                    &timeline.fades,
                    self.fps,
                    &composed,
                )
                .await?;
            }
        }
        logok(format!("Composed {:.2}s of video", timeline.total));

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut with_music = false;
        match resolve_music(&self.music_path, rng) {
            Ok(music) => {
                logi(format!("Mixing background music {}", music.display()));
                match ffmpeg::ffmpeg_mix_bgm(&composed, &music, timeline.total, self.music_volume, output)
                    .await
                {
                    Ok(()) => with_music = true,
                    Err(e) => logw(format!("Error processing background music: {}", e)),
                }
            }
            Err(e) => logw(format!("Error processing background music: {}", e)),
        }
        if !with_music {
            move_file(&composed, output).await?;
        }

        logok(format!("Wrote {}", output.display()));
        Ok(AssemblyReport {
            output: output.to_path_buf(),
            clips_used: parts.len(),
            total_duration: timeline.total,
            with_music,
        })
    }
}

/// Concat-demuxer list; entries are absolute so the list can live anywhere.
fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            let abs = std::path::absolute(p).unwrap_or_else(|_| p.clone());
            format!("file '{}'\n", abs.display().to_string().replace('\'', "'\\''"))
        })
        .collect()
}

/// A file is used as-is; a directory yields a random track from inside it.
pub fn resolve_music<R: Rng + ?Sized>(path: &Path, rng: &mut R) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(ShortsError::MediaWrite(format!(
            "music not found at {}",
            path.display()
        )));
    }

    let mut tracks: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| MUSIC_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
        })
        .collect();
    tracks.sort();

    tracks.choose(rng).cloned().ok_or_else(|| {
        ShortsError::MediaWrite(format!("no music tracks in {}", path.display()))
    })
}

async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs::copy(from, to).await?;
    fs::remove_file(from).await.ok();
    Ok(())
}

/// Deletes per-slide temp files. Missing files are reported, not fatal.
/// Returns how many were actually removed.
pub async fn cleanup_files(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {
                removed += 1;
                logi(format!("Deleted {}", path.display()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                logw(format!("File {} not found.", path.display()));
            }
            Err(e) => logw(format!("Could not delete {}: {}", path.display(), e)),
        }
    }
    removed
}
