use crate::config::Settings;
use crate::error::Result;
use crate::logi;
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

pub async fn ensure_directories(settings: &Settings) -> Result<()> {
    for dir in [&settings.work_dir, &settings.images_dir, &settings.output_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

const WORK_FILE_PREFIXES: &[&str] = &["slide_", "clip_"];
const WORK_FILE_NAMES: &[&str] = &["composed.mp4", "concat_list.txt"];

/// Whether `name` is one of the files the pipeline writes into the work dir.
pub fn is_work_file(name: &str) -> bool {
    WORK_FILE_NAMES.contains(&name) || WORK_FILE_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Removes leftovers of an earlier run from `dir`. Only files the pipeline
/// itself writes are touched; anything else in the directory is kept.
pub async fn clear_work_files(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let owned = entry.file_name().to_str().is_some_and(is_work_file);
        if owned && fs::remove_file(entry.path()).await.is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        logi(format!("Removed {} stale files from {}", removed, dir.display()));
    }
    Ok(removed)
}

pub async fn check_ffmpeg() -> bool {
    match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
