use crate::error::{Result, ShortsError};
use std::path::Path;
use tokio::process::Command;

const AUDIO_RATE: &str = "44100";

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| ShortsError::MediaWrite(format!("cannot run {}: {e}", args[0])))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
        return Err(ShortsError::MediaWrite(format!(
            "{} exited with {}: {}",
            args[0], output.status, tail
        )));
    }

    Ok(())
}

fn base_args() -> Vec<String> {
    ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn encode_args(fps: u32) -> Vec<String> {
    vec![
        "-r".to_string(),
        fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-crf".to_string(),
        "22".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-ar".to_string(),
        AUDIO_RATE.to_string(),
        "-ac".to_string(),
        "2".to_string(),
    ]
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| ShortsError::MediaWrite(format!("cannot run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ShortsError::MediaWrite(format!(
            "ffprobe failed on {}",
            path.display()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    match text.parse::<f64>() {
        Ok(d) if d > 0.0 => Ok(d),
        _ => Err(ShortsError::MediaWrite(format!(
            "invalid duration {:?} for {}",
            text,
            path.display()
        ))),
    }
}

/// Still image held for `duration_s` with the narration under it. Short audio is
/// padded with silence, long audio is cut.
pub async fn ffmpeg_image_clip(
    image: &Path,
    audio: &Path,
    duration_s: f64,
    width: u32,
    height: u32,
    fps: u32,
    out_mp4: &Path,
) -> Result<()> {
    let mut args = base_args();
    args.extend([
        "-loop".to_string(),
        "1".to_string(),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        image.display().to_string(),
        "-i".to_string(),
        audio.display().to_string(),
        "-t".to_string(),
        format!("{:.3}", duration_s),
        "-vf".to_string(),
        format!("scale={}:{},setsar=1", width, height),
        "-af".to_string(),
        "apad".to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-tune".to_string(),
        "stillimage".to_string(),
    ]);
    args.extend(encode_args(fps));
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await
}

pub async fn ffmpeg_concat_videos(list_txt: &Path, fps: u32, out_mp4: &Path) -> Result<()> {
    let mut args = base_args();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_txt.display().to_string(),
    ]);
    args.extend(encode_args(fps));
    args.push("-movflags".to_string());
    args.push("+faststart".to_string());
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await
}

/// Filter graph chaining `xfade` over the video streams and delaying each
/// narration to its clip's start before mixing. `fades[i]` is the length of
/// clip `i`'s fade-in.
pub fn crossfade_filter(starts: &[f64], fades: &[f64]) -> String {
    let n = starts.len();
    let mut parts = Vec::new();

    let mut prev = "0:v".to_string();
    for (i, (start, fade)) in starts.iter().zip(fades).enumerate().skip(1) {
        let label = if i == n - 1 {
            "vout".to_string()
        } else {
            format!("v{}", i)
        };
        parts.push(format!(
            "[{}][{}:v]xfade=transition=fade:duration={:.3}:offset={:.3}[{}]",
            prev, i, fade, start, label
        ));
        prev = label;
    }

    let mut mix_inputs = String::new();
    for (i, start) in starts.iter().enumerate() {
        let ms = (start * 1000.0).round() as u64;
        parts.push(format!("[{}:a]adelay={}|{}[a{}]", i, ms, ms, i));
        mix_inputs.push_str(&format!("[a{}]", i));
    }
    parts.push(format!(
        "{}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[aout]",
        mix_inputs, n
    ));

    parts.join(";")
}

pub async fn ffmpeg_crossfade_videos(
    inputs: &[&Path],
    starts: &[f64],
    fades: &[f64],
    fps: u32,
    out_mp4: &Path,
) -> Result<()> {
    if inputs.len() < 2 || inputs.len() != starts.len() || starts.len() != fades.len() {
        return Err(ShortsError::MediaWrite(format!(
            "crossfade needs matching inputs and offsets, got {} and {}",
            inputs.len(),
            starts.len()
        )));
    }

    let mut args = base_args();
    for input in inputs {
        args.push("-i".to_string());
        args.push(input.display().to_string());
    }
    args.extend([
        "-filter_complex".to_string(),
        crossfade_filter(starts, fades),
        "-map".to_string(),
        "[vout]".to_string(),
        "-map".to_string(),
        "[aout]".to_string(),
    ]);
    args.extend(encode_args(fps));
    args.push("-movflags".to_string());
    args.push("+faststart".to_string());
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await
}

pub fn bgm_filter(total_s: f64, volume: f64) -> String {
    format!(
        "[1:a]atrim=0:{:.3},asetpts=PTS-STARTPTS,volume={:.3}[bg];[0:a][bg]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[a]",
        total_s, volume
    )
}

pub async fn ffmpeg_mix_bgm(
    video_in: &Path,
    bgm_in: &Path,
    total_s: f64,
    volume: f64,
    video_out: &Path,
) -> Result<()> {
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        video_in.display().to_string(),
        "-i".to_string(),
        bgm_in.display().to_string(),
        "-filter_complex".to_string(),
        bgm_filter(total_s, volume),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        video_out.display().to_string(),
    ]);
    run_cmd(&args).await
}
