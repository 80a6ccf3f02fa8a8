use crate::api::SpeechSource;
use crate::content::{ContentLibrary, Quote};
use crate::error::{Result, ShortsError};
use crate::ffmpeg;
use crate::slide::SlidePainter;
use crate::storyboard::{Clip, SlideSpec, Storyboard};
use crate::{logi, logok, logw};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Minimum valid images for the four-slide template.
pub const TEMPLATE_MIN_IMAGES: usize = 3;
/// Script mode never asks for more than this many images.
pub const SCRIPT_IMAGE_CAP: usize = 5;

/// Reads the playing time of an audio file.
#[async_trait]
pub trait AudioProbe: Send + Sync {
    async fn duration(&self, path: &Path) -> Result<f64>;
}

pub struct FfprobeProbe;

#[async_trait]
impl AudioProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> Result<f64> {
        ffmpeg::ffprobe_duration_seconds(path).await
    }
}

fn segment_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_try_init(|| Regex::new(r"[^.?!:]+[.?!:]*"))
        .map_err(|e| ShortsError::Config(format!("segment regex: {e}")))
}

/// Splits a script into sentence-like segments. Each keeps its closing
/// delimiter(s) and is trimmed; blank pieces are dropped.
pub fn split_segments(text: &str) -> Result<Vec<String>> {
    let re = segment_regex()?;
    Ok(re
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn script_required_images(segment_count: usize) -> usize {
    segment_count.min(SCRIPT_IMAGE_CAP)
}

pub fn ensure_enough_images(have: usize, need: usize) -> Result<()> {
    if have < need {
        return Err(ShortsError::InsufficientImages { have, need });
    }
    Ok(())
}

/// Title hook, verse, meaning, end slide.
pub fn template_texts<R: Rng + ?Sized>(
    library: &ContentLibrary,
    quote: &Quote,
    rng: &mut R,
) -> Result<Vec<String>> {
    let hook = library
        .random_title_hook(rng)
        .ok_or_else(|| ShortsError::Config("title hook pool is empty".to_string()))?;
    let end = library
        .random_end_slide(rng)
        .ok_or_else(|| ShortsError::Config("end slide pool is empty".to_string()))?;

    Ok(vec![
        hook.to_string(),
        format!("Verse: {}", quote.text),
        format!("Meaning: {}", quote.meaning),
        end.to_string(),
    ])
}

/// Pairs each text with an image: the pool is shuffled once and then cycled,
/// so no image repeats until every image has been used.
pub fn assign_images<R: Rng + ?Sized>(
    texts: &[String],
    pool: &[PathBuf],
    work_dir: &Path,
    rng: &mut R,
) -> Result<Vec<SlideSpec>> {
    if pool.is_empty() {
        return Err(ShortsError::InsufficientImages { have: 0, need: 1 });
    }
    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);

    Ok(texts
        .iter()
        .enumerate()
        .map(|(idx, text)| SlideSpec {
            text: text.clone(),
            image_path: shuffled[idx % shuffled.len()].clone(),
            output_slide_path: work_dir.join(format!("slide_{}.jpg", idx + 1)),
        })
        .collect())
}

pub fn audio_path_for(slide: &SlideSpec) -> PathBuf {
    slide.output_slide_path.with_extension("mp3")
}

/// Renders, narrates and times every slide in order. A slide that fails at any
/// step is logged and left out of the clips; its files are still listed for cleanup.
pub async fn produce_storyboard(
    slides: Vec<SlideSpec>,
    painter: Arc<dyn SlidePainter>,
    speech: &dyn SpeechSource,
    probe: &dyn AudioProbe,
) -> Result<Storyboard> {
    let mut board = Storyboard::default();
    let count = slides.len();

    for (idx, slide) in slides.into_iter().enumerate() {
        let n = idx + 1;
        let audio_path = audio_path_for(&slide);
        board.slides.push(slide.clone());
        board.audio_paths.push(audio_path.clone());

        logi(format!("Rendering slide {}/{} -> {}", n, count, slide.output_slide_path.display()));
        let task_painter = Arc::clone(&painter);
        let task_slide = slide.clone();
        let painted = tokio::task::spawn_blocking(move || task_painter.paint(&task_slide))
            .await
            .map_err(|e| ShortsError::MediaWrite(format!("render task: {e}")))?;
        if let Err(e) = painted {
            logw(format!("Skipping slide {}: {}", n, e));
            continue;
        }

        if let Err(e) = speech.synthesize(&slide.text, &audio_path).await {
            logw(format!("TTS failed for slide {}: {}", n, e));
            continue;
        }

        let duration = match probe.duration(&audio_path).await {
            Ok(d) => d,
            Err(e) => {
                logw(format!("Unreadable narration for slide {}: {}", n, e));
                continue;
            }
        };

        logok(format!("Slide {} ready ({:.2}s)", n, duration));
        board.clips.push(Clip {
            image_path: slide.output_slide_path.clone(),
            audio_path,
            duration,
        });
    }

    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn splits_on_sentence_delimiters() {
        assert_eq!(split_segments("A. B? C!").unwrap(), vec!["A.", "B?", "C!"]);
    }

    #[test]
    fn keeps_colon_and_trailing_text() {
        let got = split_segments("Remember this: faith moves mountains. Amen").unwrap();
        assert_eq!(got, vec!["Remember this:", "faith moves mountains.", "Amen"]);
    }

    #[test]
    fn groups_repeated_punctuation() {
        let got = split_segments("Wait... what?!  ").unwrap();
        assert_eq!(got, vec!["Wait...", "what?!"]);
    }

    #[test]
    fn blank_script_has_no_segments() {
        assert!(split_segments("  \n ").unwrap().is_empty());
    }

    #[test]
    fn image_requirement_is_capped() {
        assert_eq!(script_required_images(2), 2);
        assert_eq!(script_required_images(12), 5);
        assert!(ensure_enough_images(4, 5).is_err());
        assert!(ensure_enough_images(5, 5).is_ok());
    }

    fn pool(n: usize) -> Vec<PathBuf> {
        (1..=n).map(|i| PathBuf::from(format!("images/image_{i}.jpg"))).collect()
    }

    #[test]
    fn assignment_cycles_through_shuffled_pool() {
        let texts: Vec<String> = (0..7).map(|i| format!("line {i}")).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let specs = assign_images(&texts, &pool(3), Path::new("work"), &mut rng).unwrap();

        assert_eq!(specs.len(), 7);
        let first_round: HashSet<_> = specs[..3].iter().map(|s| s.image_path.clone()).collect();
        assert_eq!(first_round.len(), 3);
        for i in 3..7 {
            assert_eq!(specs[i].image_path, specs[i % 3].image_path);
        }
        assert_eq!(specs[6].output_slide_path, Path::new("work").join("slide_7.jpg"));
        assert_eq!(specs[2].text, "line 2");
    }

    #[test]
    fn assignment_is_reproducible_with_seed() {
        let texts: Vec<String> = (0..4).map(|i| i.to_string()).collect();
        let a = assign_images(&texts, &pool(6), Path::new("w"), &mut StdRng::seed_from_u64(9)).unwrap();
        let b = assign_images(&texts, &pool(6), Path::new("w"), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn template_has_four_slides_in_order() {
        let library = ContentLibrary {
            quotes: vec![],
            title_hooks: vec!["Hook".to_string()],
            end_slides: vec!["Bye".to_string()],
        };
        let quote = Quote {
            text: "Be strong".to_string(),
            meaning: "Take courage".to_string(),
        };
        let texts = template_texts(&library, &quote, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(
            texts,
            vec!["Hook", "Verse: Be strong", "Meaning: Take courage", "Bye"]
        );
    }

    struct FakePainter {
        fail_on: Option<usize>,
    }

    impl SlidePainter for FakePainter {
        fn paint(&self, spec: &SlideSpec) -> Result<()> {
            if self.fail_on.is_some_and(|n| spec.output_slide_path.ends_with(format!("slide_{n}.jpg"))) {
                return Err(ShortsError::Decode {
                    path: spec.image_path.clone(),
                    reason: "corrupt".to_string(),
                });
            }
            std::fs::write(&spec.output_slide_path, b"jpg")?;
            Ok(())
        }
    }

    struct FakeSpeech {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSource for FakeSpeech {
        async fn synthesize(&self, text: &str, out_path: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(text.to_string());
            if text.contains("mute") {
                return Err(ShortsError::Network("TTS failed HTTP 500".to_string()));
            }
            std::fs::write(out_path, text.as_bytes())?;
            Ok(())
        }
    }

    /// One second per byte of "audio".
    struct LenProbe;

    #[async_trait]
    impl AudioProbe for LenProbe {
        async fn duration(&self, path: &Path) -> Result<f64> {
            Ok(std::fs::metadata(path)?.len() as f64)
        }
    }

    fn specs(dir: &Path, texts: &[&str]) -> Vec<SlideSpec> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| SlideSpec {
                text: t.to_string(),
                image_path: dir.join("img.jpg"),
                output_slide_path: dir.join(format!("slide_{}.jpg", i + 1)),
            })
            .collect()
    }

    #[tokio::test]
    async fn storyboard_times_each_clip_to_its_audio() {
        let dir = tempfile::tempdir().unwrap();
        let speech = FakeSpeech { calls: Mutex::new(vec![]) };
        let board = produce_storyboard(
            specs(dir.path(), &["abc", "defgh"]),
            Arc::new(FakePainter { fail_on: None }),
            &speech,
            &LenProbe,
        )
        .await
        .unwrap();

        assert_eq!(board.clips.len(), 2);
        assert_eq!(board.clips[0].duration, 3.0);
        assert_eq!(board.clips[1].duration, 5.0);
        assert_eq!(board.clips[1].audio_path, dir.path().join("slide_2.mp3"));
        assert_eq!(board.clips[1].image_path, dir.path().join("slide_2.jpg"));
    }

    #[tokio::test]
    async fn failed_slides_are_skipped_but_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let speech = FakeSpeech { calls: Mutex::new(vec![]) };
        let board = produce_storyboard(
            specs(dir.path(), &["one", "two mute", "three"]),
            Arc::new(FakePainter { fail_on: Some(1) }),
            &speech,
            &LenProbe,
        )
        .await
        .unwrap();

        assert_eq!(board.clips.len(), 1);
        assert_eq!(board.clips[0].image_path, dir.path().join("slide_3.jpg"));
        // render failure short-circuits before TTS
        assert_eq!(*speech.calls.lock().unwrap(), vec!["two mute", "three"]);
        assert_eq!(board.temp_files().len(), 6);
    }
}
