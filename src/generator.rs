use crate::api::{self, ImageSearchClient, ImageSource, SpeechSource, VoiceRssClient};
use crate::assembler::{AssemblyReport, VideoAssembler, cleanup_files};
use crate::config::{Config, Settings};
use crate::content::ContentLibrary;
use crate::error::ShortsError;
use crate::init;
use crate::progress::ProgressStore;
use crate::sequencer::{self, AudioProbe, FfprobeProbe};
use crate::slide::{SlidePainter, SlideRenderer};
use crate::storyboard::SlideSpec;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a single invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(AssemblyReport),
    /// Batch queue exhausted; nothing was produced.
    NothingToDo,
    /// The run stopped early (too few images, no usable slides, export failure).
    Aborted(String),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed(_) | RunOutcome::NothingToDo => 0,
            RunOutcome::Aborted(_) => 1,
        }
    }
}

pub struct Pipeline {
    settings: Settings,
    images: Box<dyn ImageSource>,
    speech: Box<dyn SpeechSource>,
    probe: Box<dyn AudioProbe>,
    painter: Arc<dyn SlidePainter>,
    assembler: VideoAssembler,
}

impl Pipeline {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let settings = cfg.settings.clone();
        let client = api::http_client(&settings).context("Failed to build HTTP client")?;
        let renderer = SlideRenderer::from_settings(&settings).context("Failed to load slide font")?;

        Ok(Self {
            images: Box::new(ImageSearchClient::new(client.clone(), &settings, &cfg.credentials)),
            speech: Box::new(VoiceRssClient::new(client, &settings, &cfg.credentials)),
            probe: Box::new(FfprobeProbe),
            painter: Arc::new(renderer),
            assembler: VideoAssembler::from_settings(&settings),
            settings,
        })
    }

    pub fn with_parts(
        settings: Settings,
        images: Box<dyn ImageSource>,
        speech: Box<dyn SpeechSource>,
        probe: Box<dyn AudioProbe>,
        painter: Arc<dyn SlidePainter>,
    ) -> Self {
        let assembler = VideoAssembler::from_settings(&settings);
        Self {
            settings,
            images,
            speech,
            probe,
            painter,
            assembler,
        }
    }

    pub fn batch_output_path(&self, index: usize) -> PathBuf {
        self.settings.output_dir.join(format!(
            "video{}_{}.mp4",
            index + 1,
            self.settings.batch_output_suffix
        ))
    }

    /// Processes the next queued quote as a four-slide video and advances the
    /// progress record on success.
    pub async fn run_batch<R: Rng + Send + ?Sized>(&self, rng: &mut R) -> Result<RunOutcome> {
        let s = &self.settings;
        let library = ContentLibrary::load(&s.quotes_path, &s.title_hooks_path, &s.end_slides_path)
            .await
            .context("Failed to load content files")?;
        let store = ProgressStore::new(&s.progress_path);
        let state = store.load_state().await.context("Failed to read progress")?;

        let next_index = state.next_index();
        let Some(quote) = library.quotes.get(next_index) else {
            logi("No more quotes to process.");
            return Ok(RunOutcome::NothingToDo);
        };
        logi(format!("=== Processing quote {} of {} ===", next_index + 1, library.quotes.len()));

        self.prepare().await?;
        let pool = self.gather_images(&s.batch_topic).await?;
        if let Err(e) = sequencer::ensure_enough_images(pool.len(), sequencer::TEMPLATE_MIN_IMAGES) {
            return Ok(abort(e));
        }

        let texts = sequencer::template_texts(&library, quote, rng)?;
        let slides = sequencer::assign_images(&texts, &pool, &s.work_dir, rng)?;
        let output = self.batch_output_path(next_index);

        let outcome = self.render_and_assemble(slides, &output, rng).await?;
        if let RunOutcome::Completed(_) = outcome {
            store
                .save_progress(next_index as i64)
                .await
                .context("Failed to save progress")?;
            logok(format!("Progress saved at index {}", next_index));
        }
        Ok(outcome)
    }

    /// One slide per sentence of `script`, illustrated with images for `query`.
    pub async fn run_script<R: Rng + Send + ?Sized>(
        &self,
        script: &str,
        query: &str,
        output: &Path,
        rng: &mut R,
    ) -> Result<RunOutcome> {
        let segments = sequencer::split_segments(script)?;
        if segments.is_empty() {
            return Ok(RunOutcome::Aborted("script has no sentences".to_string()));
        }
        logi(format!("Script split into {} segments", segments.len()));

        self.prepare().await?;
        let pool = self.gather_images(query).await?;
        let need = sequencer::script_required_images(segments.len());
        if let Err(e) = sequencer::ensure_enough_images(pool.len(), need) {
            return Ok(abort(e));
        }

        let slides = sequencer::assign_images(&segments, &pool, &self.settings.work_dir, rng)?;
        self.render_and_assemble(slides, output, rng).await
    }

    async fn prepare(&self) -> Result<()> {
        self.settings.validate().context("Refusing to use these settings")?;
        init::ensure_directories(&self.settings)
            .await
            .context("Failed to create directories")?;
        init::clear_work_files(&self.settings.work_dir)
            .await
            .context("Failed to clear work directory")?;
        Ok(())
    }

    async fn gather_images(&self, query: &str) -> Result<Vec<PathBuf>> {
        let urls = match self
            .images
            .fetch_images(query, self.settings.images_per_query)
            .await
        {
            Ok(urls) => urls,
            Err(e) => {
                logw(format!("Image search failed: {}", e));
                Vec::new()
            }
        };
        let paths = self
            .images
            .download_images(&urls, &self.settings.images_dir)
            .await
            .context("Failed to download images")?;
        Ok(paths)
    }

    async fn render_and_assemble<R: Rng + Send + ?Sized>(
        &self,
        slides: Vec<SlideSpec>,
        output: &Path,
        rng: &mut R,
    ) -> Result<RunOutcome> {
        let board = sequencer::produce_storyboard(
            slides,
            Arc::clone(&self.painter),
            self.speech.as_ref(),
            self.probe.as_ref(),
        )
        .await?;

        let outcome = if board.clips.is_empty() {
            RunOutcome::Aborted("no slide survived rendering and narration".to_string())
        } else {
            match self.assembler.assemble(&board.clips, output, rng).await {
                Ok(report) => {
                    logok(format!(
                        "Video written: {} ({} clips, {:.2}s{})",
                        report.output.display(),
                        report.clips_used,
                        report.total_duration,
                        if report.with_music { ", with music" } else { "" }
                    ));
                    RunOutcome::Completed(report)
                }
                Err(e) => {
                    logw(format!("Error writing video file: {}", e));
                    RunOutcome::Aborted(e.to_string())
                }
            }
        };

        cleanup_files(&board.temp_files()).await;
        Ok(outcome)
    }
}

fn abort(err: ShortsError) -> RunOutcome {
    logw(format!("{}", err));
    RunOutcome::Aborted(err.to_string())
}
