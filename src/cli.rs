use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use verse_shorts::config::Config;
use verse_shorts::generator::{Pipeline, RunOutcome};
use verse_shorts::init;

#[derive(Parser, Debug)]
#[command(name = "verse-shorts")]
#[command(about = "Turn quotes or scripts into narrated vertical slideshow videos", long_about = None)]
struct Args {
    /// Settings file (JSON); defaults apply when it does not exist
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Seed for image and text selection
    #[arg(long)]
    seed: Option<u64>,

    /// Crossfade between slides
    #[arg(long)]
    crossfade: bool,

    /// Crossfade overlap in seconds
    #[arg(long)]
    padding: Option<f64>,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Render the next queued quote and advance the progress record
    Batch,
    /// Render one slide per sentence of a script
    Script {
        /// Script text
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// File holding the script
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Image search query
        #[arg(short, long)]
        query: String,

        /// Output video path
        #[arg(short, long, default_value = "output.mp4")]
        output: PathBuf,
    },
}

/// A fixed seed reproduces a run; otherwise every run draws fresh OS entropy.
fn selection_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut cfg = Config::load(&args.config)
        .await
        .with_context(|| format!("Failed to load configuration ({})", args.config.display()))?;
    if args.crossfade {
        cfg.settings.crossfade = true;
    }
    if let Some(padding) = args.padding {
        cfg.settings.crossfade_padding = padding;
    }
    cfg.settings.validate()?;

    init::ensure_directories(&cfg.settings).await?;
    if !init::check_ffmpeg().await {
        eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
    }

    let pipeline = Pipeline::from_config(&cfg)?;
    let mut rng = selection_rng(args.seed);

    let outcome = match args.command {
        Mode::Batch => pipeline.run_batch(&mut rng).await?,
        Mode::Script {
            text,
            file,
            query,
            output,
        } => {
            let script = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read file: {}", path.display()))?,
                (None, None) => anyhow::bail!("Either --text or --file must be provided"),
            };
            pipeline.run_script(&script, &query, &output, &mut rng).await?
        }
    };

    if let RunOutcome::Aborted(reason) = &outcome {
        eprintln!("[ERROR] Run aborted: {}", reason);
    }
    std::process::exit(outcome.exit_code());
}
