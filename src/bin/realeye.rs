use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use realeye::{
    AnalysisConfig, AnalysisSession, ImageMime,
    config::SpectrumMode,
    detection::client::ClassificationClient,
    report::{JsonReport, visualization::ArtifactExport},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "realeye", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an image and render its ELA map and spectrum.
    Analyze(AnalyzeArgs),
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// JPEG or PNG image to analyze.
    image: PathBuf,

    /// Directory for original/ela/spectrum/overview PNGs.
    #[arg(long)]
    out: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Spectrum rendering mode.
    #[arg(long, value_enum)]
    spectrum: Option<SpectrumChoice>,

    /// Seed for the synthetic spectrum.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SpectrumChoice {
    Synthetic,
    Fourier,
}

impl From<SpectrumChoice> for SpectrumMode {
    fn from(choice: SpectrumChoice) -> Self {
        match choice {
            SpectrumChoice::Synthetic => SpectrumMode::Synthetic,
            SpectrumChoice::Fourier => SpectrumMode::Fourier,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Analyze(args) => cmd_analyze(args).await,
    }
}

fn load_config(args: &AnalyzeArgs) -> anyhow::Result<AnalysisConfig> {
    let config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => AnalysisConfig::default(),
    };

    let mut spectrum = config.spectrum.clone();
    if let Some(choice) = args.spectrum {
        spectrum = spectrum.with_mode(choice.into());
    }
    if let Some(seed) = args.seed {
        spectrum = spectrum.with_seed(seed);
    }
    let classifier = config
        .classifier
        .clone()
        .load_api_key_from_env()
        .context("classifier API key")?;

    Ok(config.with_spectrum(spectrum).with_classifier(classifier))
}

async fn cmd_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("read image '{}'", args.image.display()))?;
    let mime = ImageMime::sniff(&bytes)
        .with_context(|| format!("detect format of '{}'", args.image.display()))?;

    let client = ClassificationClient::new(config.classifier.clone())?;
    let session = AnalysisSession::new(config, Arc::new(client))?;

    let source = session.load_image(bytes, mime)?;
    let outcome = session.run_analysis().await?;

    let report = JsonReport::from(outcome.as_ref());
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.headline());
        println!("  {}", report.overall_justification);
        println!("  Visual: {}", report.visual_analysis.verdict);
        println!("  Noise: {}", report.noise_analysis.verdict);
        println!("  Fingerprint: {}", report.fingerprint_analysis.verdict);
        println!(
            "  ELA: max {:.2}, mean {:.2}, std {:.2}",
            report.ela_analysis.max_difference,
            report.ela_analysis.mean_difference,
            report.ela_analysis.std_deviation
        );
    }

    if let Some(out) = &args.out {
        ArtifactExport::new(&source, &outcome)
            .save_all(out)
            .with_context(|| format!("write artifacts to '{}'", out.display()))?;
        eprintln!("Artifacts written to {}", out.display());
    }

    Ok(())
}
