//! The `lightbox build` command.

use clap::{Args, ValueEnum};
use lightbox_core::config::ToolBackend;
use lightbox_core::{
    discover_collections, Config, OutputFormat as CoreOutputFormat, OutputWriter, Scheduler,
    SiteReport, SiteRunner,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Directory with one subdirectory per collection
    #[arg(required = true)]
    pub input: PathBuf,

    /// Root directory for derived assets (overrides general.output_dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Manifest file (defaults to stdout)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Manifest format (overrides output.format)
    #[arg(short, long, value_enum)]
    pub format: Option<ManifestFormat>,

    /// URL prefix for derived assets (overrides general.http_prefix)
    #[arg(long)]
    pub http_prefix: Option<String>,

    /// Neither read nor write collection cache files
    #[arg(long)]
    pub no_cache: bool,

    /// Regenerate derived files missing from existing output directories
    #[arg(long)]
    pub verify_derived: bool,

    /// Transform and metadata backend (overrides tools.backend)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ManifestFormat {
    /// One JSON document
    Json,
    /// One JSON record per collection
    Jsonl,
}

impl From<ManifestFormat> for CoreOutputFormat {
    fn from(format: ManifestFormat) -> Self {
        match format {
            ManifestFormat::Json => CoreOutputFormat::Json,
            ManifestFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Pure-Rust resizing and EXIF reading
    Native,
    /// ImageMagick `convert` and `exiftool` subprocesses
    Imagemagick,
}

impl From<Backend> for ToolBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Native => ToolBackend::Native,
            Backend::Imagemagick => ToolBackend::Imagemagick,
        }
    }
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(args: &BuildArgs, config: &mut Config) -> anyhow::Result<()> {
    if let Some(output) = &args.output {
        config.general.output_dir = super::expand_path(output);
    }
    if let Some(prefix) = &args.http_prefix {
        config.general.http_prefix = prefix.clone();
    }
    if let Some(format) = args.format {
        config.output.format = match format {
            ManifestFormat::Json => "json".to_string(),
            ManifestFormat::Jsonl => "jsonl".to_string(),
        };
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    if args.verify_derived {
        config.dedup.verify_derived_assets = true;
    }
    if let Some(backend) = args.backend {
        config.tools.backend = backend.into();
    }
    config.validate()?;
    Ok(())
}

pub async fn execute(args: BuildArgs, mut config: Config) -> anyhow::Result<()> {
    apply_overrides(&args, &mut config)?;

    let input = super::expand_path(&args.input);
    if !input.is_dir() {
        anyhow::bail!(
            "Input directory does not exist: {:?}\n\n  Hint: Pass the directory that contains your collections.",
            input
        );
    }
    let format = CoreOutputFormat::parse(&config.output.format).ok_or_else(|| {
        anyhow::anyhow!("Unknown output.format {:?} (expected json or jsonl)", config.output.format)
    })?;

    let dirs = discover_collections(&input, &config.collection.descriptor_name)?;
    if dirs.is_empty() {
        tracing::warn!(
            "No collections found under {:?} (looking for {})",
            input,
            config.collection.descriptor_name
        );
    } else {
        tracing::info!("Found {} collection(s)", dirs.len());
    }

    let start_time = std::time::Instant::now();
    let progress = create_progress_bar(dirs.len() as u64);
    let bar = progress.clone();
    let runner = SiteRunner::new(Scheduler::from_config(&config), &config).with_progress(Arc::new(
        move |name: &str| {
            bar.inc(1);
            bar.set_message(name.to_string());
        },
    ));

    let report = runner.run(dirs).await;
    progress.finish_and_clear();

    write_manifest(&report, args.manifest.as_ref(), format, config.output.pretty)?;
    print_summary(&report, start_time.elapsed());
    Ok(())
}

fn write_manifest(
    report: &SiteReport,
    path: Option<&PathBuf>,
    format: CoreOutputFormat,
    pretty: bool,
) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let path = super::expand_path(path);
            let file = File::create(&path)?;
            let mut writer = OutputWriter::new(BufWriter::new(file), format, pretty);
            writer.write_report(report)?;
            writer.flush()?;
            tracing::info!("Manifest written to {:?}", path);
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = OutputWriter::new(stdout.lock(), format, pretty);
            writer.write_report(report)?;
            writer.flush()?;
        }
    }
    Ok(())
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("starting...");
    pb
}

fn print_summary(report: &SiteReport, elapsed: Duration) {
    let totals = &report.totals;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Collections:  {:>8}", totals.collections);
    if totals.failed_collections > 0 {
        eprintln!("    Unreadable:   {:>8}", totals.failed_collections);
    }
    eprintln!("    Photos:       {:>8}", totals.items);
    if totals.failed_items > 0 {
        eprintln!("    Failed:       {:>8}", totals.failed_items);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");

    for collection in &report.collections {
        for failure in &collection.failures {
            eprintln!("  ! {}/{}: {}", collection.name, failure.file, failure.error);
        }
    }
    for failure in &report.failed_collections {
        eprintln!("  ! {}: {}", failure.dir.display(), failure.error);
    }
}
