use anyhow::{Context, Result, bail};
use clap::Parser;
use dialogue_llm::{
    bundles::{build_archive, write_individual},
    configs::AppConfig,
    pipeline::{Pipeline, Upload},
    translators::{DryRunTranslator, LlmTranslator, Translator},
};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs,
    path::{Path, PathBuf},
};

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "dialogue-llm")]
#[command(about = "Translate dialogue files into bilingual Chinese using an LLM", long_about = None)]
struct Args {
    #[arg(required = true, help = "Dialogue files (.txt or .md) or glob patterns")]
    files: Vec<String>,

    #[arg(short, long, value_parser = check_file_exists, help = "Path to TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true, help = "Provider API key")]
    api_key: Option<String>,

    #[arg(long, help = "Override the model identifier")]
    model: Option<String>,

    #[arg(short, long, default_value = ".", help = "Directory for translated output")]
    output_dir: PathBuf,

    #[arg(long, help = "Number of files to translate concurrently")]
    file_concurrent: Option<usize>,

    #[arg(short, long, help = "Dry run mode (no provider calls)")]
    dry_run: bool,

    #[arg(long, help = "Skip writing the zip bundle")]
    no_archive: bool,

    #[arg(long, help = "Also write each file's .md and .txt outputs separately")]
    individual: bool,
}

fn check_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("File '{}' not found", s))
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("DIALOGUE_LLM_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    println!("🌍 Dialogue Translator");

    let mut config = match &args.config {
        Some(path) => {
            println!("📋 Config: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    if let Some(key) = &args.api_key {
        config.llm.api_key = key.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(n) = args.file_concurrent {
        config.translation.file_concurrent = n;
    }
    config.validate()?;

    if !args.dry_run && config.llm.api_key.trim().is_empty() {
        bail!("No API key: pass --api-key, set OPENROUTER_API_KEY, or add llm.api_key to the config");
    }

    println!("🤖 Model: {}", config.llm.model);
    println!("📦 Max tokens: {}", config.llm.max_tokens);
    if args.dry_run {
        println!("🔍 Mode: DRY RUN");
    }

    let paths = expand_inputs(&args.files)?;
    let uploads = read_uploads(&paths)?;

    if args.dry_run {
        run(config, DryRunTranslator, uploads, &args).await
    } else {
        let llm = LlmTranslator::new(config.llm.clone());
        run(config, llm, uploads, &args).await
    }
}

async fn run<T: Translator>(
    config: AppConfig,
    translator: T,
    uploads: Vec<Upload>,
    args: &Args,
) -> Result<()> {
    let pipeline = Pipeline::new(config, translator);

    if let Err(e) = pipeline.check_uploads(&uploads) {
        println!("❌ {}", e);
        println!("📊 Processed: 0 files");
        std::process::exit(1);
    }

    println!(
        "📁 {} file(s), {} provider request(s) (one per file)\n",
        uploads.len(),
        uploads.len()
    );

    let main_pb = ProgressBar::new(uploads.len() as u64);
    main_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({msg})")?
            .progress_chars("█▓▒░"),
    );
    main_pb.set_message("translating...");

    let report = pipeline
        .run_with_progress(uploads, |file| {
            let secs = file.elapsed.as_secs_f64();
            match &file.result {
                Ok(outputs) if outputs.is_failure() => main_pb.println(format!(
                    "⚠️  {} - provider failed after {:.1}s: {}",
                    file.filename,
                    secs,
                    outputs.plaintext
                )),
                Ok(outputs) => main_pb.println(format!(
                    "✅ {} ({} dialogue lines, {:.1}s)",
                    file.filename, outputs.dialogue_count, secs
                )),
                Err(reason) => main_pb.println(format!("❌ {} - {}", file.filename, reason)),
            }
            main_pb.inc(1);
        })
        .await?;

    main_pb.finish_with_message("done");

    println!("\n📊 Summary");
    println!("📤 Uploaded: {} files", report.uploaded);
    println!("✅ Succeeded: {} files", report.succeeded());
    println!("❌ Failed: {} files", report.failures.len());
    println!("🔌 Provider requests: {}", report.provider_calls);
    if report.provider_failures() > 0 {
        println!("⚠️  Provider errors: {}", report.provider_failures());
    }
    println!("💬 Dialogue lines: {}", report.total_dialogues());
    println!("⏱️ Duration: {:.2}s", report.elapsed.as_secs_f64());
    if let Some(avg) = report.average_secs() {
        println!("⚡ Average per file: {:.1}s", avg);
    }

    if !report.results.is_empty() {
        let translation = &pipeline.config().translation;
        if !args.no_archive {
            let bytes = build_archive(&report.results)?;
            fs::create_dir_all(&args.output_dir).with_context(|| {
                format!("Failed to create output dir '{}'", args.output_dir.display())
            })?;
            let archive_path = args.output_dir.join(&translation.archive_name);
            fs::write(&archive_path, bytes)
                .with_context(|| format!("Failed to write '{}'", archive_path.display()))?;
            println!("📦 Bundle: {}", archive_path.display());
        }
        if args.individual {
            for path in write_individual(&report.results, &args.output_dir)? {
                println!("📄 {}", path.display());
            }
        }
    }

    if !report.failures.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches: Vec<PathBuf> = glob(pattern)
            .with_context(|| format!("Invalid pattern '{}'", pattern))?
            .filter_map(Result::ok)
            .collect();
        if matches.is_empty() {
            bail!("No files found matching '{}'", pattern);
        }
        paths.extend(matches);
    }
    Ok(paths)
}

fn read_uploads(paths: &[PathBuf]) -> Result<Vec<Upload>> {
    paths
        .iter()
        .map(|path| {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
            Ok(Upload::new(display_name(path), bytes))
        })
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
