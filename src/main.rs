mod error;
mod pipeline;
mod settings;
mod text;
mod translate;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use pipeline::{combined_records, DocumentReport, Passes, Pipeline, SourceDocument};
use settings::Settings;
use text::chunks;
use text::extract::{PollingStationRecord, EXPORT_COLUMNS};
use text::vocab::Vocabulary;
use translate::{FixedDelay, GoogleTranslator, Translate};

#[derive(Parser)]
#[command(
    name = "polling_extract",
    about = "Turn OCR'd, machine-translated polling-station listings into records"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a text file would be chunked for translation
    Split {
        file: PathBuf,
        /// Chunk budget in characters (default: from settings)
        #[arg(short = 'm', long)]
        max_chunk_size: Option<usize>,
    },
    /// Normalize already-translated text and print it
    Normalize { file: PathBuf },
    /// Extract records from already-translated text files
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Translate OCR text files and extract records
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
        /// Documents translated at the same time (default: from settings)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Chunk budget in characters (default: from settings)
        #[arg(short = 'm', long)]
        max_chunk_size: Option<usize>,
    },
    /// Detect the language of a text file
    Detect { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    let vocab = Vocabulary::builtin();

    let result = match cli.command {
        Commands::Split { file, max_chunk_size } => {
            if let Some(m) = max_chunk_size {
                settings.max_chunk_size = m;
            }
            settings.validate()?;
            let doc = read_document(&file)?;
            let chunks = chunks::split(&doc.text, settings.max_chunk_size);
            println!(
                "{} chars -> {} chunks (budget {})",
                doc.text.chars().count(),
                chunks.len(),
                settings.max_chunk_size
            );
            for (i, chunk) in chunks.iter().enumerate() {
                println!(
                    "{:>3} | {:>5} | {:<8} | {}",
                    i + 1,
                    chunk.char_len(),
                    format!("{:?}", chunk.boundary),
                    truncate(&chunk.text.replace('\n', " / "), 60)
                );
            }
            if chunks::reassemble(&chunks) != doc.text {
                warn!(file = %doc.name, "chunks do not reassemble to the source text");
            }
            Ok(())
        }
        Commands::Normalize { file } => {
            let doc = read_document(&file)?;
            let passes = Passes::new(&vocab)?;
            println!("{}", passes.normalizer.normalize(&doc.text));
            Ok(())
        }
        Commands::Extract { files, format } => {
            let docs = read_documents(&files)?;
            let passes = Passes::new(&vocab)?;
            let reports: Vec<DocumentReport> =
                docs.par_iter().map(|d| passes.report_translated(d)).collect();
            print_reports(&reports, format)
        }
        Commands::Run {
            files,
            format,
            concurrency,
            max_chunk_size,
        } => {
            if let Some(c) = concurrency {
                settings.concurrency = c;
            }
            if let Some(m) = max_chunk_size {
                settings.max_chunk_size = m;
            }
            settings.validate()?;
            let docs = read_documents(&files)?;
            let translator: Arc<dyn Translate> = Arc::new(GoogleTranslator::from_settings(&settings)?);
            let pacer = Arc::new(FixedDelay::new(settings.pace()));
            let pipeline = Arc::new(Pipeline::new(&settings, Passes::new(&vocab)?, translator, pacer));

            info!(
                documents = docs.len(),
                concurrency = settings.concurrency,
                budget = settings.max_chunk_size,
                "starting translation run"
            );
            let pb = progress_bar(docs.len())?;
            let reports = pipeline
                .process_batch(docs, settings.concurrency, pb.clone())
                .await?;
            pb.finish_and_clear();
            print_reports(&reports, format)
        }
        Commands::Detect { file } => {
            let doc = read_document(&file)?;
            let translator = GoogleTranslator::from_settings(&settings)?;
            let lang = translator.detect(&doc.text).await?;
            println!("{}: {}", doc.name, lang);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn read_document(path: &Path) -> Result<SourceDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceDocument { name, text })
}

fn read_documents(paths: &[PathBuf]) -> Result<Vec<SourceDocument>> {
    paths.iter().map(|p| read_document(p)).collect()
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} documents ({eta})")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn print_reports(reports: &[DocumentReport], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
        Format::Table => {
            for r in reports {
                if r.records.is_empty() {
                    println!("{}: no structured data recognized, review the translated text", r.source);
                } else if r.chunks.failed > 0 {
                    println!(
                        "{}: {} of {} chunks failed to translate",
                        r.source, r.chunks.failed, r.chunks.total
                    );
                }
            }
            let records = combined_records(reports);
            if records.is_empty() {
                println!("No polling stations found.");
                return Ok(());
            }
            print_table(&records);
            println!("\n{} polling stations from {} documents", records.len(), reports.len());
        }
    }
    Ok(())
}

fn table_header() -> String {
    format!(
        "{:>22} | {:<48} | {}",
        EXPORT_COLUMNS[0], EXPORT_COLUMNS[1], EXPORT_COLUMNS[2]
    )
}

fn print_table(records: &[&PollingStationRecord]) {
    println!("{}", table_header());
    println!("{}", "-".repeat(126));
    for r in records {
        let [number, address, _] = r.to_row();
        let mut sections = r.sections.iter();
        let first = sections.next().map(String::as_str).unwrap_or("");
        println!(
            "{:>22} | {:<48} | {}",
            truncate(&number, 22),
            truncate(&address, 48),
            truncate(first, 50)
        );
        for more in sections {
            println!("{:>22} | {:<48} | {}", "", "", truncate(more, 50));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
