use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use bookclub_ocr::{
    CoverScanner, Isbn, MetadataSearchClient, OcrLine, ScanConfig, SearchParams,
    generate_cache_key,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "bookclub",
    about = "Book-cover OCR extraction and metadata lookup",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting BOOKCLUB_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Config file (defaults to $BOOKCLUB_CONFIG or ~/.config/bookclub/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract book fields from OCR text.
    Extract {
        /// Text file; stdin when omitted or `-`.
        file: Option<PathBuf>,
        #[arg(long)]
        book_id: Option<String>,
        /// Fill missing fields from the metadata provider.
        #[arg(long)]
        enrich: bool,
    },

    /// Rank raw OCR detections (`[{text, confidence, bbox}]` JSON) into candidates.
    Candidates {
        file: PathBuf,
        #[arg(long)]
        book_id: Option<String>,
        #[arg(long)]
        enrich: bool,
    },

    /// Look up book metadata.
    Search {
        #[command(flatten)]
        params: SearchArgs,
    },

    /// Print the normalised cache key for a query.
    CacheKey {
        #[command(flatten)]
        params: SearchArgs,
    },

    /// Validate an ISBN and show both forms.
    Isbn { value: String },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    #[arg(long)]
    isbn: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        Self {
            isbn: args.isbn,
            title: args.title,
            author: args.author,
        }
    }
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path.
    Path,
    /// Show the effective config.
    Show,
    /// Write the default config file if none exists.
    Init,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let json_output = cli.json || std::env::var("BOOKCLUB_JSON").as_deref() == Ok("1");
    let config_path = cli.config.clone().unwrap_or_else(ScanConfig::config_path);
    let config = ScanConfig::load_from(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    debug!(path = %config_path.display(), "config loaded");

    match cli.command {
        Commands::Extract {
            file,
            book_id,
            enrich,
        } => {
            let text = read_input(file.as_deref())?;
            let scanner = scanner(&config, enrich)?;
            let report = scanner.analyze(Some(&text), book_id).await;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":report,"meta":{"duration_ms":dur}}))?;
            } else {
                print_field("ISBN", report.isbn.as_deref());
                print_field("Title", report.title.as_deref());
                print_field("Author", report.author.as_deref());
                print_field("Publisher", report.publisher.as_deref());
                print_field("Published", report.published_date.as_deref());
                print_field("Description", report.description.as_deref());
                println!("{:<12} {}", "Confidence", report.confidence);
                if !report.fields_from_metadata.is_empty() {
                    println!("{:<12} {}", "Enriched", report.fields_from_metadata.join(", "));
                }
            }
        }

        Commands::Candidates {
            file,
            book_id,
            enrich,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let lines: Vec<OcrLine> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing OCR lines in {}", file.display()))?;
            let scanner = scanner(&config, enrich)?;
            let (scan, report) = scanner.analyze_lines(&lines, book_id).await;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "candidates": scan, "report": report },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("Title candidates:");
                for c in &scan.title_candidates {
                    println!("  {:.3}  {}", c.confidence, c.value);
                }
                println!("Author candidates:");
                for c in &scan.author_candidates {
                    println!("  {:.3}  {}", c.confidence, c.value);
                }
                println!("Confidence: {}", report.confidence);
            }
        }

        // ── Search ─────────────────────────────────────────────────────────

        Commands::Search { params } => {
            let params = SearchParams::from(params);
            if params.is_empty() {
                bail!("nothing to search: pass --isbn, --title or --author");
            }
            let client = MetadataSearchClient::from_config(&config)?;
            let found = client.search(&params).await;
            let dur = start.elapsed().as_millis();

            match found {
                Some(meta) => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":meta,"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{}", meta.title);
                        if let Some(subtitle) = &meta.subtitle {
                            println!("  {subtitle}");
                        }
                        let authors = meta.authors.join(", ");
                        print_field("Authors", (!authors.is_empty()).then_some(authors.as_str()));
                        print_field("ISBN", meta.preferred_isbn());
                        print_field("Publisher", meta.publisher.as_deref());
                        print_field("Published", meta.published_date.as_deref());
                        println!("{:<12} {}", "Source", meta.source);
                    }
                }
                None => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"error","error":"not_found","message":"No metadata found","meta":{"duration_ms":dur}}))?;
                    } else {
                        eprintln!("No metadata found");
                    }
                    std::process::exit(2);
                }
            }
        }

        Commands::CacheKey { params } => {
            let params = SearchParams::from(params);
            let dur = start.elapsed().as_millis();
            match generate_cache_key(&params) {
                Some(key) => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"key":key},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{key}");
                    }
                }
                None => {
                    eprintln!("Nothing searchable in the given parameters");
                    std::process::exit(2);
                }
            }
        }

        // ── ISBN ───────────────────────────────────────────────────────────

        Commands::Isbn { value } => {
            let dur = start.elapsed().as_millis();
            match Isbn::parse(&value) {
                Ok(isbn) => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":isbn,"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("ISBN-13: {}", isbn.isbn13);
                        if let Some(isbn10) = &isbn.isbn10 {
                            println!("ISBN-10: {isbn10}");
                        }
                        println!("Display: {}", isbn.hyphenated);
                    }
                }
                Err(e) => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"error","error":"invalid_isbn","message":e.to_string(),"meta":{"duration_ms":dur}}))?;
                    } else {
                        eprintln!("{e}");
                    }
                    std::process::exit(2);
                }
            }
        }

        // ── Config ─────────────────────────────────────────────────────────

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::Path => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path,"exists":config_path.exists()},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{}", config_path.display());
                    }
                }
                ConfigAction::Show => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":config,"meta":{"duration_ms":dur}}))?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                        println!("# cache directory: {}", config.cache_dir().display());
                    }
                }
                ConfigAction::Init => {
                    if config_path.exists() {
                        eprintln!("Config already exists: {}", config_path.display());
                        std::process::exit(1);
                    }
                    ScanConfig::default().save_to(&config_path)?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("Wrote {}", config_path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Logs go to stderr so stdout stays machine readable.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("BOOKCLUB_LOG_JSON").as_deref() == Ok("1") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn scanner(config: &ScanConfig, enrich: bool) -> Result<CoverScanner> {
    let client = if enrich {
        Some(MetadataSearchClient::from_config(config)?)
    } else {
        None
    };
    Ok(CoverScanner::new(client))
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn print_field(label: &str, value: Option<&str>) {
    println!("{label:<12} {}", value.unwrap_or("-"));
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
