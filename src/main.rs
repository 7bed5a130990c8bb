//! # ScopeForge CLI (`sfg`)
//!
//! ## Usage
//!
//! ```bash
//! sfg --config ./config/sfg.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sfg init` | Create the SQLite database and run schema migrations |
//! | `sfg ingest <file> --project <id>` | Chunk, embed, and index a document |
//! | `sfg retrieve "<query>"` | Show the top-k precedent chunks |
//! | `sfg analyze <file> [--framework]` | Draft a scope document, score its maturity, optionally plan its content |
//! | `sfg feedback --project <id> "<comment>"` | Re-index a reviewer comment |
//! | `sfg rebuild` | Reload the vector index from the database |
//! | `sfg seed <dir>` | Index every `Example*` directory under `<dir>` |
//! | `sfg evaluate <dir> [--auto-ref]` | Compare generated (or retrieved) text with expected outputs |
//! | `sfg serve` | Start the HTTP server |
//!
//! Fatal errors from the knowledge base or analyzer are printed to stderr
//! as `{"error": {"kind": ..., "message": ...}}`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use chrono::Utc;

use scopeforge::config::{self, Config};
use scopeforge::core::evaluate::{PASS_COSINE, PASS_OVERLAP};
use scopeforge::core::models::{FeedbackRecord, IngestMetadata, RetrievalResult};
use scopeforge::core::Error;
use scopeforge::knowledge::KnowledgeBase;
use scopeforge::evaluate::EvaluationMode;
use scopeforge::orchestrator::{Analysis, Analyzer, FrameworkAnalysis};
use scopeforge::{db, evaluate, migrate, seed, server};

/// ScopeForge: scope drafting and maturity scoring against prior projects.
#[derive(Parser)]
#[command(name = "sfg", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sfg.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest a text file into the knowledge base.
    Ingest {
        /// File to ingest (`-` for stdin).
        file: PathBuf,

        /// Project the text belongs to.
        #[arg(long)]
        project: String,

        /// Source type recorded on each chunk.
        #[arg(long, default_value = "document")]
        source_type: String,

        /// Document key; re-ingesting under the same key replaces the previous version.
        #[arg(long)]
        key: Option<String>,

        /// Tag to attach (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Show the precedent chunks most similar to a query.
    Retrieve {
        query: String,

        /// Number of results (defaults to `[retrieval] top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Draft a scope document for project notes and score it.
    Analyze {
        /// Notes file (`-` for stdin).
        file: PathBuf,

        /// Print the full analysis as JSON.
        #[arg(long)]
        json: bool,

        /// Also generate a content framework (sitemap, page requirements, CTA).
        #[arg(long)]
        framework: bool,
    },

    /// Re-index stakeholder feedback so later retrievals see it.
    Feedback {
        #[arg(long)]
        project: String,

        comment: String,

        #[arg(long)]
        reviewer: Option<String>,
    },

    /// Rebuild the in-memory index from persisted chunks.
    Rebuild,

    /// Index every `Example*` directory under a data directory.
    Seed { dir: PathBuf },

    /// Analyze each example's input and compare with its expected output.
    Evaluate {
        dir: PathBuf,

        /// Also write the per-example results as JSON.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Compare with the closest knowledge-base document's expected
        /// output instead of calling the reasoning providers.
        #[arg(long)]
        auto_ref: bool,
    },

    /// Start the HTTP server on `[server] bind`.
    Serve,
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "scopeforge=info,scopeforge_core=info",
        1 => "scopeforge=debug,scopeforge_core=debug",
        _ => "scopeforge=trace,scopeforge_core=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<Error>() {
            Some(core_err) => {
                let body = serde_json::json!({ "error": core_err.failure() });
                eprintln!("{}", body);
            }
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

async fn analyzer(cfg: &Config) -> anyhow::Result<Analyzer> {
    let kb = Arc::new(KnowledgeBase::open(cfg).await?);
    Ok(Analyzer::from_config(cfg, kb))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            file,
            project,
            source_type,
            key,
            tags,
        } => {
            let text = read_input(&file)?;
            let kb = KnowledgeBase::open(&cfg).await?;
            let mut metadata = IngestMetadata::new(project, source_type);
            metadata.tags.extend(tags);
            metadata.document_key = key;
            let report = kb.ingest(&text, &metadata).await?;
            println!(
                "Ingested {} chunk(s) as {}",
                report.chunk_ids.len(),
                report.document_key
            );
        }
        Commands::Retrieve { query, k } => {
            let kb = KnowledgeBase::open(&cfg).await?;
            let k = k.unwrap_or_else(|| kb.top_k());
            print_retrieval(&kb.retrieve(&query, k).await?);
        }
        Commands::Analyze {
            file,
            json,
            framework,
        } => {
            let notes = read_input(&file)?;
            let analyzer = analyzer(&cfg).await?;
            let analysis = analyzer.analyze(&notes).await?;
            let framework = if framework {
                Some(analyzer.frame(&notes, &analysis.draft).await?)
            } else {
                None
            };
            if json {
                let body = match &framework {
                    Some(f) => serde_json::json!({ "analysis": analysis, "framework": f }),
                    None => serde_json::to_value(&analysis)?,
                };
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print_analysis(&analysis);
                if let Some(f) = &framework {
                    print_framework(f);
                }
            }
        }
        Commands::Feedback {
            project,
            comment,
            reviewer,
        } => {
            let kb = KnowledgeBase::open(&cfg).await?;
            let record = FeedbackRecord {
                project_id: project,
                reviewer_comment: comment,
                reviewer,
                timestamp: Utc::now(),
            };
            let report = kb.reindex_feedback(&record).await?;
            println!("Feedback indexed ({} chunk(s)).", report.chunk_ids.len());
        }
        Commands::Rebuild => {
            let kb = KnowledgeBase::open(&cfg).await?;
            let n = kb.index().rebuild().await?;
            println!("Index rebuilt: {} chunk(s).", n);
        }
        Commands::Seed { dir } => {
            let examples = seed::scan_examples(&dir, &cfg.seed.include_globs)?;
            let kb = KnowledgeBase::open(&cfg).await?;
            let reports = seed::seed_examples(&kb, &examples).await?;
            for r in &reports {
                println!("  {} → {} chunk(s)", r.example, r.chunks);
            }
            println!("Seeded {} of {} example(s).", reports.len(), examples.len());
        }
        Commands::Evaluate { dir, out, auto_ref } => {
            let examples = seed::scan_examples(&dir, &cfg.seed.include_globs)?;
            let analyzer = analyzer(&cfg).await?;
            let mode = if auto_ref {
                EvaluationMode::AutoRef
            } else {
                EvaluationMode::Generate
            };
            let results = evaluate::evaluate_examples(&analyzer, &examples, mode).await;
            for r in &results {
                match (&r.metrics, &r.error) {
                    (Some(m), _) => println!(
                        "  {}: cosine={:.3}, overlap={:.3}, pass={}",
                        r.name, m.cosine_similarity, m.token_overlap, m.pass
                    ),
                    (None, Some(e)) => println!("  {}: failed: {}", r.name, e),
                    (None, None) => println!("  {}: no result", r.name),
                }
            }
            let passed = results.iter().filter(|r| r.passed()).count();
            println!(
                "Completed. {}/{} examples passed thresholds (cosine >= {:.2} or overlap >= {:.2}).",
                passed,
                results.len(),
                PASS_COSINE,
                PASS_OVERLAP
            );
            if let Some(path) = out {
                std::fs::write(&path, serde_json::to_string_pretty(&results)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }
        Commands::Serve => {
            let analyzer = Arc::new(analyzer(&cfg).await?);
            server::run_server(&cfg, analyzer).await?;
        }
    }

    Ok(())
}

fn print_retrieval(result: &RetrievalResult) {
    if result.is_empty() {
        println!("No precedent found.");
        return;
    }
    for (i, hit) in result.hits.iter().enumerate() {
        let preview: String = hit.chunk.text.chars().take(120).collect();
        println!(
            "{}. [{:.3}] {} ({}) {}",
            i + 1,
            hit.similarity,
            hit.chunk.source_project_id,
            hit.chunk.source_type,
            preview.replace('\n', " ")
        );
    }
}

fn print_analysis(analysis: &Analysis) {
    let a = &analysis.assessment;
    println!("Maturity: {} ({})", a.score, a.status);
    println!("Providers: {}", a.basis.providers.join(", "));
    if a.basis.no_precedent {
        println!("No usable precedent in the knowledge base.");
    }
    if analysis.degraded {
        println!("Degraded: see warnings in the trace.");
    }
    println!();
    for (name, text) in &analysis.draft.sections {
        println!("## {}\n{}\n", name, text);
    }
    if !a.gaps.is_empty() {
        println!("Gaps:");
        for g in &a.gaps {
            println!("  - [{}] {}: {}", g.severity.as_str(), g.category, g.description);
        }
    }
    println!(
        "Quality: {:?} (terminology {:.2}, {} issue(s))",
        analysis.quality.status,
        analysis.quality.terminology_score,
        analysis.quality.issues.len()
    );
}

fn print_framework(f: &FrameworkAnalysis) {
    println!();
    println!("Content framework ({}):", f.providers.join(", "));
    for item in &f.framework.sitemap {
        println!("  - {}: {}", item.page, item.description);
    }
    for detail in &f.framework.page_details {
        println!("## {}\n{}\n", detail.page, detail.requirements);
    }
    println!("CTA: {}", f.framework.cta_strategy);
    println!(
        "Framework quality: {:?} (glossary {:.2}, {} issue(s))",
        f.quality.status,
        f.quality.glossary_coverage,
        f.quality.issues.len()
    );
}
