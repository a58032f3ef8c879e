//! # Book Analyzer CLI (`bka`)
//!
//! The `bka` binary drives the analyzer from the terminal and starts the
//! HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! bka --config ./config/bka.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bka init` | Create the user database and schema |
//! | `bka register <email>` | Create an account |
//! | `bka login <email>` | Check credentials |
//! | `bka models` | List Gemini models usable with the configured key |
//! | `bka ingest <pdf>` | Extract and segment a PDF, report what was found |
//! | `bka summary <pdf>` | Generate a structured summary |
//! | `bka questions <pdf>` | Generate discussion questions |
//! | `bka faqs <pdf>` | Generate FAQs |
//! | `bka ask <pdf> "<question>"` | Answer a question with page citations |
//! | `bka insights <pdf>` | Readability, sentiment arc, keywords |
//! | `bka export <pdf> --format html` | Full analysis report |
//! | `bka history show\|clear` | Inspect or clear interaction history |
//! | `bka serve` | Start the HTTP API |
//!
//! Without a Gemini API key (`--api-key`, `generation.api_key`, or
//! `GEMINI_API_KEY`) generation runs in offline mode.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use book_analyzer::auth::{self, AuthStore, INVALID_LOGIN_MESSAGE};
use book_analyzer::config::{self, Config};
use book_analyzer::export::{write_report, ExportFormat};
use book_analyzer::generation;
use book_analyzer::models::{AnalysisDepth, ReadingPurpose};
use book_analyzer::session::{Services, Session, SettingsUpdate};
use book_analyzer::{db, migrate, server};

/// Book Analyzer: upload a PDF, index it semantically, and explore it with
/// summaries, Q&A, FAQs, and reading analytics.
#[derive(Parser)]
#[command(name = "bka", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/bka.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/bka.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the user database. Idempotent.
    Init,

    /// Register a new account.
    Register {
        email: String,
        #[arg(long)]
        password: String,
        /// Must match `--password`; defaults to it.
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Verify an account's credentials.
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },

    /// List Gemini models that support content generation.
    Models {
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Extract and segment a PDF without generating anything.
    Ingest {
        #[command(flatten)]
        doc: DocArgs,
    },

    /// Generate a structured summary.
    Summary {
        #[command(flatten)]
        doc: DocArgs,
    },

    /// Generate discussion questions.
    Questions {
        #[command(flatten)]
        doc: DocArgs,
    },

    /// Generate frequently asked questions with answers.
    Faqs {
        #[command(flatten)]
        doc: DocArgs,
    },

    /// Answer a question about the document.
    Ask {
        #[command(flatten)]
        doc: DocArgs,
        question: String,
    },

    /// Readability, sentiment arc, and keyword statistics.
    Insights {
        #[command(flatten)]
        doc: DocArgs,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Generate summary, questions, and FAQs, then write a report.
    Export {
        #[command(flatten)]
        doc: DocArgs,
        /// `txt`, `json`, or `html`.
        #[arg(long, default_value = "txt")]
        format: String,
        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Inspect or clear the interaction history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Start the HTTP API.
    Serve,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Show preferences and recent interactions.
    Show {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Delete all recorded interactions.
    Clear,
}

/// Options shared by every command that reads a PDF.
#[derive(Args)]
struct DocArgs {
    /// Path to the PDF file.
    pdf: PathBuf,

    /// Window size in characters (500-3000).
    #[arg(long)]
    segment_size: Option<usize>,

    /// `brief`, `standard`, or `deep`.
    #[arg(long, value_parser = parse_depth)]
    depth: Option<AnalysisDepth>,

    /// `general`, `exam`, `research`, or `revision`.
    #[arg(long, value_parser = parse_purpose)]
    purpose: Option<ReadingPurpose>,

    /// Gemini API key; overrides config and environment.
    #[arg(long)]
    api_key: Option<String>,
}

fn parse_depth(s: &str) -> Result<AnalysisDepth, String> {
    AnalysisDepth::parse(s).ok_or_else(|| format!("invalid depth '{}': use brief, standard, or deep", s))
}

fn parse_purpose(s: &str) -> Result<ReadingPurpose, String> {
    ReadingPurpose::parse(s)
        .ok_or_else(|| format!("invalid purpose '{}': use general, exam, research, or revision", s))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Register {
            email,
            password,
            confirm_password,
        } => {
            let confirm = confirm_password.unwrap_or_else(|| password.clone());
            auth::validate_signup(&email, &password, &confirm)?;
            let store = auth_store(&cfg).await?;
            let message = store.register(email.trim(), &password).await?;
            println!("{}", message);
        }
        Commands::Login { email, password } => {
            let store = auth_store(&cfg).await?;
            match store.login(email.trim(), &password).await? {
                Some(user) => println!("Logged in as {} ({})", user.email, user.role.as_str()),
                None => bail!(INVALID_LOGIN_MESSAGE),
            }
        }
        Commands::Models { api_key } => {
            let key = api_key
                .or_else(|| cfg.generation.credential())
                .context("No API key: pass --api-key or set GEMINI_API_KEY")?;
            let models = generation::list_models(&key, &cfg.generation).await?;
            if models.is_empty() {
                println!("No models with generateContent support found.");
            }
            for name in models {
                println!("{}", name);
            }
        }
        Commands::Ingest { doc } => {
            let session = open_document(&cfg, &doc).await?;
            if let Some(info) = session.document() {
                println!("{}", info.name);
                println!("  pages:          {}", info.page_count);
                println!("  pages w/ text:  {:?}", info.pages_with_text);
                println!("  segments:       {}", info.segments);
                println!("  index ready:    {}", info.index_ready);
                println!("  generation:     {}", info.generation);
            }
        }
        Commands::Summary { doc } => {
            let mut session = open_document(&cfg, &doc).await?;
            println!("{}", session.summary().await?);
        }
        Commands::Questions { doc } => {
            let mut session = open_document(&cfg, &doc).await?;
            for (i, q) in session.questions().await?.iter().enumerate() {
                println!("{}. {}", i + 1, q);
            }
        }
        Commands::Faqs { doc } => {
            let mut session = open_document(&cfg, &doc).await?;
            for faq in session.faqs().await? {
                println!("Q: {}\nA: {}\n", faq.question, faq.answer);
            }
        }
        Commands::Ask { doc, question } => {
            let mut session = open_document(&cfg, &doc).await?;
            println!("{}", session.ask(&question).await?.answer);
        }
        Commands::Insights { doc, json } => {
            let session = open_document(&cfg, &doc).await?;
            let insights = session.insights()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&insights)?);
            } else {
                match &insights.readability {
                    Some(r) => println!("Readability: {} ({})", r.score, r.level),
                    None => println!("Readability: n/a"),
                }
                println!("\nTop keywords:");
                for k in &insights.keywords {
                    println!("  {:<20} {}", k.term, k.count);
                }
                println!("\nSentiment arc:");
                for p in &insights.sentiment_arc {
                    println!("  segment {:>4}  {:+.2}", p.segment, p.polarity);
                }
            }
        }
        Commands::Export {
            doc,
            format,
            output,
        } => {
            let format = ExportFormat::parse(&format)?;
            let mut session = open_document(&cfg, &doc).await?;
            session.summary().await?;
            session.questions().await?;
            session.faqs().await?;
            let report = session.export(format)?;
            write_report(&report, output.as_deref())?;
        }
        Commands::History { action } => {
            let services = Services::new(cfg.clone())?;
            let session = Session::new(auth::guest(), services);
            match action {
                HistoryAction::Show { limit } => {
                    let profile = session.profile();
                    println!("User ID:     {}", profile.user_id);
                    println!("Last active: {}", profile.last_active.format("%Y-%m-%d %H:%M"));
                    println!(
                        "Preferences: {} depth, {} tone",
                        profile.preferences.summary_depth, profile.preferences.interaction_style
                    );
                    let history = history_lines(&session, limit);
                    if history.is_empty() {
                        println!("No history yet.");
                    } else {
                        println!("\nRecent history:");
                        for line in history {
                            println!("  {}", line);
                        }
                    }
                }
                HistoryAction::Clear => {
                    println!("{}", session.clear_history()?);
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn auth_store(cfg: &Config) -> anyhow::Result<AuthStore> {
    let pool = db::connect(cfg).await?;
    migrate::apply(&pool).await?;
    Ok(AuthStore::new(pool))
}

/// Guest session with `doc` uploaded.
async fn open_document(cfg: &Config, doc: &DocArgs) -> anyhow::Result<Session> {
    let services = Services::new(cfg.clone())?;
    let mut session = Session::new(auth::guest(), services);
    session.update_settings(SettingsUpdate {
        segment_size: doc.segment_size,
        analysis_depth: doc.depth,
        reading_purpose: doc.purpose,
        api_key: doc.api_key.clone(),
    })?;

    let bytes = std::fs::read(&doc.pdf)
        .with_context(|| format!("Failed to read PDF: {}", doc.pdf.display()))?;
    session.upload(&file_name(&doc.pdf), &bytes).await?;
    Ok(session)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}

/// One display line per recent interaction, newest first.
fn history_lines(session: &Session, limit: usize) -> Vec<String> {
    session
        .recent_history(limit)
        .into_iter()
        .map(|item| {
            let label = item.kind.replace('_', " ");
            let detail = item
                .details
                .as_ref()
                .and_then(|d| d.get("goal"))
                .and_then(|g| g.as_str())
                .map(String::from)
                .or_else(|| item.query.as_ref().map(|q| format!("'{}'", q)))
                .unwrap_or_default();
            format!(
                "{}  {:<20} {}",
                item.timestamp.format("%Y-%m-%d %H:%M"),
                label,
                detail
            )
        })
        .collect()
}
