use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use mood_journal::alerts::parse_timestamp;
use mood_journal::api;
use mood_journal::archive;
use mood_journal::auth::{authenticate, SessionContext};
use mood_journal::classifier::{EmotionClassifier, InferenceClassifier, RemoteClassifier};
use mood_journal::config::AppConfig;
use mood_journal::db::{self, PgEntryStore};
use mood_journal::journal::JournalService;
use mood_journal::logging;
use mood_journal::report;
use mood_journal::store::EntryStore;
use mood_journal::JournalError;

#[derive(Parser)]
#[command(name = "mood-journal")]
#[command(about = "Student mood journal with distress alerts for doctors", long_about = None)]
struct Cli {
    /// JSON config file (alert policy, limits, credentials, classifier)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Login {
    #[arg(long)]
    user: String,
    #[arg(long)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo journal entries
    Seed,
    /// Run the classification service
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },
    /// Submit a journal entry as a student
    Submit {
        #[command(flatten)]
        login: Login,
        #[arg(long)]
        text: String,
    },
    /// Show your own emotion history
    History {
        #[command(flatten)]
        login: Login,
    },
    /// List students showing signs of distress
    Alerts {
        #[command(flatten)]
        login: Login,
    },
    /// Show every entry of one student
    Entries {
        #[command(flatten)]
        login: Login,
        #[arg(long)]
        student: String,
    },
    /// Write the doctor's dashboard as markdown
    Dashboard {
        #[command(flatten)]
        login: Login,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Export the entry log as CSV
    Export {
        #[command(flatten)]
        login: Login,
        #[arg(long, default_value = "entries.csv")]
        out: PathBuf,
    },
    /// Evaluate alerts over an exported CSV without a database
    EvaluateCsv {
        #[arg(long)]
        csv: PathBuf,
        /// Evaluation instant (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<String>,
    },
}

async fn open_store() -> anyhow::Result<PgEntryStore> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;
    Ok(PgEntryStore::new(db::connect(&database_url).await?))
}

fn build_classifier(config: &AppConfig) -> anyhow::Result<Arc<dyn EmotionClassifier>> {
    let settings = &config.classifier;
    if let Some(url) = &settings.service_url {
        tracing::info!(url = %url, "using remote classification service");
        return Ok(Arc::new(RemoteClassifier::new(url.clone(), settings.timeout())?));
    }
    if let Some(url) = &settings.model_url {
        tracing::info!(url = %url, "using model inference endpoint");
        return Ok(Arc::new(InferenceClassifier::new(
            url.clone(),
            settings.model_token.clone(),
            settings.timeout(),
        )?));
    }
    bail!("no classifier configured: set CLASSIFIER_URL or MODEL_URL")
}

fn sign_in(config: &AppConfig, login: &Login) -> anyhow::Result<SessionContext> {
    let credentials = config.credential_table();
    Ok(authenticate(&credentials, &login.user, &login.password)?)
}

async fn journal(config: &AppConfig, classifier: Arc<dyn EmotionClassifier>) -> anyhow::Result<JournalService> {
    let store: Arc<dyn EntryStore> = Arc::new(open_store().await?);
    Ok(JournalService::new(
        store,
        classifier,
        config.alerts.policy()?,
        config.limits,
    ))
}

/// Reviewer views never classify, so they get a classifier that refuses.
struct NoClassifier;

#[async_trait::async_trait]
impl EmotionClassifier for NoClassifier {
    async fn classify(&self, _text: &str) -> mood_journal::Result<mood_journal::models::Prediction> {
        Err(JournalError::ClassificationUnavailable(
            "no classifier configured".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init_tracing(&config.log_filter)?;

    match cli.command {
        Commands::InitDb => {
            let store = open_store().await?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = open_store().await?;
            let inserted = db::seed(&store).await?;
            println!("Inserted {inserted} demo entries.");
        }
        Commands::Serve { addr } => {
            let classifier = match &config.classifier.model_url {
                Some(url) => {
                    let model: Arc<dyn EmotionClassifier> = Arc::new(InferenceClassifier::new(
                        url.clone(),
                        config.classifier.model_token.clone(),
                        config.classifier.timeout(),
                    )?);
                    Some(model)
                }
                None => {
                    tracing::error!("MODEL_URL not set, /classify will answer 500");
                    None
                }
            };
            let addr = addr.unwrap_or_else(|| config.bind_addr.clone());
            api::run_server(&addr, classifier, config.limits).await?;
        }
        Commands::Submit { login, text } => {
            let ctx = sign_in(&config, &login)?;
            let service = journal(&config, build_classifier(&config)?).await?;
            match service.submit(&ctx, &text).await {
                Ok(submission) => println!("{}", submission.message()),
                Err(JournalError::ValidationFailed(messages)) => bail!(messages.join(" ")),
                Err(err) => return Err(err).context("An error occurred"),
            }
        }
        Commands::History { login } => {
            let ctx = sign_in(&config, &login)?;
            let service = journal(&config, Arc::new(NoClassifier)).await?;
            let entries = service.own_history(&ctx).await?;
            if entries.is_empty() {
                println!("You have no previous entries.");
            } else {
                let mut output = String::new();
                report::entry_table(&mut output, &entries);
                print!("{output}");
            }
        }
        Commands::Alerts { login } => {
            let ctx = sign_in(&config, &login)?;
            let service = journal(&config, Arc::new(NoClassifier)).await?;
            let alerts = service.alerts(&ctx, Utc::now()).await?;
            if alerts.is_empty() {
                println!("No students are currently showing signs of distress.");
            }
            for alert in alerts {
                println!("- {}", alert.message());
            }
        }
        Commands::Entries { login, student } => {
            let ctx = sign_in(&config, &login)?;
            let service = journal(&config, Arc::new(NoClassifier)).await?;
            let entries = service.subject_entries(&ctx, &student).await?;
            println!("Entries for {student}:");
            let mut output = String::new();
            report::entry_table(&mut output, &entries);
            print!("{output}");
        }
        Commands::Dashboard { login, out } => {
            let ctx = sign_in(&config, &login)?;
            let service = journal(&config, Arc::new(NoClassifier)).await?;
            let dashboard = service.dashboard(&ctx, Utc::now()).await?;
            let output = report::build_report(&dashboard, service.policy());
            std::fs::write(&out, output)?;
            println!("Dashboard written to {}.", out.display());
        }
        Commands::Export { login, out } => {
            let ctx = sign_in(&config, &login)?;
            ctx.require(mood_journal::models::Role::Reviewer)?;
            let store = open_store().await?;
            let entries = store.all_entries().await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let written = archive::write_csv(file, &entries)?;
            println!("Exported {written} entries to {}.", out.display());
        }
        Commands::EvaluateCsv { csv, now } => {
            let now = match now {
                Some(raw) => parse_timestamp(&raw)?,
                None => Utc::now(),
            };
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let histories = archive::read_histories(file)?;
            let alerts = config.alerts.policy()?.evaluate(&histories, now)?;
            if alerts.is_empty() {
                println!("No students are currently showing signs of distress.");
            }
            for alert in alerts {
                println!("- {}", alert.message());
            }
        }
    }

    Ok(())
}
