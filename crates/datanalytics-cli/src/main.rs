use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use datanalytics_core::app::{SessionKind, SessionResolver};
use datanalytics_core::impls::{CsvDatasetReader, InMemoryProjectStore, ShellRunner};
use datanalytics_core::{
    Orchestrator, OrchestratorBuilder, OrchestratorConfig, PollStatus, StatusDocument, TaskHandle,
};

#[derive(Parser)]
#[command(name = "datanalytics")]
#[command(about = "Run data analytics jobs through the orchestration core")]
struct Cli {
    /// JSON file holding the project records
    #[arg(long, env = "PROJECTS_FILE", default_value = "projects.json", global = true)]
    projects: PathBuf,

    /// Status poll interval in milliseconds
    #[arg(long, default_value_t = 500, global = true)]
    poll_ms: u64,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 3600, global = true)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run data preparation for an owner_project name
    Prep { full_name: String },
    /// Train, then evaluate against the newest training session
    TrainEval { full_name: String },
    /// Generate the exploratory HTML report for a project
    Report { username: String, project: String },
    /// Print the newest session directory for a project
    Session {
        #[arg(value_enum)]
        kind: SessionArg,
        project: String,
    },
}

enum JobRequest {
    Prep(String),
    TrainEval(String),
    Report { username: String, project: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum SessionArg {
    Train,
    Eval,
}

impl From<SessionArg> for SessionKind {
    fn from(arg: SessionArg) -> Self {
        match arg {
            SessionArg::Train => SessionKind::Train,
            SessionArg::Eval => SessionKind::Eval,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "datanalytics=info,datanalytics_core=info".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = OrchestratorConfig::from_env().context("invalid configuration")?;

    let job = match cli.command {
        Command::Session { kind, project } => {
            let resolver = SessionResolver::new(config.sessions_root());
            println!("{}", resolver.latest(kind.into(), &project).await);
            return Ok(());
        }
        Command::Prep { full_name } => JobRequest::Prep(full_name),
        Command::TrainEval { full_name } => JobRequest::TrainEval(full_name),
        Command::Report { username, project } => JobRequest::Report { username, project },
    };

    let store = Arc::new(load_store(&cli.projects).await?);
    let orchestrator = OrchestratorBuilder::new(config)
        .with_standard_executors(
            Arc::new(ShellRunner::new()),
            store.clone(),
            Arc::new(CsvDatasetReader),
        )?
        .build()?;

    let workers = orchestrator.spawn_workers();
    tracing::info!(workers = workers.len(), "workers started");

    let dispatcher = orchestrator.dispatcher();
    let handle = match &job {
        JobRequest::Prep(name) => dispatcher.enqueue_data_prep(name).await?,
        JobRequest::TrainEval(name) => dispatcher.enqueue_train_and_eval(name).await?,
        JobRequest::Report { username, project } => {
            dispatcher.enqueue_report(username, project).await?
        }
    };
    println!("{}", serde_json::json!({ "task_id": handle.to_string() }));

    let waited = tokio::time::timeout(
        Duration::from_secs(cli.timeout_secs),
        poll_until_terminal(&orchestrator, &handle, Duration::from_millis(cli.poll_ms.max(1))),
    )
    .await;

    workers.shutdown_and_join().await;
    store
        .save(&cli.projects)
        .await
        .with_context(|| format!("failed to save {}", cli.projects.display()))?;

    let Ok(document) = waited else {
        bail!("task {handle} did not finish within {}s", cli.timeout_secs);
    };
    println!("{}", serde_json::to_string_pretty(&document)?);

    if document.status != PollStatus::Done {
        std::process::exit(1);
    }
    Ok(())
}

async fn load_store(path: &Path) -> anyhow::Result<InMemoryProjectStore> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        tracing::warn!(path = %path.display(), "project file not found, starting empty");
        return Ok(InMemoryProjectStore::new());
    }
    InMemoryProjectStore::load(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))
}

async fn poll_until_terminal(
    orchestrator: &Orchestrator,
    handle: &TaskHandle,
    interval: Duration,
) -> StatusDocument {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let document = orchestrator.reconciler().reconcile(handle).await;
        if document.is_terminal() {
            return document;
        }
        tracing::debug!(handle = %handle, message = ?document.message, "still running");
    }
}
