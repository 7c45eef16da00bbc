use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use portti::admission::Admission;
use portti::catalog::StaticCatalog;
use portti::db::event::EventOutbox;
use portti::db::job::update_status;
use portti::db::open::{open_db, release_or_rollback};
use portti::error::AdmissionError;
use portti::event::{Dispatcher, LogSink};
use portti::format::RequestFormat;
use portti::job::JobStatus;
use portti::normalize::probe::TcpProbe;
use portti::request::message::{Message, MessageError};
use portti::request::schema::RequestSchema;

#[derive(Parser, Debug)]
#[command(name = "portti")]
#[command(about = "Admit job requests into a batch job queue", version)]
struct Args {
    /// A directory for the job database
    #[arg(short, long)]
    work_dir: PathBuf,

    /// Applications, execution systems and storage systems as JSON
    #[arg(short, long)]
    catalog: PathBuf,

    /// Roll back every database change before exiting
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Admit a job request file
    Admit {
        /// Path to the job request
        #[arg(short, long)]
        request: PathBuf,

        /// User submitting the request
        #[arg(short, long)]
        owner: String,

        #[arg(short, long, value_enum, default_value_t = RequestFormat::Json)]
        format: RequestFormat,

        /// How long to wait when checking sftp inputs are reachable
        #[arg(long, default_value_t = 5)]
        probe_timeout_secs: u64,
    },

    /// Move an admitted job to a new status
    Transition {
        #[arg(short, long)]
        job: Uuid,

        /// e.g. QUEUED, RUNNING, FINISHED
        #[arg(short, long)]
        status: JobStatus,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    info!("terve! starting up :)");

    let args = Args::parse();
    let catalog = StaticCatalog::load(&args.catalog)?;
    let conn = open_db(&args.work_dir)
        .with_context(|| format!("Can't open database in {}", args.work_dir.display()))?;

    let mut dispatcher = Dispatcher::new();
    dispatcher.register(LogSink);
    dispatcher.register(EventOutbox::new(&conn));

    let succeeded = match args.command {
        Command::Admit { request, owner, format, probe_timeout_secs } => {
            let schema = RequestSchema::load()?;
            let probe = TcpProbe::new(Duration::from_secs(probe_timeout_secs))
                .context("Can't start reachability probe")?;
            let message = Message { path: request, format };

            let admitted = match message.read(&schema, &catalog) {
                Ok(request) => Admission::new(&catalog, &probe).admit(&conn, &owner, &request, &dispatcher),
                Err(MessageError::Rejected(rejection)) => Err(AdmissionError::Rejected(rejection)),
                Err(err) => return Err(err.into()),
            };

            match admitted {
                Ok(admitted) => {
                    println!("{}", serde_json::to_string_pretty(&admitted.job)?);
                    true
                }
                Err(AdmissionError::Rejected(rejection)) => {
                    warn!("Job request rejected");
                    let body = json!({ "status": "error", "kind": rejection.kind().as_str(), "message": rejection.reason() });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    false
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Transition { job, status } => {
            let (job, events) = update_status(&conn, job, status, &dispatcher)?;
            info!("Job {} is now {} ({} events dispatched)", job.uuid, job.status, events.len());
            println!("{}", serde_json::to_string_pretty(&job)?);
            true
        }
    };

    release_or_rollback(&conn, args.dry_run)?;
    if !succeeded {
        process::exit(1);
    }
    Ok(())
}
