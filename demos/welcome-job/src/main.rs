//! A minimal end-to-end demo of rw-jobs: one job class, an in-memory
//! adapter, and the `work` / `workoff` / `clear` subcommands a real
//! supervisor's CLI would expose. Not a substitute for a production
//! process manager, just enough to see the pieces move.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use rw_jobs::job::register_job;
use rw_jobs::{scheduler, Job, JobRegistry, Worker, WorkerConfig};
use rw_jobs_testing::MemoryStore;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct WelcomeJob {
    email: String,
}

#[async_trait]
impl Job for WelcomeJob {
    async fn perform(&self) -> Result<()> {
        info!(email = %self.email, "sending welcome email");
        Ok(())
    }
}

#[derive(Parser)]
#[command(name = "welcome-job-demo", about = "rw-jobs worked example")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Queue to operate on; omit to span every queue.
    #[arg(long, global = true)]
    queue: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Schedule a handful of sample jobs, then run a worker forever.
    Work,
    /// Schedule a handful of sample jobs, then run a worker until the
    /// queue drains and exit.
    Workoff,
    /// Delete every persisted record.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let store = Arc::new(MemoryStore::new());
    scheduler::configure(store.clone());

    let registry = JobRegistry::new();
    register_job::<WelcomeJob>(&registry);

    match cli.command {
        Command::Clear => {
            let worker = Worker::new(
                store,
                registry,
                WorkerConfig {
                    clear: true,
                    ..WorkerConfig::default()
                },
            );
            worker.run().await
        }
        Command::Work | Command::Workoff => {
            seed_sample_jobs().await?;

            let workoff = matches!(cli.command, Command::Workoff);
            let worker = Worker::new(
                store,
                registry,
                WorkerConfig {
                    queue: cli.queue,
                    workoff,
                    forever: !workoff,
                    ..WorkerConfig::default()
                },
            );
            worker.run().await
        }
    }
}

async fn seed_sample_jobs() -> Result<()> {
    for email in ["ada@example.com", "grace@example.com", "alan@example.com"] {
        WelcomeJob {
            email: email.to_string(),
        }
        .perform_later()
        .await?;
    }
    Ok(())
}
