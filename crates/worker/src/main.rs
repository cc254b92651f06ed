//! `mimas-worker` -- runs the Mimas rule set over a stream of requests.
//!
//! Reads one JSON request (recipe-step parameters) per line on stdin and
//! writes the resulting invocations to stdout, one per line. Rejected
//! requests are logged and skipped.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default                 | Description                              |
//! |-------------------------|----------|-------------------------|------------------------------------------|
//! | `MIMAS_OUTPUT`          | no       | `messages`              | `messages` (JSON) or `commands`          |
//! | `MIMAS_CLOUDBURSTING`   | no       | `false`                 | Route eligible jobs to the cloud cluster |
//! | `MIMAS_CLOUD_BEAMLINES` | no       | `i03,i04,i04-1,i24`     | Beamlines eligible for cloud routing     |
//! | `MIMAS_CLOUD_RECIPES`   | no       | `mrbump,fast-ep,big-ep` | Recipe fragments eligible for the cloud  |

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mimas_worker::config::WorkerConfig;
use mimas_worker::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mimas_worker=info,mimas_core=info,mimas_handlers=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    let dispatcher =
        Dispatcher::from_config(&config).context("Failed to register the facility rules")?;

    tracing::info!(
        output = ?config.output,
        cloudbursting = config.cloudbursting,
        handlers = dispatcher.registry().len(),
        "Starting mimas-worker",
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut processed = 0u64;
    let mut rejected = 0u64;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        processed += 1;
        match dispatcher.process_line(&line) {
            Ok(outputs) => {
                for output in outputs {
                    stdout.write_all(output.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
                stdout.flush().await?;
            }
            Err(e) => {
                rejected += 1;
                tracing::error!(error = %e, "Request rejected");
            }
        }
    }

    tracing::info!(processed, rejected, "Input closed, shutting down");
    Ok(())
}
