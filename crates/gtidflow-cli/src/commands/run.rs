use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use gtidflow_config::{Config, StreamSource};
use gtidflow_core::{EventStream, GtidSet, ResumeFilter, SchemaRegistry};
use gtidflow_mysql::{BinlogEventStream, JsonLinesStream};
use gtidflow_nsq::{NsqHttpPublisher, Publisher, RetryingPublisher};
use gtidflow_state::{CheckpointStore, FileCheckpointStore};
use tracing::{info, warn};

use super::{load_registry, mysql_settings};
use crate::runner::{self, RunSummary};
use crate::shutdown::{self, Shutdown};

pub async fn cmd_run(config: Config) -> Result<()> {
    info!("Starting gtidflow");

    let registry = load_registry(&config).await?;

    let store = Arc::new(
        FileCheckpointStore::open(&config.storage.file_path, &config.storage.init_gtidset)
            .with_context(|| {
                format!(
                    "Failed to open checkpoint file {}",
                    config.storage.file_path.display()
                )
            })?,
    );
    let position = store.read().context("Failed to read checkpoint")?;
    info!(gtid_set = %position, "Resuming from checkpoint");

    let http = NsqHttpPublisher::new(
        config.nsq.resolved_address(),
        config.nsq.request_timeout(),
    )
    .context("Failed to create NSQ client")?;
    if let Err(e) = http.ping().await {
        // Publishes retry per message; an unreachable nsqd at startup is not fatal.
        warn!(error = %e, "nsqd did not answer ping");
    }
    let publisher = RetryingPublisher::new(http, config.nsq.max_retries);

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(shutdown::listen_for_signals(trigger));

    let summary = match config.stream.source {
        StreamSource::Binlog => {
            let events = BinlogEventStream::open(
                &mysql_settings(&config),
                config.mysql.server_id,
                &position,
            )
            .await
            .context("Failed to start binlog replication")?;
            drive(events, position, &registry, &store, &publisher, &config, shutdown).await
        }
        StreamSource::Events => {
            let events = JsonLinesStream::open(&config.stream.events)
                .await
                .with_context(|| {
                    format!("Failed to open event source '{}'", config.stream.events)
                })?;
            drive(events, position, &registry, &store, &publisher, &config, shutdown).await
        }
    };

    print_summary(&summary);

    if let Some(error) = summary.fatal_error {
        anyhow::bail!("Replication stream failed: {}", error);
    }
    Ok(())
}

async fn drive<S, C, P>(
    events: S,
    position: GtidSet,
    registry: &SchemaRegistry,
    checkpoints: &C,
    publisher: &P,
    config: &Config,
    shutdown: Shutdown,
) -> RunSummary
where
    S: EventStream,
    C: CheckpointStore + ?Sized,
    P: Publisher,
{
    let mut stream = ResumeFilter::new(events, position);
    let summary = runner::run_loop(
        &mut stream,
        registry,
        checkpoints,
        publisher,
        config.stream.poll_timeout(),
        shutdown,
    )
    .await;

    info!(
        skipped_events = stream.skipped(),
        "Skipped events of already executed transactions"
    );
    summary
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "Run Summary:".bold());
    println!("{:<24} {:>10}", "Events", summary.events_seen);
    println!("{:<24} {:>10}", "Published", summary.records_published);
    println!("{:<24} {:>10}", "Checkpoints", summary.checkpoints_persisted);
    println!("{:<24} {:>10}", "Skipped", summary.skipped_events);
    println!("{:<24} {:>10}", "Resyncs", summary.resyncs);

    let failures = summary.publish_failures + summary.checkpoint_failures;
    let line = format!("{:<24} {:>10}", "Failures", failures);
    if failures > 0 {
        println!("{}", line.red());
    } else {
        println!("{}", line.green());
    }
    println!();
}
