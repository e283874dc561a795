use std::time::Duration;

use gtidflow_core::{
    translate, ChangeRecord, EventStream, Gtid, Outcome, RawEvent, SchemaRegistry, StreamError,
};
use gtidflow_nsq::Publisher;
use gtidflow_state::CheckpointStore;
use tracing::{debug, error, info, warn};

use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    Draining,
    Stopped,
}

/// Counters reported when the control loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events_seen: u64,
    pub records_published: u64,
    pub publish_failures: u64,
    pub checkpoints_persisted: u64,
    pub checkpoint_failures: u64,
    /// Events for unmonitored tables or that could not be translated.
    pub skipped_events: u64,
    pub resyncs: u64,
    /// Set when the stream failed and the loop stopped because of it.
    pub fatal_error: Option<String>,
}

/// Drive events from `stream` until shutdown, end of stream or a fatal
/// stream error, then close the stream.
///
/// Each event is fully handled (checkpoint written or record published)
/// before the next wait starts. A transaction's GTID is persisted only at
/// its commit, after all of its changes went to the publisher, so a
/// restart replays rather than loses an interrupted transaction.
pub async fn run_loop<S, C, P>(
    stream: &mut S,
    registry: &SchemaRegistry,
    checkpoints: &C,
    publisher: &P,
    poll_timeout: Duration,
    mut shutdown: Shutdown,
) -> RunSummary
where
    S: EventStream,
    C: CheckpointStore + ?Sized,
    P: Publisher,
{
    let mut summary = RunSummary::default();
    let mut state = LoopState::Running;
    let mut pending: Option<Gtid> = None;

    while state != LoopState::Stopped {
        state = match state {
            LoopState::Running => {
                if shutdown.is_triggered() {
                    info!("Shutdown requested, draining");
                    LoopState::Draining
                } else {
                    let next = tokio::select! {
                        biased;
                        _ = shutdown.wait() => continue,
                        next = tokio::time::timeout(poll_timeout, stream.next_event()) => next,
                    };

                    match next {
                        Err(_) => {
                            debug!("No event within poll timeout");
                            LoopState::Running
                        }
                        Ok(Err(StreamError::NeedResync)) => {
                            summary.resyncs += 1;
                            debug!("Stream requested resync");
                            LoopState::Running
                        }
                        Ok(Err(StreamError::Fatal(message))) => {
                            error!(error = %message, "Replication stream failed");
                            summary.fatal_error = Some(message);
                            LoopState::Draining
                        }
                        Ok(Ok(None)) => {
                            info!("Replication stream ended");
                            LoopState::Draining
                        }
                        Ok(Ok(Some(event))) => {
                            summary.events_seen += 1;
                            handle_event(
                                &event,
                                registry,
                                checkpoints,
                                publisher,
                                &mut pending,
                                &mut summary,
                            )
                            .await;
                            LoopState::Running
                        }
                    }
                }
            }
            LoopState::Draining => {
                if let Some(gtid) = pending.take() {
                    info!(gtid = %gtid, "Stopping inside a transaction, it will be replayed");
                }
                stream.close().await;
                LoopState::Stopped
            }
            LoopState::Stopped => LoopState::Stopped,
        };
    }

    info!(
        events = summary.events_seen,
        published = summary.records_published,
        publish_failures = summary.publish_failures,
        checkpoints = summary.checkpoints_persisted,
        checkpoint_failures = summary.checkpoint_failures,
        skipped = summary.skipped_events,
        "Control loop stopped"
    );
    summary
}

async fn handle_event<C, P>(
    event: &RawEvent,
    registry: &SchemaRegistry,
    checkpoints: &C,
    publisher: &P,
    pending: &mut Option<Gtid>,
    summary: &mut RunSummary,
) where
    C: CheckpointStore + ?Sized,
    P: Publisher,
{
    match translate(event, registry) {
        Ok(Outcome::Begin(gtid)) => {
            if let Some(open) = pending.replace(gtid) {
                warn!(gtid = %open, "Transaction ended without a commit event, not persisting it");
            }
        }
        Ok(Outcome::Commit) => match pending.take() {
            Some(gtid) => persist(&gtid, checkpoints, summary),
            None => debug!("Commit outside a GTID transaction"),
        },
        Ok(Outcome::Change(record)) => {
            if publish(&record, publisher).await {
                summary.records_published += 1;
            } else {
                summary.publish_failures += 1;
            }
        }
        Ok(Outcome::Ignored) => {}
        Err(e) if e.is_table_not_found() => summary.skipped_events += 1,
        Err(e) => {
            warn!(event = event.kind(), error = %e, "Failed to translate event");
            summary.skipped_events += 1;
        }
    }
}

fn persist<C: CheckpointStore + ?Sized>(gtid: &Gtid, checkpoints: &C, summary: &mut RunSummary) {
    match checkpoints.update(&gtid.to_string()) {
        Ok(()) => summary.checkpoints_persisted += 1,
        Err(e) => {
            error!(gtid = %gtid, error = %e, "Failed to persist checkpoint");
            summary.checkpoint_failures += 1;
        }
    }
}

async fn publish<P: Publisher>(record: &ChangeRecord, publisher: &P) -> bool {
    let payload = match record.encode() {
        Ok(payload) => payload,
        Err(e) => {
            error!(schema = %record.schema, table = %record.table, error = %e, "Failed to encode change record");
            return false;
        }
    };

    match publisher.publish(record.topic(), payload).await {
        Ok(()) => {
            debug!(
                schema = %record.schema,
                table = %record.table,
                action = %record.action,
                rows = record.rows.len(),
                "Published change"
            );
            true
        }
        Err(e) => {
            error!(
                schema = %record.schema,
                table = %record.table,
                action = %record.action,
                error = %e,
                "Failed to publish change"
            );
            false
        }
    }
}
