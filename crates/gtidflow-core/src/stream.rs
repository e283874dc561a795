//! The replication stream seam.

use std::collections::VecDeque;
use std::future::Future;

use thiserror::Error;
use tracing::debug;

use crate::event::RawEvent;
use crate::gtid::GtidSet;

/// Errors reported by an [`EventStream`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The stream lost its place (a garbled or out-of-order event) but can
    /// keep going. The control loop re-polls.
    #[error("stream needs resync")]
    NeedResync,

    /// The stream cannot continue.
    #[error("stream failed: {0}")]
    Fatal(String),
}

/// A source of decoded replication events.
///
/// The bounded wait is the caller's job; `next_event` may wait indefinitely.
pub trait EventStream: Send {
    /// Next event, or `None` once the stream has ended.
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<RawEvent>, StreamError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// A stream over a fixed list of events.
#[derive(Debug, Default)]
pub struct MemoryStream {
    events: VecDeque<Result<RawEvent, StreamError>>,
    hold_open: bool,
    closed: bool,
}

impl MemoryStream {
    pub fn new(events: impl IntoIterator<Item = RawEvent>) -> Self {
        Self::with_results(events.into_iter().map(Ok))
    }

    /// A stream that also yields errors in between events.
    pub fn with_results(results: impl IntoIterator<Item = Result<RawEvent, StreamError>>) -> Self {
        Self {
            events: results.into_iter().collect(),
            hold_open: false,
            closed: false,
        }
    }

    /// Wait forever once drained instead of reporting end of stream.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventStream for MemoryStream {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, StreamError> {
        match self.events.pop_front() {
            Some(result) => result.map(Some),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Drops transactions already contained in a stored position.
///
/// Every event from a GTID event up to the next GTID event belongs to that
/// transaction. When the GTID is already executed the whole group is
/// dropped, so resuming from a checkpoint never re-publishes its changes.
pub struct ResumeFilter<S> {
    inner: S,
    executed: GtidSet,
    skipping: bool,
    skipped: u64,
}

impl<S: EventStream> ResumeFilter<S> {
    pub fn new(inner: S, executed: GtidSet) -> Self {
        Self {
            inner,
            executed,
            skipping: false,
            skipped: 0,
        }
    }

    /// Number of events dropped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<S: EventStream> EventStream for ResumeFilter<S> {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, StreamError> {
        loop {
            let Some(event) = self.inner.next_event().await? else {
                return Ok(None);
            };

            if let Some(gtid) = event.gtid() {
                self.skipping = self.executed.contains(&gtid);
                if self.skipping {
                    debug!(gtid = %gtid, "Skipping already executed transaction");
                }
            }

            if self.skipping {
                self.skipped += 1;
                continue;
            }

            return Ok(Some(event));
        }
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}
