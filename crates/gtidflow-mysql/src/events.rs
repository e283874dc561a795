use std::path::Path;

use gtidflow_core::{EventStream, RawEvent, StreamError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};

use crate::error::MysqlResult;

type LineSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Decoded binlog events, one JSON object per line.
///
/// A line that does not decode is skipped and reported as
/// [`StreamError::NeedResync`]; a read error ends the stream.
pub struct JsonLinesStream {
    lines: Lines<LineSource>,
    line_number: u64,
    closed: bool,
}

impl JsonLinesStream {
    /// Read from a file, or from stdin when `source` is `-`.
    pub async fn open(source: &str) -> MysqlResult<Self> {
        if source == "-" {
            info!("Reading binlog events from stdin");
            return Ok(Self::from_reader(BufReader::new(tokio::io::stdin())));
        }

        let path = Path::new(source);
        let file = tokio::fs::File::open(path).await?;
        info!(path = %path.display(), "Reading binlog events from file");
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        let source: LineSource = Box::new(reader);
        Self {
            lines: source.lines(),
            line_number: 0,
            closed: false,
        }
    }
}

impl EventStream for JsonLinesStream {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, StreamError> {
        if self.closed {
            return Ok(None);
        }

        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(e) => return Err(StreamError::Fatal(e.to_string())),
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            return match serde_json::from_str::<RawEvent>(&line) {
                Ok(event) => Ok(Some(event)),
                Err(e) => {
                    warn!(line = self.line_number, error = %e, "Undecodable event line");
                    Err(StreamError::NeedResync)
                }
            };
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
