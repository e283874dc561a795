//! Decoded replication events as handed to the translator.
//!
//! The serde form is one JSON object per event, tagged by `type`:
//!
//! ```json
//! {"type":"gtid","source_id":"36c0fcec-5447-11ea-8dc1-0242ac110002","sequence":42}
//! {"type":"write_rows","database":"db1","table":"user","rows":[[1,"hiwjd"]]}
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gtid::Gtid;
use crate::types::RawValue;

/// Row data of a write, update or delete event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsEvent {
    pub database: String,
    pub table: String,
    /// Positional row tuples. Update events hold before/after pairs.
    pub rows: Vec<Vec<RawValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    FormatDescription,
    PreviousGtids {
        #[serde(default)]
        gtid_set: String,
    },
    Rotate {
        #[serde(default)]
        next_log: String,
        #[serde(default)]
        position: u64,
    },
    Heartbeat,
    Query {
        #[serde(default)]
        database: String,
        #[serde(default)]
        query: String,
    },
    TableMap {
        #[serde(default)]
        database: String,
        #[serde(default)]
        table: String,
    },
    Xid {
        #[serde(default)]
        xid: u64,
    },
    Gtid {
        source_id: Uuid,
        sequence: u64,
    },
    WriteRows(RowsEvent),
    UpdateRows(RowsEvent),
    DeleteRows(RowsEvent),
    /// Any event type the decoder does not know.
    #[serde(other)]
    Unknown,
}

impl RawEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::FormatDescription => "format_description",
            RawEvent::PreviousGtids { .. } => "previous_gtids",
            RawEvent::Rotate { .. } => "rotate",
            RawEvent::Heartbeat => "heartbeat",
            RawEvent::Query { .. } => "query",
            RawEvent::TableMap { .. } => "table_map",
            RawEvent::Xid { .. } => "xid",
            RawEvent::Gtid { .. } => "gtid",
            RawEvent::WriteRows(_) => "write_rows",
            RawEvent::UpdateRows(_) => "update_rows",
            RawEvent::DeleteRows(_) => "delete_rows",
            RawEvent::Unknown => "unknown",
        }
    }

    /// The transaction id carried by a GTID event.
    pub fn gtid(&self) -> Option<Gtid> {
        match self {
            RawEvent::Gtid {
                source_id,
                sequence,
            } => Some(Gtid::new(*source_id, *sequence)),
            _ => None,
        }
    }

    pub fn gtid_event(gtid: Gtid) -> Self {
        RawEvent::Gtid {
            source_id: gtid.source_id,
            sequence: gtid.sequence,
        }
    }

    pub fn write_rows(
        database: impl Into<String>,
        table: impl Into<String>,
        rows: Vec<Vec<RawValue>>,
    ) -> Self {
        RawEvent::WriteRows(RowsEvent {
            database: database.into(),
            table: table.into(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_events() {
        let gtid: RawEvent = serde_json::from_str(
            r#"{"type":"gtid","source_id":"36c0fcec-5447-11ea-8dc1-0242ac110002","sequence":42}"#,
        )
        .unwrap();
        assert_eq!(
            gtid.gtid().unwrap().to_string(),
            "36c0fcec-5447-11ea-8dc1-0242ac110002:42"
        );

        let rows: RawEvent = serde_json::from_str(
            r#"{"type":"write_rows","database":"db1","table":"user","rows":[[1,"hiwjd"]]}"#,
        )
        .unwrap();
        assert_eq!(
            rows,
            RawEvent::write_rows("db1", "user", vec![vec![1.into(), "hiwjd".into()]])
        );
        assert_eq!(rows.kind(), "write_rows");
    }

    #[test]
    fn test_decode_lenient_housekeeping_events() {
        let rotate: RawEvent =
            serde_json::from_str(r#"{"type":"rotate","next_log":"binlog.000002","position":4}"#)
                .unwrap();
        assert_eq!(rotate.kind(), "rotate");

        let xid: RawEvent = serde_json::from_str(r#"{"type":"xid"}"#).unwrap();
        assert_eq!(xid, RawEvent::Xid { xid: 0 });
    }

    #[test]
    fn test_decode_unknown_type() {
        let event: RawEvent = serde_json::from_str(r#"{"type":"incident"}"#).unwrap();
        assert_eq!(event, RawEvent::Unknown);
        assert!(event.gtid().is_none());
    }
}
