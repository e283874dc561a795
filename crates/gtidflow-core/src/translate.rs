use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::{RawEvent, RowsEvent};
use crate::gtid::Gtid;
use crate::record::{Action, ChangeRecord};
use crate::schema::{SchemaRegistry, TableSchema};
use crate::types::{RawValue, RowMap};

/// What the control loop should do with one raw event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A transaction starts under this GTID. It is not yet safe to persist.
    Begin(Gtid),
    /// The current transaction committed: its GTID may be merged into the
    /// checkpoint once everything before it was handed to the publisher.
    Commit,
    /// A row change on a monitored table, ready to publish.
    Change(ChangeRecord),
    /// Housekeeping event with nothing to do.
    Ignored,
}

/// Classify a raw event and build its outcome.
///
/// Pure apart from logging: the registry is only read.
pub fn translate(event: &RawEvent, registry: &SchemaRegistry) -> Result<Outcome> {
    match event {
        RawEvent::Gtid {
            source_id,
            sequence,
        } => Ok(Outcome::Begin(Gtid::new(*source_id, *sequence))),
        RawEvent::WriteRows(rows) => build_change(Action::Insert, rows, registry),
        RawEvent::UpdateRows(rows) => build_change(Action::Update, rows, registry),
        RawEvent::DeleteRows(rows) => build_change(Action::Delete, rows, registry),
        RawEvent::FormatDescription
        | RawEvent::PreviousGtids { .. }
        | RawEvent::Rotate { .. }
        | RawEvent::Heartbeat
        | RawEvent::TableMap { .. } => Ok(Outcome::Ignored),
        RawEvent::Xid { .. } => Ok(Outcome::Commit),
        RawEvent::Query { query, .. } => Ok(query_outcome(query)),
        RawEvent::Unknown => Err(Error::UnknownEventType),
    }
}

/// A query event ends its transaction unless it opens one. DDL and
/// non-transactional `COMMIT` statements carry no XID.
fn query_outcome(query: &str) -> Outcome {
    if query.trim().eq_ignore_ascii_case("BEGIN") {
        Outcome::Ignored
    } else {
        Outcome::Commit
    }
}

fn build_change(action: Action, event: &RowsEvent, registry: &SchemaRegistry) -> Result<Outcome> {
    let table = match registry.query(&event.database, &event.table) {
        Ok(table) => table,
        Err(e) => {
            debug!(
                database = %event.database,
                table = %event.table,
                "Skipping rows event for unmonitored table"
            );
            return Err(e);
        }
    };

    // Update images come in before/after pairs and are kept or dropped together.
    let group = if action == Action::Update { 2 } else { 1 };
    let mut rows = Vec::with_capacity(event.rows.len());
    let mut first_error = None;

    for (chunk_index, chunk) in event.rows.chunks(group).enumerate() {
        match build_rows(table, chunk, group) {
            Ok(built) => rows.extend(built),
            Err(e) => {
                warn!(
                    database = %event.database,
                    table = %event.table,
                    row = chunk_index * group,
                    error = %e,
                    "Dropping row that does not match table schema"
                );
                first_error.get_or_insert(e);
            }
        }
    }

    if rows.is_empty() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    Ok(Outcome::Change(ChangeRecord::new(
        &event.database,
        &event.table,
        action,
        rows,
    )))
}

fn build_rows(table: &TableSchema, chunk: &[Vec<RawValue>], group: usize) -> Result<Vec<RowMap>> {
    if chunk.len() != group {
        return Err(Error::UnpairedUpdateRow);
    }
    chunk.iter().map(|tuple| build_row(table, tuple)).collect()
}

fn build_row(table: &TableSchema, tuple: &[RawValue]) -> Result<RowMap> {
    let mut row = RowMap::with_capacity(tuple.len());
    for (index, raw) in tuple.iter().enumerate() {
        let column = table.column_at(index)?;
        row.insert(column.name.clone(), column.format(raw.clone()));
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;
    use crate::types::Value;
    use uuid::Uuid;

    const SID: &str = "36c0fcec-5447-11ea-8dc1-0242ac110002";

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::default();
        registry.insert(
            TableSchema::new(
                "db1",
                "user",
                vec![
                    ColumnDef::new("id", 1, false, "int"),
                    ColumnDef::new("name", 2, true, "varchar"),
                ],
            )
            .unwrap(),
        );
        registry.insert(
            TableSchema::new(
                "db1",
                "order",
                vec![
                    ColumnDef::new("id", 1, false, "bigint"),
                    ColumnDef::new("paid_at", 2, true, "datetime"),
                ],
            )
            .unwrap(),
        );
        registry
    }

    fn rows(database: &str, table: &str, rows: Vec<Vec<RawValue>>) -> RowsEvent {
        RowsEvent {
            database: database.into(),
            table: table.into(),
            rows,
        }
    }

    #[test]
    fn test_write_rows_becomes_insert() {
        let event = RawEvent::write_rows("db1", "user", vec![vec![1.into(), "hiwjd".into()]]);

        let Outcome::Change(record) = translate(&event, &registry()).unwrap() else {
            panic!("expected a change record");
        };
        assert_eq!(record.schema, "db1");
        assert_eq!(record.table, "user");
        assert_eq!(record.action, Action::Insert);
        assert_eq!(record.rows.len(), 1);
        assert_eq!(record.rows[0]["id"], Value::Integer(1));
        assert_eq!(record.rows[0]["name"], Value::from("hiwjd"));
    }

    #[test]
    fn test_update_and_delete_actions() {
        let update = RawEvent::UpdateRows(rows(
            "db1",
            "user",
            vec![
                vec![1.into(), "old".into()],
                vec![1.into(), "new".into()],
            ],
        ));
        let Outcome::Change(record) = translate(&update, &registry()).unwrap() else {
            panic!("expected a change record");
        };
        assert_eq!(record.action, Action::Update);
        assert_eq!(record.rows[0]["name"], Value::from("old"));
        assert_eq!(record.rows[1]["name"], Value::from("new"));

        let delete = RawEvent::DeleteRows(rows("db1", "user", vec![vec![2.into(), RawValue::Null]]));
        let Outcome::Change(record) = translate(&delete, &registry()).unwrap() else {
            panic!("expected a change record");
        };
        assert_eq!(record.action, Action::Delete);
        assert!(record.rows[0]["name"].is_null());
    }

    #[test]
    fn test_values_are_formatted_per_column() {
        let event = RawEvent::write_rows(
            "db1",
            "order",
            vec![vec![7.into(), "0000-00-00 00:00:00".into()]],
        );
        let Outcome::Change(record) = translate(&event, &registry()).unwrap() else {
            panic!("expected a change record");
        };
        assert!(record.rows[0]["paid_at"].is_null());
    }

    #[test]
    fn test_gtid_event_begins_transaction() {
        let source_id = Uuid::parse_str(SID).unwrap();
        let event = RawEvent::Gtid {
            source_id,
            sequence: 42,
        };

        let outcome = translate(&event, &registry()).unwrap();
        let Outcome::Begin(gtid) = outcome else {
            panic!("expected a transaction start");
        };
        assert_eq!(gtid.to_string(), format!("{}:42", SID));
    }

    #[test]
    fn test_housekeeping_events_are_ignored() {
        let events = [
            RawEvent::FormatDescription,
            RawEvent::Heartbeat,
            RawEvent::Query {
                database: "db1".into(),
                query: "BEGIN".into(),
            },
            RawEvent::TableMap {
                database: "db1".into(),
                table: "user".into(),
            },
        ];
        for event in &events {
            assert_eq!(translate(event, &registry()).unwrap(), Outcome::Ignored);
        }
    }

    #[test]
    fn test_transaction_end_markers_commit() {
        let query = |q: &str| RawEvent::Query {
            database: "db1".into(),
            query: q.into(),
        };
        let events = [
            RawEvent::Xid { xid: 9 },
            query("ALTER TABLE user ADD COLUMN age INT"),
            query("COMMIT"),
        ];
        for event in &events {
            assert_eq!(translate(event, &registry()).unwrap(), Outcome::Commit);
        }
        assert_eq!(
            translate(&query("  begin "), &registry()).unwrap(),
            Outcome::Ignored
        );
    }

    #[test]
    fn test_unknown_event_type() {
        assert!(matches!(
            translate(&RawEvent::Unknown, &registry()),
            Err(Error::UnknownEventType)
        ));
    }

    #[test]
    fn test_unmonitored_table() {
        let event = RawEvent::write_rows("db1", "audit", vec![vec![1.into()]]);
        let err = translate(&event, &registry()).unwrap_err();
        assert!(err.is_table_not_found());
    }

    #[test]
    fn test_mismatched_row_is_dropped() {
        let event = RawEvent::write_rows(
            "db1",
            "user",
            vec![
                vec![1.into(), "a".into(), "extra".into()],
                vec![2.into(), "b".into()],
            ],
        );
        let Outcome::Change(record) = translate(&event, &registry()).unwrap() else {
            panic!("expected a change record");
        };
        assert_eq!(record.rows.len(), 1);
        assert_eq!(record.rows[0]["id"], Value::Integer(2));
    }

    #[test]
    fn test_all_rows_mismatched_is_an_error() {
        let event = RawEvent::write_rows(
            "db1",
            "user",
            vec![vec![1.into(), "a".into(), "extra".into()]],
        );
        assert!(matches!(
            translate(&event, &registry()),
            Err(Error::ColumnLookup { index: 2, .. })
        ));
    }

    #[test]
    fn test_update_pair_is_dropped_together() {
        let event = RawEvent::UpdateRows(rows(
            "db1",
            "user",
            vec![
                vec![1.into(), "old".into(), "extra".into()],
                vec![1.into(), "new".into()],
                vec![2.into(), "before".into()],
                vec![2.into(), "after".into()],
            ],
        ));
        let Outcome::Change(record) = translate(&event, &registry()).unwrap() else {
            panic!("expected a change record");
        };
        assert_eq!(record.rows.len(), 2);
        assert_eq!(record.rows[0]["name"], Value::from("before"));
        assert_eq!(record.rows[1]["name"], Value::from("after"));
    }

    #[test]
    fn test_update_with_bad_after_image_publishes_nothing() {
        let event = RawEvent::UpdateRows(rows(
            "db1",
            "user",
            vec![
                vec![1.into(), "old".into()],
                vec![1.into(), "new".into(), "extra".into()],
            ],
        ));
        assert!(matches!(
            translate(&event, &registry()),
            Err(Error::ColumnLookup { index: 2, .. })
        ));
    }

    #[test]
    fn test_unpaired_update_row_is_dropped() {
        let event = RawEvent::UpdateRows(rows(
            "db1",
            "user",
            vec![
                vec![1.into(), "old".into()],
                vec![1.into(), "new".into()],
                vec![2.into(), "orphan".into()],
            ],
        ));
        let Outcome::Change(record) = translate(&event, &registry()).unwrap() else {
            panic!("expected a change record");
        };
        assert_eq!(record.rows.len(), 2);
        assert_eq!(record.rows[1]["name"], Value::from("new"));
    }
}
