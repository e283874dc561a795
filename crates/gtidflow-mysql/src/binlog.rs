//! Live replication from the source server.
//!
//! The stream registers as a replica under `server_id` and asks for every
//! transaction missing from the stored GTID set. Rows are decoded against
//! the table map the server sends ahead of them, so tables must use
//! `binlog_row_image = FULL` for positions to line up with the catalog.

use futures::StreamExt;
use gtidflow_core::{EventStream, Gtid, GtidSet, RawEvent, RawValue, RowsEvent, StreamError};
use mysql_async::binlog::events::{Event, EventData, RowsEventData};
use mysql_async::binlog::row::BinlogRow;
use mysql_async::consts::ColumnType;
use mysql_async::{BinlogStream, BinlogStreamRequest, Conn, GnoInterval, Sid, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connect::{base_opts, ConnectionSettings};
use crate::error::{MysqlError, MysqlResult};

/// Binlog events straight from the server, decoded into [`RawEvent`]s.
///
/// A transport error is fatal. An event that cannot be decoded is dropped
/// and reported as [`StreamError::NeedResync`].
pub struct BinlogEventStream {
    stream: Option<BinlogStream>,
}

impl BinlogEventStream {
    /// Connect and request the binlog from the first transaction not in
    /// `executed`.
    pub async fn open(
        settings: &ConnectionSettings,
        server_id: u32,
        executed: &GtidSet,
    ) -> MysqlResult<Self> {
        let conn = Conn::new(base_opts(settings)).await.map_err(|e| {
            MysqlError::Connection(format!(
                "failed to connect to {}:{}: {}",
                settings.host, settings.port, e
            ))
        })?;

        let request = BinlogStreamRequest::new(server_id)
            .with_gtid()
            .with_gtid_set(request_sids(executed));

        let stream = conn
            .get_binlog_stream(request)
            .await
            .map_err(|e| MysqlError::Replication(e.to_string()))?;

        info!(
            host = %settings.host,
            port = settings.port,
            server_id,
            gtid_set = %executed,
            "Streaming binlog"
        );
        Ok(Self {
            stream: Some(stream),
        })
    }
}

impl EventStream for BinlogEventStream {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, StreamError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(None);
            };

            let event = match stream.next().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(StreamError::Fatal(e.to_string())),
                None => return Ok(None),
            };

            match decode(&event, stream) {
                Ok(Some(raw)) => return Ok(Some(raw)),
                Ok(None) => continue,
                Err(reason) => {
                    warn!(error = %reason, "Undecodable binlog event");
                    return Err(StreamError::NeedResync);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.close().await {
                warn!(error = %e, "Failed to close binlog connection");
            }
        }
    }
}

/// The executed set in the shape `COM_BINLOG_DUMP_GTID` expects: one block
/// per source, intervals end-exclusive.
fn request_sids(executed: &GtidSet) -> Vec<Sid<'static>> {
    executed
        .sources()
        .map(|(source_id, intervals)| {
            let intervals = intervals
                .iter()
                .map(|i| GnoInterval::new(i.start, i.end.saturating_add(1)))
                .collect();
            Sid::new(*source_id.as_bytes()).with_intervals(intervals)
        })
        .collect()
}

/// `Ok(None)` for events the translator never needs to see.
fn decode(event: &Event, stream: &BinlogStream) -> Result<Option<RawEvent>, String> {
    let Some(data) = event.read_data().map_err(|e| e.to_string())? else {
        return Ok(None);
    };

    let raw = match data {
        EventData::GtidEvent(e) => {
            RawEvent::gtid_event(Gtid::new(Uuid::from_bytes(e.sid()), e.gno()))
        }
        EventData::XidEvent(e) => RawEvent::Xid { xid: e.xid },
        EventData::QueryEvent(e) => RawEvent::Query {
            database: e.schema().into_owned(),
            query: e.query().into_owned(),
        },
        EventData::RotateEvent(e) => RawEvent::Rotate {
            next_log: e.name().into_owned(),
            position: e.position(),
        },
        EventData::TableMapEvent(e) => RawEvent::TableMap {
            database: e.database_name().into_owned(),
            table: e.table_name().into_owned(),
        },
        EventData::FormatDescriptionEvent(_) => RawEvent::FormatDescription,
        EventData::PreviousGtidsEvent(_) => RawEvent::PreviousGtids {
            gtid_set: String::new(),
        },
        EventData::HeartbeatEvent => RawEvent::Heartbeat,
        EventData::RowsEvent(rows) => rows_event(&rows, stream)?,
        EventData::IncidentEvent(_) | EventData::UnknownEvent => RawEvent::Unknown,
        _ => {
            debug!(event_type = event.header().event_type_raw(), "Skipping binlog event");
            return Ok(None);
        }
    };
    Ok(Some(raw))
}

fn rows_event(rows: &RowsEventData<'_>, stream: &BinlogStream) -> Result<RawEvent, String> {
    let tme = stream
        .get_tme(rows.table_id())
        .ok_or_else(|| format!("no table map for table id {}", rows.table_id()))?;

    let mut decoded = RowsEvent {
        database: tme.database_name().into_owned(),
        table: tme.table_name().into_owned(),
        rows: Vec::new(),
    };

    for row in rows.rows(tme) {
        let (before, after) = row.map_err(|e| e.to_string())?;
        // Updates yield before then after, matching the pair layout.
        for image in [before, after].into_iter().flatten() {
            decoded.rows.push(row_values(image)?);
        }
    }

    Ok(match rows {
        RowsEventData::WriteRowsEventV1(_) | RowsEventData::WriteRowsEvent(_) => {
            RawEvent::WriteRows(decoded)
        }
        RowsEventData::UpdateRowsEventV1(_)
        | RowsEventData::UpdateRowsEvent(_)
        | RowsEventData::PartialUpdateRowsEvent(_) => RawEvent::UpdateRows(decoded),
        RowsEventData::DeleteRowsEventV1(_) | RowsEventData::DeleteRowsEvent(_) => {
            RawEvent::DeleteRows(decoded)
        }
    })
}

fn row_values(mut row: BinlogRow) -> Result<Vec<RawValue>, String> {
    let types: Vec<ColumnType> = row.columns_ref().iter().map(|c| c.column_type()).collect();

    let mut values = Vec::with_capacity(row.len());
    for (index, column_type) in types.into_iter().enumerate() {
        let value = match row.take(index) {
            Some(binlog_value) => Value::try_from(binlog_value).map_err(|e| e.to_string())?,
            None => Value::NULL,
        };
        values.push(raw_value(value, column_type));
    }
    Ok(values)
}

/// Temporal values are rendered the way the text protocol prints them, so
/// the column formatter treats both sources alike.
fn raw_value(value: Value, column_type: ColumnType) -> RawValue {
    match value {
        Value::NULL => RawValue::Null,
        Value::Int(i) => RawValue::Int(i),
        Value::UInt(u) => RawValue::UInt(u),
        Value::Float(f) => RawValue::Float(f as f64),
        Value::Double(f) => RawValue::Float(f),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => RawValue::Text(text),
            Err(e) => RawValue::Bytes(e.into_bytes()),
        },
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let date = format!("{:04}-{:02}-{:02}", year, month, day);
            if matches!(
                column_type,
                ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE
            ) {
                RawValue::Text(date)
            } else {
                RawValue::Text(format!(
                    "{} {:02}:{:02}:{:02}{}",
                    date,
                    hour,
                    minute,
                    second,
                    fraction(micros)
                ))
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => RawValue::Text(format!(
            "{}{:02}:{:02}:{:02}{}",
            if negative { "-" } else { "" },
            u64::from(days) * 24 + u64::from(hours),
            minutes,
            seconds,
            fraction(micros)
        )),
    }
}

fn fraction(micros: u32) -> String {
    if micros == 0 {
        String::new()
    } else {
        format!(".{:06}", micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SID: &str = "36c0fcec-5447-11ea-8dc1-0242ac110002";
    const SID2: &str = "3e11fa47-71ca-11e1-9e33-c80aa9429562";

    #[test]
    fn test_request_sids_are_end_exclusive() {
        let executed = GtidSet::parse(&format!("{}:1-5:7,{}:3", SID, SID2)).unwrap();
        let sids = request_sids(&executed);

        assert_eq!(sids.len(), 2);
        assert_eq!(sids[0].uuid(), *Uuid::parse_str(SID).unwrap().as_bytes());
        assert_eq!(
            sids[0].intervals(),
            &[GnoInterval::new(1, 6), GnoInterval::new(7, 8)]
        );
        assert_eq!(sids[1].uuid(), *Uuid::parse_str(SID2).unwrap().as_bytes());
        assert_eq!(sids[1].intervals(), &[GnoInterval::new(3, 4)]);
    }

    #[test]
    fn test_empty_set_requests_everything() {
        assert!(request_sids(&GtidSet::new()).is_empty());
    }

    #[test]
    fn test_scalar_values() {
        let other = ColumnType::MYSQL_TYPE_LONG;
        assert_eq!(raw_value(Value::NULL, other), RawValue::Null);
        assert_eq!(raw_value(Value::Int(-4), other), RawValue::Int(-4));
        assert_eq!(raw_value(Value::UInt(u64::MAX), other), RawValue::UInt(u64::MAX));
        assert_eq!(raw_value(Value::Double(0.25), other), RawValue::Float(0.25));
        assert_eq!(
            raw_value(Value::Bytes(b"hiwjd".to_vec()), ColumnType::MYSQL_TYPE_VARCHAR),
            RawValue::Text("hiwjd".into())
        );
        assert_eq!(
            raw_value(Value::Bytes(vec![0xff, 0x00]), ColumnType::MYSQL_TYPE_BLOB),
            RawValue::Bytes(vec![0xff, 0x00])
        );
    }

    #[test]
    fn test_temporal_values_use_text_protocol_layout() {
        assert_eq!(
            raw_value(
                Value::Date(2020, 3, 10, 15, 4, 5, 0),
                ColumnType::MYSQL_TYPE_DATETIME2
            ),
            RawValue::Text("2020-03-10 15:04:05".into())
        );
        assert_eq!(
            raw_value(
                Value::Date(2020, 3, 10, 15, 4, 5, 120),
                ColumnType::MYSQL_TYPE_TIMESTAMP2
            ),
            RawValue::Text("2020-03-10 15:04:05.000120".into())
        );
        assert_eq!(
            raw_value(Value::Date(0, 0, 0, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATETIME),
            RawValue::Text("0000-00-00 00:00:00".into())
        );
        assert_eq!(
            raw_value(Value::Date(2020, 3, 10, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATE),
            RawValue::Text("2020-03-10".into())
        );
        assert_eq!(
            raw_value(Value::Time(true, 1, 2, 3, 4, 0), ColumnType::MYSQL_TYPE_TIME2),
            RawValue::Text("-26:03:04".into())
        );
    }
}
