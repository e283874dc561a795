use std::fs;
use std::path::Path;

use gtidflow_core::{
    translate, ColumnDef, Error, Outcome, RawEvent, SchemaRegistry, TableSchema,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Fixture {
    name: String,
    description: String,
    tables: Vec<TableDef>,
    events: Vec<RawEvent>,
    expected: Vec<Expected>,
}

#[derive(Debug, Deserialize)]
struct TableDef {
    database: String,
    name: String,
    /// `[name, data_type]` pairs in column order.
    columns: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum Expected {
    Begin {
        gtid: String,
    },
    Commit,
    Change {
        schema: String,
        table: String,
        action: String,
        rows: Vec<serde_json::Value>,
    },
    Ignored,
    TableNotFound,
    UnknownEvent,
}

fn build_registry(tables: &[TableDef]) -> SchemaRegistry {
    let mut registry = SchemaRegistry::default();
    for def in tables {
        let columns = def
            .columns
            .iter()
            .enumerate()
            .map(|(i, (name, ty))| ColumnDef::new(name, i as u32 + 1, true, ty))
            .collect();
        registry.insert(TableSchema::new(&def.database, &def.name, columns).unwrap());
    }
    registry
}

fn check(index: usize, result: gtidflow_core::Result<Outcome>, expected: &Expected) {
    match (result, expected) {
        (Ok(Outcome::Begin(gtid)), Expected::Begin { gtid: want }) => {
            assert_eq!(gtid.to_string(), *want, "Event {} GTID mismatch", index);
        }
        (Ok(Outcome::Commit), Expected::Commit) => {}
        (
            Ok(Outcome::Change(record)),
            Expected::Change {
                schema,
                table,
                action,
                rows,
            },
        ) => {
            assert_eq!(record.schema, *schema, "Event {} schema mismatch", index);
            assert_eq!(record.table, *table, "Event {} table mismatch", index);
            assert_eq!(record.action.as_str(), action, "Event {} action mismatch", index);

            let payload: serde_json::Value =
                serde_json::from_slice(&record.encode().unwrap()).unwrap();
            assert_eq!(
                payload["Rows"],
                serde_json::Value::Array(rows.clone()),
                "Event {} rows mismatch",
                index
            );
        }
        (Ok(Outcome::Ignored), Expected::Ignored) => {}
        (Err(e), Expected::TableNotFound) if e.is_table_not_found() => {}
        (Err(Error::UnknownEventType), Expected::UnknownEvent) => {}
        (actual, expected) => panic!(
            "Event {} outcome mismatch: got {:?}, expected {:?}",
            index, actual, expected
        ),
    }
}

fn load_and_run_fixture(path: &Path) {
    let content = fs::read_to_string(path).expect("Failed to read fixture file");
    let fixture: Fixture = serde_json::from_str(&content).expect("Failed to parse fixture");

    println!(
        "Running fixture: {} - {}",
        fixture.name, fixture.description
    );

    assert_eq!(
        fixture.events.len(),
        fixture.expected.len(),
        "Fixture {} must list one expectation per event",
        fixture.name
    );

    let registry = build_registry(&fixture.tables);
    for (i, (event, expected)) in fixture.events.iter().zip(&fixture.expected).enumerate() {
        check(i, translate(event, &registry), expected);
    }

    println!("  PASSED");
}

#[test]
fn test_all_fixtures() {
    let fixtures_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");

    let mut fixture_count = 0;
    for entry in fs::read_dir(&fixtures_dir).expect("Failed to read fixtures directory") {
        let path = entry.expect("Failed to read directory entry").path();
        if path.extension().map_or(false, |ext| ext == "json") {
            load_and_run_fixture(&path);
            fixture_count += 1;
        }
    }

    assert!(
        fixture_count > 0,
        "No fixture files found in {:?}",
        fixtures_dir
    );
}

#[test]
fn test_basic_insert_fixture() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/basic_insert.json");
    load_and_run_fixture(&path);
}
