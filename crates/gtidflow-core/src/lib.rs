pub mod error;
pub mod event;
pub mod gtid;
pub mod record;
pub mod schema;
pub mod stream;
pub mod translate;
pub mod types;

pub use error::{Error, Result};
pub use event::{RawEvent, RowsEvent};
pub use gtid::{Gtid, GtidSet, Interval};
pub use record::{Action, ChangeRecord};
pub use schema::{Catalog, ColumnDef, ColumnType, SchemaRegistry, SchemaSelection, TableSchema};
pub use stream::{EventStream, MemoryStream, ResumeFilter, StreamError};
pub use translate::{translate, Outcome};
pub use types::{RawValue, RowMap, Value};
