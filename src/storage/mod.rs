pub mod db;
pub mod table;
pub mod watch;

pub use db::{MemDb, TABLE_INDEX, Tables};
pub use table::{Record, SecondaryCursor, Table, TableCursor};
pub use watch::{WatchHandle, WatchKey, WatchRegistry, WatchSet, WatchSink};
