pub mod sqlite_event_store;

pub use sqlite_event_store::SqliteEventStore;
