//! Engine tests against in-memory fakes and the SQLite store.

mod list;
mod sqlite;
