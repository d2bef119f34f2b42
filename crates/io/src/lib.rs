//! `reclink-io`: dataset providers and result consumers for the linkage
//! engine: CSV files, SQLite tables, JSON reports.

pub mod csv;
pub mod export;
pub mod source;
pub mod sqlite;
