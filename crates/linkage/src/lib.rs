//! `reclink-linkage`: Record linkage and deduplication engine.
//!
//! Pure engine crate: receives loaded datasets, returns ranked matches.
//! No CLI or IO dependencies.

pub mod assemble;
pub mod classify;
pub mod compare;
pub mod config;
pub mod error;
pub mod index;
pub mod job;
pub mod learn;
pub mod model;
pub mod observer;
pub mod orchestrate;
pub mod summary;

pub use classify::MatchClassifier;
pub use config::{LinkageConfig, LinkageSettings};
pub use error::LinkageError;
pub use job::{run_dedup, run_linkage, LinkageJob};
pub use model::{Dataset, LinkageResult, MatchTable, Value};
pub use observer::{LinkageObserver, LogObserver, NoopObserver};
pub use orchestrate::{run_multi, MultiLinkageResult};
