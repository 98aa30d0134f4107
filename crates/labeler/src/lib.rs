//! Batch labeling of stored records against phrase/definition pairs.
//!
//! Pending records are read from SQLite, grouped into ordered batches, scored
//! by a remote [`llm::Annotator`], validated line by line, and committed one
//! batch per transaction. Re-running only touches records that are still
//! unlabeled.

pub mod batcher;
pub mod config;
pub mod errors;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod store;
pub mod tasks;
pub mod types;

pub use batcher::{batches, Batch, DEFAULT_BATCH_SIZE};
pub use config::LabelerConfig;
pub use errors::{BatchError, ConfigError, ParseError, StoreError, TaskFileError};
pub use pipeline::{preview_prompt, Pipeline, RunReport};
pub use store::{RecordStore, StoreLayout};
pub use tasks::load_tasks;
pub use types::*;
