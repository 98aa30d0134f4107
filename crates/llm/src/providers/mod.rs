use crate::error::LlmError;
use crate::retry::RunStatistics;
use async_trait::async_trait;

pub mod google_provider;

pub use google_provider::{GenerationSettings, GoogleProvider};

/// Remote scoring service: one prompt in, one raw text response out.
///
/// Implementations own their resilience policy and record every attempt in
/// `stats`. They never parse the response and never touch the record store.
#[async_trait]
pub trait Annotator: Send + Sync {
    async fn annotate(&self, prompt: &str, stats: &mut RunStatistics) -> Result<String, LlmError>;

    /// Human readable identifier used in logs
    fn name(&self) -> String;
}
