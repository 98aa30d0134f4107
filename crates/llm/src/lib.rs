//! Remote annotator boundary: the Gemini client and the retry policy that
//! wraps every call to it.

mod error;
pub mod providers;
pub mod retry;

pub use error::LlmError;
pub use providers::{Annotator, GenerationSettings, GoogleProvider};
pub use retry::{RetryConfig, RetryPolicy, RetryableError, RunStatistics};
