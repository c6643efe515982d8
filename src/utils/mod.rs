//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{calculate_checksum, ensure_parent_dir};
pub use retry::{Retried, RetryPolicy, Retryable, with_retry};
pub use text::normalize_whitespace;
