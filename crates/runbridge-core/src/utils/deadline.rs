//! Store call deadlines

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Run `fut` and fail with [`Error::Timeout`] if it takes longer than `limit`
pub async fn with_deadline<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation: operation.to_string(),
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
