//! Cancellation of in-flight collaborator calls.

use std::future::Future;

use cofhe_core::{CofheError, CofheResult};
use tokio_util::sync::CancellationToken;

/// Race `future` against `token`. A cancelled token wins ties.
pub async fn run<F, T>(token: &CancellationToken, operation: &str, future: F) -> CofheResult<T>
where
    F: Future<Output = CofheResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!(operation, "cancelled");
            Err(CofheError::cancelled(operation))
        }
        result = future => result,
    }
}

/// Sleep for `duration` unless `token` fires first.
pub async fn sleep(
    token: &CancellationToken,
    operation: &str,
    duration: std::time::Duration,
) -> CofheResult<()> {
    if duration.is_zero() {
        return if token.is_cancelled() {
            Err(CofheError::cancelled(operation))
        } else {
            Ok(())
        };
    }
    run(token, operation, async {
        tokio::time::sleep(duration).await;
        Ok(())
    })
    .await
}
