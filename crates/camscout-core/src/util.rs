use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Sleep for `delay`, returning early with [`AppError::Cancelled`] if the token fires.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => Ok(()),
        () = cancel.cancelled() => Err(AppError::Cancelled),
    }
}

/// Fail fast if the token has already fired.
pub fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}
