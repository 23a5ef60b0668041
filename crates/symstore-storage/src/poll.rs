use std::future::Future;

use tracing::{trace, warn};

use crate::config::PollConfig;
use crate::error::{StorageError, StorageResult};

/// Probe `ready` until it reports `true`, sleeping between attempts.
///
/// The delay starts at `config.interval()` and doubles up to
/// `config.max_interval()`. After `config.max_attempts` probes the wait is
/// abandoned with [`StorageError::PollTimeout`]. Probe errors are returned
/// immediately.
pub async fn poll_until<F, Fut>(config: &PollConfig, resource: &str, mut ready: F) -> StorageResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<bool>>,
{
    let attempts = config.max_attempts.max(1);
    let mut delay = config.interval();

    for attempt in 1..=attempts {
        if ready().await? {
            return Ok(());
        }
        if attempt == attempts {
            break;
        }
        trace!(resource, attempt, delay_ms = delay.as_millis() as u64, "resource not ready");
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(config.max_interval());
    }

    warn!(resource, attempts, "gave up waiting for resource");
    Err(StorageError::PollTimeout {
        resource: resource.to_string(),
        attempts,
    })
}
