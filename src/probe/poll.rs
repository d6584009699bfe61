use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Poll `predicate` until it returns true or `timeout` elapses.
///
/// The predicate is invoked immediately; on failure the loop sleeps
/// `interval` and retries until the elapsed wall time reaches `timeout`.
/// Returns `true` on the first successful check, `false` on deadline.
///
/// This is cooperative busy-waiting, the only waiting primitive in the
/// tool. There is no cancellation beyond the deadline: an interrupt
/// signal terminates the whole process mid-step.
pub async fn wait_until<F, Fut>(mut predicate: F, timeout: Duration, interval: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if predicate().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(interval).await;
    }
}
