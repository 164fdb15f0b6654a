use std::time::{Duration, Instant};

use eyre::{eyre, Result};

/// Poll `cond` every few milliseconds until it holds or `timeout` passes
#[allow(unused)]
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !cond() {
        if Instant::now() >= deadline {
            return Err(eyre!("condition did not hold within {timeout:?}"));
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    Ok(())
}

/// Async counterpart of [`wait_until()`] for tests running on tokio
#[allow(unused)]
pub async fn eventually(timeout: Duration, mut cond: impl FnMut() -> bool) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !cond() {
        if Instant::now() >= deadline {
            return Err(eyre!("condition did not hold within {timeout:?}"));
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}
