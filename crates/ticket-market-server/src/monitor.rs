//! Periodic status broadcast to connected listeners
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use ticket_market_engine::{Supervisor, SystemStatus};
use tracing::info;

/// Polls [`Supervisor::status()`] on a fixed interval and fans the snapshot
/// out to every subscriber.
///
/// A subscriber that has not picked up the previous snapshot misses the
/// current one; a subscriber whose receiver is gone is dropped.
pub struct StatusBroadcaster {
    listeners: Arc<Mutex<Vec<Sender<SystemStatus>>>>,
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl StatusBroadcaster {
    pub fn start(supervisor: Arc<Supervisor>, interval: Duration) -> io::Result<Self> {
        let listeners: Arc<Mutex<Vec<Sender<SystemStatus>>>> = Arc::default();
        let (stop, stop_receiver) = flume::bounded(1);

        let thread = {
            let listeners = listeners.clone();
            thread::Builder::new()
                .name("status-broadcaster".into())
                .spawn(move || loop {
                    match stop_receiver.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let status = supervisor.status();
                    info!(
                        running = status.running,
                        pool = status.pool_size,
                        capacity = status.capacity,
                        processed = status.total_processed,
                        vendors = status.active_vendor_count,
                        customers = status.active_customer_count,
                        "market status"
                    );
                    broadcast(&listeners, &status);
                })?
        };

        Ok(Self {
            listeners,
            stop,
            thread,
        })
    }

    /// Register a new listener receiving every following snapshot
    pub fn subscribe(&self) -> Receiver<SystemStatus> {
        let (sender, receiver) = flume::bounded(1);
        self.listeners.lock().push(sender);
        receiver
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Stop broadcasting and wait for the broadcaster thread
    pub fn shutdown(self) {
        let _ = self.stop.send(());
        let _ = self.thread.join();
    }
}

fn broadcast(listeners: &Mutex<Vec<Sender<SystemStatus>>>, status: &SystemStatus) {
    listeners
        .lock()
        .retain(|listener| match listener.try_send(status.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_snapshots_and_prunes_gone_listeners() {
        let supervisor = Arc::new(Supervisor::new());
        let broadcaster =
            StatusBroadcaster::start(supervisor, Duration::from_millis(10)).unwrap();

        let listener = broadcaster.subscribe();
        let gone = broadcaster.subscribe();
        drop(gone);

        let status = listener.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!status.running);
        assert_eq!(status.pool_size, 0);

        // the next round notices the dropped receiver
        listener.recv_timeout(Duration::from_secs(5)).unwrap();
        listener.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(broadcaster.listener_count(), 1);

        broadcaster.shutdown();
    }
}
