//! Common machinery of vendors and customers
//!
//! An actor is a closure running on its own named thread. The closure gets an
//! [`ActorContext`] to pace itself, reach the pool and count handled tickets;
//! the supervisor keeps the matching [`ActorHandle`] to read statistics and to
//! cancel the actor.
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cancel::CancelFlag;
use crate::pool::TicketPool;

/// Role of an actor in the market
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Vendor,
    Customer,
}

impl Role {
    /// Generate a fresh id such as `V-1a2b3c4d`
    fn new_id(self) -> String {
        let prefix = match self {
            Role::Vendor => 'V',
            Role::Customer => 'C',
        };
        let uuid = Uuid::new_v4().simple().to_string();
        format!("{prefix}-{}", &uuid[..8])
    }
}

/// Why an actor left its loop
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Stopped by the supervisor
    Cancelled,
    /// The ticket budget ran out (vendors only)
    BudgetExhausted,
    /// The actor's closure panicked
    Panicked,
}

/// Final word of an actor, sent to the supervisor when its thread ends
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ActorReport {
    pub id: String,
    pub role: Role,
    pub handled: u64,
    pub reason: ExitReason,
}

/// Live statistics of one actor
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorStats {
    pub id: String,
    /// Tickets inserted (vendor) or removed (customer) by this actor
    pub handled: u64,
    /// The actor's thread has left its loop
    pub finished: bool,
}

/// View of the world handed to an actor's closure
pub struct ActorContext {
    id: String,
    pool: Arc<TicketPool>,
    cancel: CancelFlag,
    shutdown: Receiver<()>,
    handled: Arc<AtomicU64>,
    pacing: Duration,
}

impl ActorContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pool(&self) -> &TicketPool {
        &self.pool
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Sit out one pacing interval.
    ///
    /// Returns `false` if the actor was cancelled before or during the wait.
    pub fn pace(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.shutdown.recv_timeout(self.pacing) {
            Err(RecvTimeoutError::Timeout) => !self.cancel.is_cancelled(),
            // a stop request, or the handle is gone
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Count one more handled ticket, returning the new total
    pub fn record(&self) -> u64 {
        self.handled.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Supervisor side of a running actor
///
/// Dropping the handle cancels the actor.
pub struct ActorHandle {
    id: String,
    role: Role,
    handled: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    cancel: CancelFlag,
    shutdown: Sender<()>,
    pool: Arc<TicketPool>,
    thread: Option<JoinHandle<()>>,
}

impl ActorHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ActorStats {
        ActorStats {
            id: self.id.clone(),
            handled: self.handled(),
            finished: self.is_finished(),
        }
    }

    /// Ask the actor to stop. Safe to call any number of times.
    ///
    /// Does not wait for the actor's thread: a pacing actor is woken through
    /// its shutdown channel and an actor blocked in the pool through
    /// [`TicketPool::interrupt()`].
    pub fn cancel(&self) {
        if self.cancel.cancel() {
            let _ = self.shutdown.try_send(());
            self.pool.interrupt();
        }
    }

    /// Cancel the actor and hand over its thread for a later join
    pub fn retire(mut self) -> Option<JoinHandle<()>> {
        self.cancel();
        self.thread.take()
    }
}

impl Drop for ActorHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Sends the actor's report when its thread ends, including by panic
struct ExitReporter {
    report: ActorReport,
    handled: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    reports: Sender<ActorReport>,
}

impl Drop for ExitReporter {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::Release);
        self.report.handled = self.handled.load(Ordering::Relaxed);
        if self.report.reason == ExitReason::Panicked {
            warn!(actor = %self.report.id, "actor panicked");
        }
        debug!(
            actor = %self.report.id,
            handled = self.report.handled,
            reason = ?self.report.reason,
            "actor stopped"
        );
        let _ = self.reports.send(self.report.clone());
    }
}

/// Spawn an actor thread running `work`
///
/// `work` returns once the actor should stop; its [`ExitReason`] ends up in
/// the [`ActorReport`] sent over `reports`.
pub(crate) fn spawn<F>(
    role: Role,
    pool: Arc<TicketPool>,
    pacing: Duration,
    reports: Sender<ActorReport>,
    work: F,
) -> io::Result<ActorHandle>
where
    F: FnOnce(&ActorContext) -> ExitReason + Send + 'static,
{
    let id = role.new_id();
    let handled = Arc::new(AtomicU64::new(0));
    let finished = Arc::new(AtomicBool::new(false));
    let cancel = CancelFlag::new();
    let (shutdown_sender, shutdown_receiver) = bounded(1);

    let ctx = ActorContext {
        id: id.clone(),
        pool: pool.clone(),
        cancel: cancel.clone(),
        shutdown: shutdown_receiver,
        handled: handled.clone(),
        pacing,
    };
    let reporter = ExitReporter {
        report: ActorReport {
            id: id.clone(),
            role,
            handled: 0,
            reason: ExitReason::Panicked,
        },
        handled: handled.clone(),
        finished: finished.clone(),
        reports,
    };

    let thread = thread::Builder::new().name(id.clone()).spawn(move || {
        // take the whole guard, not just the field assigned below
        let mut reporter = reporter;
        reporter.report.reason = work(&ctx);
    })?;

    Ok(ActorHandle {
        id,
        role,
        handled,
        finished,
        cancel,
        shutdown: shutdown_sender,
        pool,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use crossbeam::channel::{unbounded, TryRecvError};

    use super::*;

    fn pool() -> Arc<TicketPool> {
        Arc::new(TicketPool::new(NonZeroUsize::new(1).unwrap()))
    }

    #[test]
    fn report_is_sent_when_the_actor_exits() {
        let (reports, receiver) = unbounded();
        let handle = spawn(
            Role::Vendor,
            pool(),
            Duration::from_secs(60),
            reports,
            |ctx| {
                while ctx.pace() {
                    ctx.record();
                }
                ExitReason::Cancelled
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));

        let id = handle.id().to_owned();
        let thread = handle.retire().unwrap();
        thread.join().unwrap();

        let report = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.id, id);
        assert_eq!(report.role, Role::Vendor);
        assert_eq!(report.reason, ExitReason::Cancelled);
        assert_eq!(report.handled, 0);
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn report_carries_final_count() {
        let (reports, receiver) = unbounded();
        let handle = spawn(Role::Customer, pool(), Duration::ZERO, reports, |ctx| {
            for _ in 0..7 {
                ctx.record();
            }
            ExitReason::BudgetExhausted
        })
        .unwrap();

        let report = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.handled, 7);
        assert_eq!(report.reason, ExitReason::BudgetExhausted);
        assert!(handle.is_finished());
        assert_eq!(handle.stats().handled, 7);
    }

    #[test]
    fn panicking_actor_still_reports() {
        let (reports, receiver) = unbounded();
        let handle = spawn(Role::Customer, pool(), Duration::ZERO, reports, |ctx| {
            ctx.record();
            panic!("boom");
        })
        .unwrap();

        let report = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.reason, ExitReason::Panicked);
        assert_eq!(report.handled, 1);
        assert!(handle.retire().unwrap().join().is_err());
    }
}
