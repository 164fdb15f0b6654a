//! Customers buy tickets out of the pool
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Sender;
use tracing::trace;

use crate::actor::{self, ActorHandle, ActorReport, ExitReason, Role};
use crate::pool::TicketPool;

/// Spawn a customer taking one ticket out of `pool` every `interval`
pub fn spawn(
    pool: Arc<TicketPool>,
    interval: Duration,
    reports: Sender<ActorReport>,
) -> io::Result<ActorHandle> {
    actor::spawn(Role::Customer, pool, interval, reports, |ctx| loop {
        if !ctx.pace() {
            return ExitReason::Cancelled;
        }
        match ctx.pool().remove(ctx.cancel_flag()) {
            Ok(ticket) => {
                let bought = ctx.record();
                trace!(customer = ctx.id(), %ticket, bought, "ticket bought");
            }
            Err(_) => return ExitReason::Cancelled,
        }
    })
}
