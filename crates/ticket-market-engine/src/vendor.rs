//! Vendors release tickets into the pool
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Sender;
use tracing::trace;

use crate::actor::{self, ActorHandle, ActorReport, ExitReason, Role};
use crate::budget::TicketBudget;
use crate::pool::{Ticket, TicketPool};

/// Spawn a vendor releasing one ticket into `pool` every `interval`
///
/// Tickets are named `<vendor id>-T<n>` with `n` counting up from 1, so every
/// ticket is unique. With a `budget` the vendor stops on its own once the
/// budget is exhausted; without one it produces until cancelled.
pub fn spawn(
    pool: Arc<TicketPool>,
    interval: Duration,
    budget: Option<Arc<TicketBudget>>,
    reports: Sender<ActorReport>,
) -> io::Result<ActorHandle> {
    actor::spawn(Role::Vendor, pool, interval, reports, move |ctx| {
        let mut serial: u64 = 0;
        loop {
            if !ctx.pace() {
                return ExitReason::Cancelled;
            }
            if let Some(budget) = &budget {
                if !budget.try_take() {
                    return ExitReason::BudgetExhausted;
                }
            }

            serial += 1;
            let ticket = Ticket::new(format!("{}-T{serial}", ctx.id()));
            match ctx.pool().insert(ticket, ctx.cancel_flag()) {
                Ok(()) => {
                    let added = ctx.record();
                    trace!(vendor = ctx.id(), added, "ticket released");
                }
                Err(_) => {
                    if let Some(budget) = &budget {
                        budget.refund();
                    }
                    return ExitReason::Cancelled;
                }
            }
        }
    })
}
