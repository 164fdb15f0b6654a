//! :rocket: The ticket market: a bounded ticket pool fed by vendors and
//! drained by customers.
//!
//! The components of the system are the [pool], the [vendor] and [customer]
//! actors, and the [supervisor] that owns them. The [controller] maps front
//! end requests onto the supervisor; the [repository] stores configurations
//! independent of the running market.
//!
//! Each vendor and customer runs on its own thread. The pool is the only state
//! the actors share; everything else is changed by administrative calls under
//! the supervisor's lock.

#![allow(rustdoc::private_intra_doc_links)]
use std::sync::Arc;

use ticket_market_core::Config;

mod activity;
mod actor;
mod budget;
mod cancel;
mod controller;
pub mod customer;
mod error;
pub mod pool;
mod repository;
mod status;
pub mod supervisor;
pub mod vendor;

pub use activity::{ActivityLog, LogEntry, LogKind, LOG_CAPACITY};
pub use actor::{ActorContext, ActorHandle, ActorReport, ActorStats, ExitReason, Role};
pub use budget::TicketBudget;
pub use cancel::CancelFlag;
pub use controller::Controller;
pub use error::{Cancelled, MarketError, RepositoryError, StateError, ValidationError};
pub use pool::{PoolStatistics, Ticket, TicketPool};
pub use repository::{ConfigurationRecord, ConfigurationRepository};
pub use status::{RunState, SystemStatus};
pub use supervisor::Supervisor;

/// Entrypoint of the market
///
/// Builds a stopped [`Supervisor`] configured with `config` and puts a
/// [`Controller`] with an in-memory configuration store in front of it.
pub fn launch(config: &Config) -> Result<Controller, ValidationError> {
    let supervisor = Arc::new(Supervisor::with_config(*config)?);
    Ok(Controller::new(supervisor, ConfigurationRepository::new()))
}
