//! Implementation of the supervisor owning pool, configuration and actors
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use ticket_market_core::{Config, ConfigUpdate};
use tracing::{info, warn};

use crate::activity::{ActivityLog, LogEntry};
use crate::actor::{ActorHandle, ActorReport, Role};
use crate::budget::TicketBudget;
use crate::error::{MarketError, StateError, ValidationError};
use crate::pool::TicketPool;
use crate::status::{RunState, SystemStatus};
use crate::{customer, vendor};

/// Capacity of the pool while no capacity has been configured
pub const DEFAULT_POOL_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// Supervisor orchestrating all the components of the market
///
/// Every administrative operation runs under one lock, so two concurrent
/// calls never interleave. Actors never take this lock.
pub struct Supervisor {
    inner: Mutex<Inner>,
    /// actors send their final report through this channel once they stop
    report_sender: Sender<ActorReport>,
    report_receiver: Receiver<ActorReport>,
}

struct Inner {
    state: RunState,
    config: Config,
    pool: Arc<TicketPool>,
    budget: Option<Arc<TicketBudget>>,
    vendors: Vec<ActorHandle>,
    customers: Vec<ActorHandle>,
    /// threads of cancelled actors, joined on shutdown
    retired: Vec<JoinHandle<()>>,
    log: ActivityLog,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Create a stopped, unconfigured [`Supervisor`]
    pub fn new() -> Self {
        let (report_sender, report_receiver) = unbounded();
        let config = Config::default();
        let mut log = ActivityLog::new();
        log.system("System initialized");
        Self {
            inner: Mutex::new(Inner {
                state: RunState::Stopped,
                config,
                pool: Arc::new(TicketPool::new(pool_capacity(&config))),
                budget: ticket_budget(&config),
                vendors: Vec::new(),
                customers: Vec::new(),
                retired: Vec::new(),
                log,
            }),
            report_sender,
            report_receiver,
        }
    }

    /// Create a [`Supervisor`] and apply `config` to it
    pub fn with_config(config: Config) -> Result<Self, ValidationError> {
        let supervisor = Self::new();
        supervisor.update_configuration(config.into())?;
        Ok(supervisor)
    }

    /// Apply a partial configuration change.
    ///
    /// The update is validated as a whole before anything changes. A running
    /// market is stopped first. A new capacity replaces the pool: tickets in
    /// the old pool are lost. A new capacity or a change to the enforced
    /// ticket budget retires every remaining actor.
    pub fn update_configuration(&self, update: ConfigUpdate) -> Result<(), ValidationError> {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);

        let next = validate(&inner.config, &update)?;
        inner.stop();

        let current = inner.config;
        let capacity_changed = next.max_ticket_capacity != current.max_ticket_capacity;
        let budget_changed = next.enforce_ticket_budget != current.enforce_ticket_budget
            || (next.enforce_ticket_budget && next.total_tickets != current.total_tickets);
        inner.config = next;

        // vendors hold the budget they were spawned with
        if capacity_changed || budget_changed {
            inner.retire_all();
            inner.budget = ticket_budget(&next);
        }
        if capacity_changed {
            inner.pool = Arc::new(TicketPool::new(pool_capacity(&next)));
        }
        inner.log.system("Configuration updated");
        Ok(())
    }

    /// Start the market: spawn `ticket_release_rate` vendors and
    /// `customer_retrieval_rate` customers.
    ///
    /// Does nothing if the market is already running.
    pub fn start(&self) -> Result<(), MarketError> {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        if inner.state == RunState::Running {
            return Ok(());
        }

        let config = inner.config;
        if config.max_ticket_capacity == 0 {
            return Err(StateError::MissingCapacity.into());
        }
        if config.ticket_release_rate == 0 {
            return Err(StateError::MissingReleaseRate.into());
        }
        if config.customer_retrieval_rate == 0 {
            return Err(StateError::MissingRetrievalRate.into());
        }

        // handles dropped on error cancel their actors
        let vendors = (0..config.ticket_release_rate)
            .map(|_| self.spawn_actor(&inner, Role::Vendor))
            .collect::<Result<Vec<_>, _>>()?;
        let customers = (0..config.customer_retrieval_rate)
            .map(|_| self.spawn_actor(&inner, Role::Customer))
            .collect::<Result<Vec<_>, _>>()?;

        inner.state = RunState::Running;
        for vendor in vendors {
            inner.log.system(format!("Started new vendor: {}", vendor.id()));
            inner.vendors.push(vendor);
        }
        for customer in customers {
            inner
                .log
                .system(format!("Started new customer: {}", customer.id()));
            inner.customers.push(customer);
        }
        inner.log.system("System started");
        Ok(())
    }

    /// Cancel every live actor and move to [`RunState::Stopped`].
    ///
    /// Does nothing if the market is not running.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        inner.stop();
    }

    /// Stop, retire all remaining actors and start over with an empty pool
    /// of the configured capacity.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        inner.stop();
        inner.retire_all();
        let config = inner.config;
        inner.pool = Arc::new(TicketPool::new(pool_capacity(&config)));
        inner.budget = ticket_budget(&config);
        inner.state = RunState::Stopped;
        inner.log.system("System reset");
    }

    /// Spawn one more vendor without changing the run state
    pub fn add_vendor(&self) -> Result<String, MarketError> {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        let vendor = self.spawn_actor(&inner, Role::Vendor)?;
        let id = vendor.id().to_owned();
        inner.vendors.push(vendor);
        inner.log.system(format!("Started new vendor: {id}"));
        Ok(id)
    }

    /// Spawn one more customer without changing the run state
    pub fn add_customer(&self) -> Result<String, MarketError> {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        let customer = self.spawn_actor(&inner, Role::Customer)?;
        let id = customer.id().to_owned();
        inner.customers.push(customer);
        inner.log.system(format!("Started new customer: {id}"));
        Ok(id)
    }

    pub fn remove_all_vendors(&self) {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        inner.retire(Role::Vendor);
        inner.log.system("All vendors stopped");
    }

    pub fn remove_all_customers(&self) {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        inner.retire(Role::Customer);
        inner.log.system("All customers stopped");
    }

    /// Pool statistics plus the counts of every live actor
    ///
    /// Actors that were already removed are not reported.
    pub fn status(&self) -> SystemStatus {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        SystemStatus::new(
            inner.state,
            inner.pool.statistics(),
            inner.vendors.iter().map(ActorHandle::stats).collect(),
            inner.customers.iter().map(ActorHandle::stats).collect(),
        )
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().state == RunState::Running
    }

    pub fn configuration(&self) -> Config {
        self.inner.lock().config
    }

    /// Most recent activity, newest first
    pub fn logs(&self) -> Vec<LogEntry> {
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
        inner.log.entries()
    }

    /// The current pool
    ///
    /// The returned reference stays valid but goes stale once the pool is
    /// replaced by a configuration change or a reset.
    pub fn pool(&self) -> Arc<TicketPool> {
        self.inner.lock().pool.clone()
    }

    /// Remaining ticket budget, if the budget is enforced
    pub fn remaining_budget(&self) -> Option<u64> {
        self.inner.lock().budget.as_ref().map(|b| b.remaining())
    }

    /// Stop everything and wait for all actor threads to end
    pub fn shutdown(&self) {
        let retired = {
            let mut inner = self.inner.lock();
            inner.stop();
            inner.retire_all();
            inner.log.system("System shutdown");
            std::mem::take(&mut inner.retired)
        };
        for thread in retired {
            if thread.join().is_err() {
                warn!("actor thread panicked");
            }
        }
        let mut inner = self.inner.lock();
        self.absorb_reports(&mut inner);
    }

    fn spawn_actor(&self, inner: &Inner, role: Role) -> Result<ActorHandle, MarketError> {
        let reports = self.report_sender.clone();
        let handle = match role {
            Role::Vendor => vendor::spawn(
                inner.pool.clone(),
                inner.config.release_interval(),
                inner.budget.clone(),
                reports,
            )?,
            Role::Customer => customer::spawn(
                inner.pool.clone(),
                inner.config.retrieval_interval(),
                reports,
            )?,
        };
        Ok(handle)
    }

    /// Turn final reports of stopped actors into log entries
    fn absorb_reports(&self, inner: &mut Inner) {
        while let Ok(report) = self.report_receiver.try_recv() {
            inner.log.actor_exit(&report);
        }
    }
}

impl Inner {
    fn stop(&mut self) {
        if self.state != RunState::Running {
            return;
        }
        self.state = RunState::Stopped;
        self.retire(Role::Vendor);
        self.log.system("All vendors stopped");
        self.retire(Role::Customer);
        self.log.system("All customers stopped");
        self.log.system("System stopped");
    }

    fn retire_all(&mut self) {
        self.retire(Role::Vendor);
        self.retire(Role::Customer);
    }

    /// Cancel and forget one population
    fn retire(&mut self, role: Role) {
        let actors = match role {
            Role::Vendor => std::mem::take(&mut self.vendors),
            Role::Customer => std::mem::take(&mut self.customers),
        };
        if !actors.is_empty() {
            info!(?role, count = actors.len(), "retiring actors");
        }
        self.retired.retain(|thread| !thread.is_finished());
        self.retired
            .extend(actors.into_iter().filter_map(ActorHandle::retire));
    }
}

fn pool_capacity(config: &Config) -> NonZeroUsize {
    NonZeroUsize::new(config.max_ticket_capacity as usize).unwrap_or(DEFAULT_POOL_CAPACITY)
}

fn ticket_budget(config: &Config) -> Option<Arc<TicketBudget>> {
    config
        .enforce_ticket_budget
        .then(|| Arc::new(TicketBudget::new(config.total_tickets.into())))
}

fn count(value: Option<i64>, field: &'static str) -> Result<Option<u32>, ValidationError> {
    value
        .map(|v| {
            if v < 0 {
                Err(ValidationError::Negative { field })
            } else {
                u32::try_from(v).map_err(|_| ValidationError::OutOfRange { field })
            }
        })
        .transpose()
}

fn millis(value: Option<i64>, field: &'static str) -> Result<Option<u64>, ValidationError> {
    value
        .map(|v| u64::try_from(v).map_err(|_| ValidationError::Negative { field }))
        .transpose()
}

/// Compute the configuration resulting from `update`, or why it is invalid
fn validate(current: &Config, update: &ConfigUpdate) -> Result<Config, ValidationError> {
    let total_tickets = count(update.total_tickets, "Total tickets")?;
    let release_rate = count(update.ticket_release_rate, "Ticket release rate")?;
    let retrieval_rate = count(update.customer_retrieval_rate, "Customer retrieval rate")?;
    let capacity = count(update.max_ticket_capacity, "Maximum ticket capacity")?;
    let release_interval = millis(update.release_interval_ms, "Release interval")?;
    let retrieval_interval = millis(update.retrieval_interval_ms, "Retrieval interval")?;

    let mut next = *current;
    next.total_tickets = total_tickets.unwrap_or(next.total_tickets);
    next.ticket_release_rate = release_rate.unwrap_or(next.ticket_release_rate);
    next.customer_retrieval_rate = retrieval_rate.unwrap_or(next.customer_retrieval_rate);
    next.max_ticket_capacity = capacity.unwrap_or(next.max_ticket_capacity);
    next.release_interval_ms = release_interval.unwrap_or(next.release_interval_ms);
    next.retrieval_interval_ms = retrieval_interval.unwrap_or(next.retrieval_interval_ms);
    next.enforce_ticket_budget = update
        .enforce_ticket_budget
        .unwrap_or(next.enforce_ticket_budget);

    // zero means "not set yet"
    if next.total_tickets > 0
        && next.max_ticket_capacity > 0
        && next.total_tickets <= next.max_ticket_capacity
    {
        return Err(ValidationError::TotalNotAboveCapacity {
            total: next.total_tickets,
            capacity: next.max_ticket_capacity,
        });
    }
    Ok(next)
}
