use std::sync::Arc;

use eyre::Result;
use ticket_market_core::Config;
use ticket_market_engine::Supervisor;

mod api;
pub use api::{Api, ApiError, ApiResult};

pub struct TestCtxBuilder {
    /// Initial market configuration
    pub config: Config,
    /// Count of request handler threads
    pub handler_threads: u16,
}

impl Default for TestCtxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCtxBuilder {
    /// Create a new test context builder
    ///
    /// The market starts out unconfigured except for short pacing intervals
    /// (10 ms for both sides) so that tests observe traffic quickly.
    pub fn new() -> Self {
        TestCtxBuilder {
            config: Config {
                release_interval_ms: 10,
                retrieval_interval_ms: 10,
                ..Config::default()
            },
            handler_threads: 2,
        }
    }

    /// Set the number of tickets the market is meant to sell
    pub fn with_total_tickets(mut self, tickets: u32) -> Self {
        self.config.total_tickets = tickets;
        self
    }

    /// Set the pool capacity
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.config.max_ticket_capacity = capacity;
        self
    }

    /// Set the number of vendors and customers spawned on start
    pub fn with_rates(mut self, release_rate: u32, retrieval_rate: u32) -> Self {
        self.config.ticket_release_rate = release_rate;
        self.config.customer_retrieval_rate = retrieval_rate;
        self
    }

    /// Set the pacing intervals (in milliseconds)
    pub fn with_intervals(mut self, release_ms: u64, retrieval_ms: u64) -> Self {
        self.config.release_interval_ms = release_ms;
        self.config.retrieval_interval_ms = retrieval_ms;
        self
    }

    /// Stop vendors once `total_tickets` tickets have been released
    pub fn with_ticket_budget(mut self) -> Self {
        self.config.enforce_ticket_budget = true;
        self
    }

    /// Set the number of request handler threads to use
    pub fn with_handler_threads(mut self, threads: u16) -> Self {
        assert_ne!(threads, 0);
        self.handler_threads = threads;
        self
    }

    /// Build the test context
    pub async fn build(self) -> Result<TestCtx> {
        let (controller, api, supervisor) =
            api::mock::start(self.handler_threads, self.config).await?;

        Ok(TestCtx {
            api,
            supervisor,
            controller,
            handler_threads: self.handler_threads,
            drop_bomb: DropBomb,
        })
    }
}

/// Test context
pub struct TestCtx {
    /// API allowing to interact with the ticket market
    pub api: Api,
    /// Direct access to the market behind the API
    pub supervisor: Arc<Supervisor>,
    controller: api::mock::MockController,
    /// Number of request handler threads
    pub handler_threads: u16,

    drop_bomb: DropBomb,
}

impl TestCtx {
    /// Shut down the ticket market and finish the test
    pub async fn finish(self) {
        std::mem::forget(self.drop_bomb);
        drop(self.api);
        drop(self.supervisor);
        self.controller.shutdown().await;
    }
}

struct DropBomb;

impl Drop for DropBomb {
    fn drop(&mut self) {
        eprintln!("call `ctx.finish().await` to shut the ticket market down");
    }
}
