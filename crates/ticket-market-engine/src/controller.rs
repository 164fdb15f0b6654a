//! Implementation of the request handler in front of the supervisor
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use ticket_market_core::{Config, ConfigUpdate, Request, RequestHandler, RequestKind};
use tracing::{debug, error};

use crate::error::MarketError;
use crate::repository::ConfigurationRepository;
use crate::supervisor::Supervisor;

/// Maps front end requests onto [`Supervisor`] operations
///
/// Validation and state errors are answered with a client error, failures to
/// spawn a thread or to write the configuration store with a server error.
pub struct Controller {
    supervisor: Arc<Supervisor>,
    repository: Mutex<ConfigurationRepository>,
}

impl Controller {
    /// Create a new [`Controller`]
    pub fn new(supervisor: Arc<Supervisor>, repository: ConfigurationRepository) -> Self {
        Self {
            supervisor,
            repository: Mutex::new(repository),
        }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    fn update_configuration(&self, mut rq: Request) {
        let update = match rq.read_string() {
            Ok(body) => serde_json::from_str::<ConfigUpdate>(&body),
            Err(e) => {
                rq.respond_with_err(format!("Could not read request body: {e}"));
                return;
            }
        };
        match update {
            Ok(update) => match self.supervisor.update_configuration(update) {
                Ok(()) => rq.respond_with_string("Configuration updated successfully"),
                Err(e) => rq.respond_with_err(e.to_string()),
            },
            Err(e) => rq.respond_with_err(format!("Invalid configuration payload: {e}")),
        }
    }

    fn save_configuration(&self, mut rq: Request) {
        let config = match rq.read_string() {
            Ok(body) => serde_json::from_str::<Config>(&body),
            Err(e) => {
                rq.respond_with_err(format!("Could not read request body: {e}"));
                return;
            }
        };
        let config = match config {
            Ok(config) => config,
            Err(e) => {
                rq.respond_with_err(format!("Error saving configuration: {e}"));
                return;
            }
        };
        let saved = self.repository.lock().save(config);
        match saved {
            Ok(record) => respond_json(rq, &record),
            Err(e) => {
                error!("failed to save configuration: {e}");
                rq.respond_with_failure(format!("Error saving configuration: {e}"));
            }
        }
    }

    fn spawned(rq: Request, result: Result<String, MarketError>) {
        match result {
            Ok(id) => rq.respond_with_string(id),
            Err(e) => rq.respond_with_failure(e.to_string()),
        }
    }
}

impl RequestHandler for Controller {
    fn handle(&self, rq: Request) {
        debug!(kind = ?rq.kind(), "handling request");
        match *rq.kind() {
            RequestKind::UpdateConfiguration => self.update_configuration(rq),
            RequestKind::StartSystem => match self.supervisor.start() {
                Ok(()) => rq.respond_with_string("System started successfully"),
                Err(e @ (MarketError::State(_) | MarketError::Validation(_))) => {
                    rq.respond_with_err(e.to_string())
                }
                Err(e) => rq.respond_with_failure(format!("Failed to start system: {e}")),
            },
            RequestKind::StopSystem => {
                self.supervisor.stop();
                rq.respond_with_string("System stopped successfully");
            }
            RequestKind::ResetSystem => {
                self.supervisor.reset();
                rq.respond_with_string("System reset successfully");
            }
            RequestKind::SystemStatus => respond_json(rq, &self.supervisor.status()),
            RequestKind::SystemLogs => respond_json(rq, &self.supervisor.logs()),
            RequestKind::StartVendor => Self::spawned(rq, self.supervisor.add_vendor()),
            RequestKind::StartCustomer => Self::spawned(rq, self.supervisor.add_customer()),
            RequestKind::StopVendors => {
                self.supervisor.remove_all_vendors();
                rq.respond_with_string("All vendor threads stopped");
            }
            RequestKind::StopCustomers => {
                self.supervisor.remove_all_customers();
                rq.respond_with_string("All customer threads stopped");
            }
            RequestKind::SaveConfiguration => self.save_configuration(rq),
            RequestKind::LatestConfiguration => {
                let latest = self.repository.lock().latest().map(|r| r.config);
                respond_json(rq, &latest.unwrap_or_default());
            }
            RequestKind::Debug => {
                rq.respond_with_string(format!("{:?}", self.supervisor.pool()));
            }
        }
    }

    fn shutdown(self) {
        self.supervisor.shutdown();
    }
}

fn respond_json<T: Serialize>(rq: Request, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => rq.respond_with_json(json),
        Err(e) => rq.respond_with_failure(format!("Failed to serialize response: {e}")),
    }
}
