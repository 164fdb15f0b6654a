//! 🏗 Infrastructure shared by the ticket market engine and its front ends.
#![warn(missing_docs)]

mod request;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use request::{RawRequest, Request, RequestHandler, RequestKind, RequestMethod};

/// Configuration of the ticket market
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Overall number of tickets the operator intends to sell
    ///
    /// Advisory unless [`Config::enforce_ticket_budget`] is set.
    pub total_tickets: u32,
    /// Number of vendors spawned when the market starts
    pub ticket_release_rate: u32,
    /// Number of customers spawned when the market starts
    pub customer_retrieval_rate: u32,
    /// Capacity of the ticket pool
    pub max_ticket_capacity: u32,
    /// Delay in milliseconds a vendor waits before releasing its next ticket
    pub release_interval_ms: u64,
    /// Delay in milliseconds a customer waits before buying its next ticket
    pub retrieval_interval_ms: u64,
    /// Stop vendors once `total_tickets` tickets have been released
    pub enforce_ticket_budget: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_tickets: 0,
            ticket_release_rate: 0,
            customer_retrieval_rate: 0,
            max_ticket_capacity: 0,
            release_interval_ms: 2_000,
            retrieval_interval_ms: 1_000,
            enforce_ticket_budget: false,
        }
    }
}

impl Config {
    /// Pacing delay of a single vendor
    #[inline]
    pub fn release_interval(&self) -> Duration {
        Duration::from_millis(self.release_interval_ms)
    }

    /// Pacing delay of a single customer
    #[inline]
    pub fn retrieval_interval(&self) -> Duration {
        Duration::from_millis(self.retrieval_interval_ms)
    }
}

/// Partial configuration change
///
/// Fields that are [`None`] keep their current value. Values are signed so
/// that negative input coming from a front end can be rejected explicitly
/// instead of failing to parse.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    /// New overall ticket budget
    pub total_tickets: Option<i64>,
    /// New number of vendors spawned on start
    pub ticket_release_rate: Option<i64>,
    /// New number of customers spawned on start
    pub customer_retrieval_rate: Option<i64>,
    /// New pool capacity
    pub max_ticket_capacity: Option<i64>,
    /// New vendor pacing delay in milliseconds
    pub release_interval_ms: Option<i64>,
    /// New customer pacing delay in milliseconds
    pub retrieval_interval_ms: Option<i64>,
    /// Turn ticket budget enforcement on or off
    pub enforce_ticket_budget: Option<bool>,
}

impl From<Config> for ConfigUpdate {
    fn from(config: Config) -> Self {
        Self {
            total_tickets: Some(config.total_tickets.into()),
            ticket_release_rate: Some(config.ticket_release_rate.into()),
            customer_retrieval_rate: Some(config.customer_retrieval_rate.into()),
            max_ticket_capacity: Some(config.max_ticket_capacity.into()),
            release_interval_ms: i64::try_from(config.release_interval_ms).ok(),
            retrieval_interval_ms: i64::try_from(config.retrieval_interval_ms).ok(),
            enforce_ticket_budget: Some(config.enforce_ticket_budget),
        }
    }
}
