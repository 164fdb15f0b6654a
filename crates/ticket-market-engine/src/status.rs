use serde::{Deserialize, Serialize};

use crate::actor::ActorStats;
use crate::pool::PoolStatistics;

/// Run state of the market
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

/// Snapshot returned by [`Supervisor::status()`](crate::Supervisor::status)
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub running: bool,
    pub pool_size: usize,
    pub capacity: usize,
    /// Insertions plus removals, see [`PoolStatistics::total_processed`]
    pub total_processed: u64,
    pub peak_size: usize,
    pub active_vendor_count: usize,
    pub active_customer_count: usize,
    pub vendors: Vec<ActorStats>,
    pub customers: Vec<ActorStats>,
}

impl SystemStatus {
    pub(crate) fn new(
        state: RunState,
        pool: PoolStatistics,
        vendors: Vec<ActorStats>,
        customers: Vec<ActorStats>,
    ) -> Self {
        Self {
            running: state == RunState::Running,
            pool_size: pool.current_size,
            capacity: pool.capacity,
            total_processed: pool.total_processed,
            peak_size: pool.peak_size,
            active_vendor_count: active(&vendors),
            active_customer_count: active(&customers),
            vendors,
            customers,
        }
    }
}

/// actors whose thread has not left its loop yet
fn active(actors: &[ActorStats]) -> usize {
    actors.iter().filter(|a| !a.finished).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_actors_are_not_active() {
        let stats = |id: &str, finished| ActorStats {
            id: id.into(),
            handled: 3,
            finished,
        };
        let status = SystemStatus::new(
            RunState::Running,
            PoolStatistics {
                current_size: 0,
                capacity: 5,
                total_processed: 6,
                peak_size: 2,
            },
            vec![stats("V-1", true), stats("V-2", false)],
            vec![stats("C-1", false)],
        );
        assert_eq!(status.active_vendor_count, 1);
        assert_eq!(status.active_customer_count, 1);
        assert_eq!(status.vendors.len(), 2);
    }
}
