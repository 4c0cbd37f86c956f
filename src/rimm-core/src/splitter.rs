//! The check splitter: converts checks into schedulable tasks.

use std::fmt;

use crate::error::CoreError;
use crate::model::{Check, Task};

/// Converts a check into an ordered sequence of tasks. Implementations must
/// not mutate `check`.
pub trait Splitter: fmt::Debug {
    fn split(&self, check: &Check, granularity: u64, time: u64) -> Vec<Task>;

    fn name(&self) -> &'static str;
}

/// Greedy splitter: emits tasks of cost `granularity` until the residual
/// cost is less than `granularity`, then a final, smaller task. Indices run
/// `0..n` in emission order.
#[derive(Debug, Default)]
pub struct DefaultTasks;

impl Splitter for DefaultTasks {
    fn split(&self, check: &Check, granularity: u64, time: u64) -> Vec<Task> {
        assert!(granularity > 0, "taskgran must be positive");
        let mut tasks = Vec::new();
        let mut remaining = check.cost;
        let mut index = 0;
        while remaining > 0 {
            let cost = remaining.min(granularity);
            tasks.push(Task::new(check.id, index, cost, time, check.priority));
            remaining -= cost;
            index += 1;
        }
        tasks
    }

    fn name(&self) -> &'static str {
        "DefaultTasks"
    }
}

pub const SPLITTER_NAMES: &[&str] = &["DefaultTasks"];

/// Looks up a splitter by its registry name.
pub fn make_splitter(name: &str) -> Result<Box<dyn Splitter>, CoreError> {
    match name {
        "DefaultTasks" => Ok(Box::new(DefaultTasks)),
        other => Err(CoreError::UnknownSplitter(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn split_round_trips_cost_and_respects_granularity(cost: u64, granularity: u64) -> quickcheck::TestResult {
        let cost = (cost % 10_000) + 1;
        let granularity = (granularity % 200) + 1;
        let check = Check::new("G", "C", cost, 5);
        let tasks = DefaultTasks.split(&check, granularity, 0);

        let total: u64 = tasks.iter().map(|t| t.cost).sum();
        if total != cost {
            return quickcheck::TestResult::failed();
        }
        if tasks.iter().any(|t| t.cost > granularity) {
            return quickcheck::TestResult::failed();
        }
        quickcheck::TestResult::passed()
    }

    #[test]
    fn split_produces_indices_in_emission_order() {
        let check = Check::new("G", "C", 120, 10);
        let tasks = DefaultTasks.split(&check, 50, 7);
        let costs: Vec<_> = tasks.iter().map(|t| t.cost).collect();
        assert_eq!(costs, vec![50, 50, 20]);
        let indices: Vec<_> = tasks.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(tasks.iter().all(|t| t.last_time_run == 7));
    }

    #[test]
    fn split_exact_multiple_has_no_trailing_remainder_task() {
        let check = Check::new("G", "C", 100, 10);
        let tasks = DefaultTasks.split(&check, 50, 0);
        assert_eq!(tasks.len(), 2);
    }
}
