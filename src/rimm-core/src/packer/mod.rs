//! The bin packer family: six in-memory strategies plus the ILP-backed
//! `LPBinPack`, reached through an explicit name registry.

mod knapsack;
mod lp;
mod ordered;

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::CoreError;
use crate::model::{Bin, CheckId, Task};

pub use lp::LpBinPack;

/// A strategy for assembling queued tasks into per-window bins.
///
/// `request_bin` takes `binsize` directly rather than a reference to the
/// owning scheduler state, so a `Box<dyn Packer>` can live inside that
/// state without a self-referential borrow.
pub trait Packer: fmt::Debug {
    /// Produces the next bin for one CPU's window, consuming from the
    /// packer's internal queue. Never exceeds `binsize` in total task cost.
    fn request_bin(&mut self, binsize: u64, cpu_id: u32) -> Bin;

    /// Queues a task for future packing.
    fn add_task(&mut self, task: Task);

    /// All tasks currently held (queued or already grouped into a
    /// not-yet-dispensed bin), for handoff when the packer is swapped out.
    fn unused_tasks(&self) -> Vec<Task>;

    /// Drops every queued task belonging to `check_id` (used when a
    /// check is removed).
    fn remove_subcheck(&mut self, check_id: CheckId);

    fn name(&self) -> &'static str;
}

pub const PACKER_NAMES: &[&str] = &[
    "DefaultBin",
    "AgingBin",
    "RandomBin",
    "LeastRecentBin",
    "CostKnapsackBin",
    "PriorityKnapsackBin",
    "LPBinPack",
];

/// Looks up a packer by its registry name.
pub fn make_packer(name: &str) -> Result<Box<dyn Packer>, CoreError> {
    match name {
        "DefaultBin" => Ok(Box::new(DefaultBin::default())),
        "AgingBin" => Ok(Box::new(AgingBin::default())),
        "RandomBin" => Ok(Box::new(RandomBin::default())),
        "LeastRecentBin" => Ok(Box::new(LeastRecentBin::default())),
        "CostKnapsackBin" => Ok(Box::new(CostKnapsackBin::default())),
        "PriorityKnapsackBin" => Ok(Box::new(PriorityKnapsackBin::default())),
        "LPBinPack" => Ok(Box::new(LpBinPack::default())),
        other => Err(CoreError::UnknownPacker(other.to_string())),
    }
}

/// Packs tasks in descending-priority order, highest first. Ties keep
/// insertion order.
#[derive(Debug, Default)]
pub struct DefaultBin {
    queue: Vec<(i64, Task)>,
}

impl Packer for DefaultBin {
    fn request_bin(&mut self, binsize: u64, _cpu_id: u32) -> Bin {
        Bin::new(ordered::greedy_prefix(&mut self.queue, binsize))
    }

    fn add_task(&mut self, task: Task) {
        let key = -(task.priority as i64);
        ordered::insert_sorted(&mut self.queue, key, task);
    }

    fn unused_tasks(&self) -> Vec<Task> {
        self.queue.iter().map(|(_, t)| t.clone()).collect()
    }

    fn remove_subcheck(&mut self, check_id: CheckId) {
        self.queue.retain(|(_, t)| t.check_id != check_id);
    }

    fn name(&self) -> &'static str {
        "DefaultBin"
    }
}

/// Same ordering discipline as `DefaultBin`, but every task left unpicked
/// at the end of a window has its priority bumped by one before the next
/// window, so starved low-priority tasks eventually surface.
#[derive(Debug, Default)]
pub struct AgingBin {
    queue: Vec<(i64, Task)>,
}

impl Packer for AgingBin {
    fn request_bin(&mut self, binsize: u64, _cpu_id: u32) -> Bin {
        let taken = ordered::greedy_prefix(&mut self.queue, binsize);
        let aged: Vec<(i64, Task)> = std::mem::take(&mut self.queue)
            .into_iter()
            .map(|(_, mut task)| {
                task.priority = task.priority.saturating_add(1);
                (-(task.priority as i64), task)
            })
            .collect();
        for (key, task) in aged {
            ordered::insert_sorted(&mut self.queue, key, task);
        }
        Bin::new(taken)
    }

    fn add_task(&mut self, task: Task) {
        let key = -(task.priority as i64);
        ordered::insert_sorted(&mut self.queue, key, task);
    }

    fn unused_tasks(&self) -> Vec<Task> {
        self.queue.iter().map(|(_, t)| t.clone()).collect()
    }

    fn remove_subcheck(&mut self, check_id: CheckId) {
        self.queue.retain(|(_, t)| t.check_id != check_id);
    }

    fn name(&self) -> &'static str {
        "AgingBin"
    }
}

/// Fixed seed for `RandomBin`'s draw sequence. A process-global RNG would
/// make runs irreproducible; this keeps the simulation fully offline.
const RANDOM_BIN_SEED: u64 = 0x52_414E_444F_4D42;

/// Draws a uniform random key per task at insertion time, from a seeded
/// RNG so the draw sequence is reproducible run to run; otherwise
/// identical ordered-prefix packing.
#[derive(Debug)]
pub struct RandomBin {
    queue: Vec<(u64, Task)>,
    rng: StdRng,
}

impl Default for RandomBin {
    fn default() -> Self {
        Self { queue: Vec::new(), rng: StdRng::seed_from_u64(RANDOM_BIN_SEED) }
    }
}

impl Packer for RandomBin {
    fn request_bin(&mut self, binsize: u64, _cpu_id: u32) -> Bin {
        Bin::new(ordered::greedy_prefix(&mut self.queue, binsize))
    }

    fn add_task(&mut self, task: Task) {
        let key = self.rng.gen::<u64>();
        ordered::insert_sorted(&mut self.queue, key, task);
    }

    fn unused_tasks(&self) -> Vec<Task> {
        self.queue.iter().map(|(_, t)| t.clone()).collect()
    }

    fn remove_subcheck(&mut self, check_id: CheckId) {
        self.queue.retain(|(_, t)| t.check_id != check_id);
    }

    fn name(&self) -> &'static str {
        "RandomBin"
    }
}

/// Packs the task with the oldest `last_time_run` first.
#[derive(Debug, Default)]
pub struct LeastRecentBin {
    queue: Vec<(u64, Task)>,
}

impl Packer for LeastRecentBin {
    fn request_bin(&mut self, binsize: u64, _cpu_id: u32) -> Bin {
        Bin::new(ordered::greedy_prefix(&mut self.queue, binsize))
    }

    fn add_task(&mut self, task: Task) {
        let key = task.last_time_run;
        ordered::insert_sorted(&mut self.queue, key, task);
    }

    fn unused_tasks(&self) -> Vec<Task> {
        self.queue.iter().map(|(_, t)| t.clone()).collect()
    }

    fn remove_subcheck(&mut self, check_id: CheckId) {
        self.queue.retain(|(_, t)| t.check_id != check_id);
    }

    fn name(&self) -> &'static str {
        "LeastRecentBin"
    }
}

/// 0/1 knapsack maximizing the summed task cost packed into `binsize`.
#[derive(Debug, Default)]
pub struct CostKnapsackBin {
    queue: Vec<Task>,
}

impl Packer for CostKnapsackBin {
    fn request_bin(&mut self, binsize: u64, _cpu_id: u32) -> Bin {
        take_knapsack(&mut self.queue, binsize, |t| t.cost)
    }

    fn add_task(&mut self, task: Task) {
        self.queue.push(task);
    }

    fn unused_tasks(&self) -> Vec<Task> {
        self.queue.clone()
    }

    fn remove_subcheck(&mut self, check_id: CheckId) {
        self.queue.retain(|t| t.check_id != check_id);
    }

    fn name(&self) -> &'static str {
        "CostKnapsackBin"
    }
}

/// 0/1 knapsack maximizing summed task priority packed into `binsize`.
/// Like `AgingBin`, every task left in the queue after emission has its
/// priority bumped by one so starved tasks keep climbing toward selection.
#[derive(Debug, Default)]
pub struct PriorityKnapsackBin {
    queue: Vec<Task>,
}

impl Packer for PriorityKnapsackBin {
    fn request_bin(&mut self, binsize: u64, _cpu_id: u32) -> Bin {
        let bin = take_knapsack(&mut self.queue, binsize, |t| t.priority as u64);
        for task in &mut self.queue {
            task.priority = task.priority.saturating_add(1);
        }
        bin
    }

    fn add_task(&mut self, task: Task) {
        self.queue.push(task);
    }

    fn unused_tasks(&self) -> Vec<Task> {
        self.queue.clone()
    }

    fn remove_subcheck(&mut self, check_id: CheckId) {
        self.queue.retain(|t| t.check_id != check_id);
    }

    fn name(&self) -> &'static str {
        "PriorityKnapsackBin"
    }
}

fn take_knapsack<F: Fn(&Task) -> u64>(queue: &mut Vec<Task>, binsize: u64, value_of: F) -> Bin {
    let chosen = knapsack::select_knapsack(queue, binsize, value_of);
    let mut taken = Vec::with_capacity(chosen.len());
    // Indices are descending-sorted coming out of the DP backtrack
    // (`w_max` down to `0`), so removing high-to-low keeps earlier indices
    // valid.
    let mut chosen = chosen;
    chosen.sort_unstable_by(|a, b| b.cmp(a));
    for i in chosen {
        taken.push(queue.remove(i));
    }
    taken.reverse();
    Bin::new(taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Check;

    fn task(cost: u64, priority: u8) -> Task {
        let check = Check::new("G", "C", cost, priority);
        Task::new(check.id, 0, cost, 0, priority)
    }

    #[test]
    fn default_bin_prefers_higher_priority_first() {
        let mut bin = DefaultBin::default();
        bin.add_task(task(10, 1));
        bin.add_task(task(10, 9));
        let taken = bin.request_bin(10, 0);
        assert_eq!(taken.tasks.len(), 1);
        assert_eq!(taken.tasks[0].priority, 9);
    }

    #[test]
    fn aging_bin_raises_priority_of_unpicked_tasks() {
        let mut bin = AgingBin::default();
        bin.add_task(task(100, 1));
        bin.add_task(task(100, 1));
        let _ = bin.request_bin(100, 0);
        let remaining = bin.unused_tasks();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].priority, 2);
    }

    #[test]
    fn least_recent_bin_orders_by_last_time_run() {
        let mut bin = LeastRecentBin::default();
        let mut older = task(10, 1);
        older.last_time_run = 5;
        let mut newer = task(10, 1);
        newer.last_time_run = 50;
        bin.add_task(newer);
        bin.add_task(older);
        let taken = bin.request_bin(10, 0);
        assert_eq!(taken.tasks[0].last_time_run, 5);
    }

    #[test]
    fn cost_knapsack_bin_never_exceeds_binsize() {
        let mut bin = CostKnapsackBin::default();
        for cost in [40, 40, 30, 30] {
            bin.add_task(task(cost, 1));
        }
        let taken = bin.request_bin(70, 0);
        assert!(taken.cost() <= 70);
    }

    #[test]
    fn remove_subcheck_drops_matching_tasks_only() {
        let mut bin = DefaultBin::default();
        let keep = task(10, 1);
        let mut drop = task(10, 1);
        drop.check_id = keep.check_id + 1;
        let drop_id = drop.check_id;
        bin.add_task(keep);
        bin.add_task(drop);
        bin.remove_subcheck(drop_id);
        assert_eq!(bin.unused_tasks().len(), 1);
    }
}
