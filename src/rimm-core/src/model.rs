//! Checks, tasks, and bins: the domain model the scheduler operates on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a [`Check`] for the lifetime of a run. Checks are held in an
/// arena (`SchedulerState`'s `checks` map) and referenced by id rather than
/// by pointer or `Rc`.
pub type CheckId = u64;

/// Identifies a [`Task`], assigned at construction (= first insertion into
/// a packer, since the splitter always inserts immediately).
pub type TaskId = u64;

/// Identifies a [`Bin`], process-wide monotonic.
pub type BinId = u64;

static NEXT_CHECK_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_BIN_ID: AtomicU64 = AtomicU64::new(1);

fn next_check_id() -> CheckId {
    NEXT_CHECK_ID.fetch_add(1, Ordering::Relaxed)
}

fn next_task_id() -> TaskId {
    NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

fn next_bin_id() -> BinId {
    NEXT_BIN_ID.fetch_add(1, Ordering::Relaxed)
}

/// A named bag of checks sharing a group identity. Lifecycle: created
/// lazily on the first `newcheck` into it, persists (possibly empty) until
/// the process ends — removing the last subcheck has no further effect.
#[derive(Debug, Default, Clone)]
pub struct CheckGroup {
    pub name: String,
    /// Subcheck name -> check id. Keys are unique within a group.
    pub checks: HashMap<String, CheckId>,
}

impl CheckGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), checks: HashMap::new() }
    }
}

/// An integrity check: fixed cost, mutable priority, a name unique within
/// its parent group. The group/name pair is kept on the check itself (a
/// "weak back-reference... for printing and removal only") rather than a
/// pointer back to the `CheckGroup`.
#[derive(Debug, Clone)]
pub struct Check {
    pub id: CheckId,
    pub group: String,
    pub name: String,
    pub cost: u64,
    pub priority: u8,
}

impl Check {
    /// Creates a check with a freshly minted id. `cost` must be a positive
    /// number of microseconds and `priority` in `1..=20` — callers
    /// (`SchedulerState::add_check`) validate this before construction.
    pub fn new(group: impl Into<String>, name: impl Into<String>, cost: u64, priority: u8) -> Self {
        Self { id: next_check_id(), group: group.into(), name: name.into(), cost, priority }
    }
}

/// A ≤-granularity slice of a `Check`, the unit the packer family
/// schedules. Holds `check_id` rather than a reference to the parent
/// `Check` for identity.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub check_id: CheckId,
    pub index: usize,
    pub cost: u64,
    pub last_time_run: u64,
    pub priority: u8,
}

impl Task {
    /// Constructs a new task, initializing `last_time_run` to `created_at`
    /// so least-recently-run packers treat a newly admitted task as fresh
    /// at the time it was created.
    pub fn new(check_id: CheckId, index: usize, cost: u64, created_at: u64, priority: u8) -> Self {
        Self { id: next_task_id(), check_id, index, cost, last_time_run: created_at, priority }
    }

    /// Records that this task's slice finished running at `finished_at`.
    pub fn run(&mut self, finished_at: u64) {
        self.last_time_run = finished_at;
    }
}

/// An ordered sequence of tasks to run in one window. `cost` is the sum of
/// the tasks' costs; the caller (`Packer::request_bin` implementations)
/// must guarantee `cost() <= binsize` before returning one.
#[derive(Debug, Clone, Default)]
pub struct Bin {
    pub id: BinId,
    pub tasks: Vec<Task>,
}

impl Bin {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { id: next_bin_id(), tasks }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn cost(&self) -> u64 {
        self.tasks.iter().map(|t| t.cost).sum()
    }
}
