//! The scheduler state: the process-wide mutable simulation state —
//! virtual time, parameters, the check arena, and the active
//! packer/splitter strategies.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rimm_log::LogSink;

use crate::error::CoreError;
use crate::model::{Bin, Check, CheckGroup, CheckId, Task};
use crate::packer::{make_packer, Packer};
use crate::splitter::{make_splitter, Splitter};

/// The `rantask` policy. Any other string is rejected by
/// [`RanTaskPolicy::from_str`] rather than accepted silently — callers
/// (the workload driver, via `SchedulerState::update_var`) are expected to
/// turn that `Err` into an `error`-class log event instead of crashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RanTaskPolicy {
    Reschedule,
    Discard,
}

impl FromStr for RanTaskPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reschedule" => Ok(RanTaskPolicy::Reschedule),
            "discard" => Ok(RanTaskPolicy::Discard),
            other => Err(CoreError::UnknownRanTaskPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for RanTaskPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RanTaskPolicy::Reschedule => "reschedule",
            RanTaskPolicy::Discard => "discard",
        })
    }
}

/// The scheduler's tunable parameter table, with its documented defaults.
#[derive(Debug, Clone)]
pub struct Vars {
    pub taskgran: u64,
    pub smmpersecond: u64,
    pub smmoverhead: u64,
    pub binsize: u64,
    pub cpus: u32,
    pub binpacker: String,
    pub checksplitter: String,
    pub rantask: RanTaskPolicy,
}

impl Default for Vars {
    fn default() -> Self {
        Self {
            taskgran: 50,
            smmpersecond: 10,
            smmoverhead: 70,
            binsize: 100,
            cpus: 1,
            binpacker: "DefaultBin".to_string(),
            checksplitter: "DefaultTasks".to_string(),
            rantask: RanTaskPolicy::Reschedule,
        }
    }
}

/// A typed `changevars` value. The workload driver is responsible for
/// deciding whether a JSON value should become `Int` or `Str` before
/// calling `update_var`.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Int(u64),
    Str(String),
}

impl VarValue {
    fn as_int(&self, key: &str) -> Result<u64, CoreError> {
        match self {
            VarValue::Int(v) => Ok(*v),
            VarValue::Str(_) => Err(CoreError::ExpectedInt(key.to_string())),
        }
    }

    fn as_str(&self, key: &str) -> Result<&str, CoreError> {
        match self {
            VarValue::Str(v) => Ok(v),
            VarValue::Int(_) => Err(CoreError::ExpectedString(key.to_string())),
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarValue::Int(v) => write!(f, "{v}"),
            VarValue::Str(v) => write!(f, "{v}"),
        }
    }
}

/// The authoritative mutable simulation state. Generic over the log sink
/// so the simulation crate can choose `StdoutSink`, `JsonlSink`, or
/// `MemorySink` without `rimm-core` depending on a particular one.
pub struct SchedulerState<L: LogSink> {
    pub time: u64,
    pub done: bool,
    pub vars: Vars,
    check_index: HashMap<String, CheckGroup>,
    checks: HashMap<CheckId, Check>,
    active_packer: Box<dyn Packer>,
    active_splitter: Box<dyn Splitter>,
    log: L,
}

impl<L: LogSink> SchedulerState<L> {
    pub fn new(log: L) -> Self {
        Self::with_vars(Vars::default(), log)
    }

    pub fn with_vars(vars: Vars, log: L) -> Self {
        let active_packer =
            make_packer(&vars.binpacker).expect("Vars::default binpacker name is always registered");
        let active_splitter = make_splitter(&vars.checksplitter)
            .expect("Vars::default checksplitter name is always registered");
        Self {
            time: 0,
            done: false,
            vars,
            check_index: HashMap::new(),
            checks: HashMap::new(),
            active_packer,
            active_splitter,
            log,
        }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Moves virtual time forward. `new_time < self.time` is a bug in the
    /// caller, not a recoverable condition — it panics rather than
    /// silently clamping or ignoring the request.
    pub fn advance_time(&mut self, new_time: u64) {
        assert!(new_time >= self.time, "virtual time must not move backwards");
        self.time = new_time;
    }

    /// Applies a `changevars` entry, logging a `varchange` event on
    /// success.
    pub fn update_var(&mut self, key: &str, value: VarValue) -> Result<(), CoreError> {
        match key {
            "taskgran" => self.vars.taskgran = value.as_int(key)?,
            "smmpersecond" => self.vars.smmpersecond = value.as_int(key)?,
            "smmoverhead" => self.vars.smmoverhead = value.as_int(key)?,
            "binsize" => self.vars.binsize = value.as_int(key)?,
            "cpus" => self.vars.cpus = value.as_int(key)? as u32,
            "binpacker" => self.swap_packer(value.as_str(key)?)?,
            "checksplitter" => self.swap_splitter(value.as_str(key)?)?,
            "rantask" => self.vars.rantask = value.as_str(key)?.parse()?,
            other => return Err(CoreError::UnknownVar(other.to_string())),
        }
        self.log.varchange(self.time, key, &value.to_string());
        Ok(())
    }

    /// Installs a new packer by registry name, transferring every task the
    /// old one held via `unused_tasks`/`add_task`.
    pub fn swap_packer(&mut self, name: &str) -> Result<(), CoreError> {
        let mut replacement = make_packer(name)?;
        for task in self.active_packer.unused_tasks() {
            replacement.add_task(task);
        }
        self.active_packer = replacement;
        self.vars.binpacker = name.to_string();
        Ok(())
    }

    pub fn swap_splitter(&mut self, name: &str) -> Result<(), CoreError> {
        self.active_splitter = make_splitter(name)?;
        self.vars.checksplitter = name.to_string();
        Ok(())
    }

    /// Adds a check: creates (or reuses) its group, splits it into tasks
    /// with the current splitter/`taskgran`, logs `add_check` then one
    /// `add_task` per produced task, and pushes every task into the active
    /// packer.
    pub fn add_check(&mut self, group: &str, name: &str, cost: u64, priority: u8) -> CheckId {
        let check = Check::new(group, name, cost, priority);
        let check_id = check.id;
        self.log.add_check(self.time, group, name);

        let tasks = self.active_splitter.split(&check, self.vars.taskgran, self.time);

        self.check_index
            .entry(group.to_string())
            .or_insert_with(|| CheckGroup::new(group))
            .checks
            .insert(name.to_string(), check_id);
        self.checks.insert(check_id, check);

        for task in tasks {
            self.log.add_task(self.time, task.id, group, name, task.index, task.cost);
            self.active_packer.add_task(task);
        }
        check_id
    }

    pub fn find_check(&self, group: &str, name: &str) -> Option<CheckId> {
        self.check_index.get(group)?.checks.get(name).copied()
    }

    /// Removes a check, evicting every pending task derived from it from
    /// the active packer. A missing check is logged as an `error` and
    /// otherwise ignored.
    pub fn remove_check(&mut self, group: &str, name: &str) {
        let Some(check_id) = self.find_check(group, name) else {
            self.log.error(self.time, &format!("removecheck: no such check {group}.{name}"));
            return;
        };
        self.log.rm_check(self.time, group, name);
        if let Some(check_group) = self.check_index.get_mut(group) {
            check_group.checks.remove(name);
        }
        self.checks.remove(&check_id);
        self.active_packer.remove_subcheck(check_id);
    }

    pub fn request_bin(&mut self, cpu_id: u32) -> Bin {
        self.active_packer.request_bin(self.vars.binsize, cpu_id)
    }

    /// Applies the `rantask` policy to a task that just finished running.
    /// If the task's parent check was removed while it was in flight, it
    /// is dropped regardless of policy — there is no check left to
    /// reschedule against.
    ///
    /// Takes the task's finish time explicitly rather than reading
    /// `self.time`, since a caller merging several CPUs' timelines may log
    /// this before the clock register itself has been advanced that far.
    pub fn ran_task(&mut self, time: u64, mut task: Task) {
        match self.vars.rantask {
            RanTaskPolicy::Reschedule => match self.checks.get(&task.check_id).cloned() {
                Some(check) => {
                    task.priority = check.priority;
                    self.log.rm_task(time, task.id);
                    self.log.add_task(time, task.id, &check.group, &check.name, task.index, task.cost);
                    self.active_packer.add_task(task);
                }
                None => self.log.rm_task(time, task.id),
            },
            RanTaskPolicy::Discard => self.log.rm_task(time, task.id),
        }
    }

    pub fn end_sim(&mut self) {
        self.done = true;
    }
}
