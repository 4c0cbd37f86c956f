//! The event log sink contract and a handful of concrete sinks.
//!
//! `LogSink` is intentionally typed in terms of primitives (`u64`, `&str`,
//! ...) rather than `rimm_core`'s `Task`/`Check` types, so that this crate
//! stays a dependency-free leaf and `rimm-core` can depend on it instead of
//! the other way around.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

/// Event names emitted by the simulation core. Kept as `&'static str`
/// constants rather than an enum so sinks that only care about a subset
/// (e.g. a pretty-printer) don't need to match exhaustively.
pub mod event {
    pub const ADD_TASK: &str = "add_task";
    pub const RM_TASK: &str = "rm_task";
    pub const SMI: &str = "SMI";
    pub const BIN_START: &str = "bin_start";
    pub const RUN_TASK: &str = "run_task";
    pub const BIN_END: &str = "bin_end";
    pub const ADD_CHECK: &str = "add_check";
    pub const RM_CHECK: &str = "rm_check";
    pub const VARCHANGE: &str = "varchange";
    pub const END_SIM: &str = "end_sim";
}

/// The sink contract every implementation below satisfies.
pub trait LogSink {
    fn add_misc(&mut self, key: &str, val: &str);
    fn add_task(&mut self, time: u64, task_id: u64, group: &str, name: &str, index: usize, cost: u64);
    fn rm_task(&mut self, time: u64, task_id: u64);
    fn add_check(&mut self, time: u64, group: &str, name: &str);
    fn rm_check(&mut self, time: u64, group: &str, name: &str);
    fn varchange(&mut self, time: u64, key: &str, value: &str);
    #[allow(clippy::too_many_arguments)]
    fn time_event(
        &mut self,
        time: u64,
        length: u64,
        event: &str,
        task_id: Option<u64>,
        cpu: Option<u32>,
        bin_id: Option<u64>,
        msg: Option<&str>,
    );
    fn warning(&mut self, time: u64, msg: &str);
    fn error(&mut self, time: u64, msg: &str);
    fn end_log(&mut self);
}

/// A structured representation of every event a sink may be asked to
/// record, used by [`MemorySink`] and [`JsonlSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Misc { key: String, val: String },
    AddTask { time: u64, task_id: u64, group: String, name: String, index: usize, cost: u64 },
    RmTask { time: u64, task_id: u64 },
    AddCheck { time: u64, group: String, name: String },
    RmCheck { time: u64, group: String, name: String },
    VarChange { time: u64, key: String, value: String },
    Time {
        time: u64,
        length: u64,
        event: String,
        task_id: Option<u64>,
        cpu: Option<u32>,
        bin_id: Option<u64>,
        msg: Option<String>,
    },
    Warning { time: u64, msg: String },
    Error { time: u64, msg: String },
}

impl Event {
    /// The virtual time the event carries, if any (`Misc` rows have none).
    pub fn time(&self) -> Option<u64> {
        match self {
            Event::Misc { .. } => None,
            Event::AddTask { time, .. }
            | Event::RmTask { time, .. }
            | Event::AddCheck { time, .. }
            | Event::RmCheck { time, .. }
            | Event::VarChange { time, .. }
            | Event::Time { time, .. }
            | Event::Warning { time, .. }
            | Event::Error { time, .. } => Some(*time),
        }
    }

    /// The task id this event references, if any.
    pub fn task_id(&self) -> Option<u64> {
        match self {
            Event::AddTask { task_id, .. } | Event::RmTask { task_id, .. } => Some(*task_id),
            Event::Time { task_id, .. } => *task_id,
            _ => None,
        }
    }

    /// The check this event refers to, as `(group, name)`, if any.
    pub fn check(&self) -> Option<(&str, &str)> {
        match self {
            Event::AddCheck { group, name, .. } | Event::RmCheck { group, name, .. } => {
                Some((group, name))
            }
            _ => None,
        }
    }

    pub fn event_name(&self) -> &str {
        match self {
            Event::Misc { .. } => "misc",
            Event::AddTask { .. } => event::ADD_TASK,
            Event::RmTask { .. } => event::RM_TASK,
            Event::AddCheck { .. } => event::ADD_CHECK,
            Event::RmCheck { .. } => event::RM_CHECK,
            Event::VarChange { .. } => event::VARCHANGE,
            Event::Time { event, .. } => event,
            Event::Warning { .. } => "warning",
            Event::Error { .. } => "error",
        }
    }
}

/// Collects every event in memory, in emission order. Used by tests that
/// assert on run-wide invariants (bin-cost bounds, time monotonicity,
/// task conservation).
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<Event>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for MemorySink {
    fn add_misc(&mut self, key: &str, val: &str) {
        self.events.push(Event::Misc { key: key.into(), val: val.into() });
    }

    fn add_task(&mut self, time: u64, task_id: u64, group: &str, name: &str, index: usize, cost: u64) {
        self.events.push(Event::AddTask {
            time,
            task_id,
            group: group.into(),
            name: name.into(),
            index,
            cost,
        });
    }

    fn rm_task(&mut self, time: u64, task_id: u64) {
        self.events.push(Event::RmTask { time, task_id });
    }

    fn add_check(&mut self, time: u64, group: &str, name: &str) {
        self.events.push(Event::AddCheck { time, group: group.into(), name: name.into() });
    }

    fn rm_check(&mut self, time: u64, group: &str, name: &str) {
        self.events.push(Event::RmCheck { time, group: group.into(), name: name.into() });
    }

    fn varchange(&mut self, time: u64, key: &str, value: &str) {
        self.events.push(Event::VarChange { time, key: key.into(), value: value.into() });
    }

    fn time_event(
        &mut self,
        time: u64,
        length: u64,
        event: &str,
        task_id: Option<u64>,
        cpu: Option<u32>,
        bin_id: Option<u64>,
        msg: Option<&str>,
    ) {
        self.events.push(Event::Time {
            time,
            length,
            event: event.into(),
            task_id,
            cpu,
            bin_id,
            msg: msg.map(String::from),
        });
    }

    fn warning(&mut self, time: u64, msg: &str) {
        log::warn!("[{time:020}] {msg}");
        self.events.push(Event::Warning { time, msg: msg.into() });
    }

    fn error(&mut self, time: u64, msg: &str) {
        log::error!("[{time:020}] {msg}");
        self.events.push(Event::Error { time, msg: msg.into() });
    }

    fn end_log(&mut self) {}
}

/// Prints events to stdout, one line per event, only printing fields that
/// are present.
pub struct StdoutSink {
    verbose: bool,
}

impl StdoutSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn print_time_event(
        &self,
        time: u64,
        length: u64,
        event: &str,
        task_id: Option<u64>,
        cpu: Option<u32>,
        bin_id: Option<u64>,
        msg: Option<&str>,
    ) {
        if !self.verbose {
            return;
        }
        print!("Time: {time:020} Event: {event:<10} ");
        if let Some(cpu) = cpu {
            print!("Proc: {cpu:04} ");
        }
        if let Some(bin_id) = bin_id {
            print!("Bin: {bin_id:08} ");
        }
        if let Some(task_id) = task_id {
            print!("Task: {task_id} ");
        }
        print!("Length: {length} ");
        if let Some(msg) = msg {
            print!("Msg: {msg} ");
        }
        println!();
    }
}

impl LogSink for StdoutSink {
    fn add_misc(&mut self, key: &str, val: &str) {
        if self.verbose {
            println!("Misc: {key}:{val}");
        }
    }

    fn add_task(&mut self, time: u64, task_id: u64, group: &str, name: &str, index: usize, cost: u64) {
        self.print_time_event(
            time,
            0,
            event::ADD_TASK,
            Some(task_id),
            None,
            None,
            Some(&format!("{group}.{name}[{index}] cost={cost}")),
        );
    }

    fn rm_task(&mut self, time: u64, task_id: u64) {
        self.print_time_event(time, 0, event::RM_TASK, Some(task_id), None, None, None);
    }

    fn add_check(&mut self, time: u64, group: &str, name: &str) {
        self.print_time_event(
            time,
            0,
            event::ADD_CHECK,
            None,
            None,
            None,
            Some(&format!("{group}.{name}")),
        );
    }

    fn rm_check(&mut self, time: u64, group: &str, name: &str) {
        self.print_time_event(
            time,
            0,
            event::RM_CHECK,
            None,
            None,
            None,
            Some(&format!("{group}.{name}")),
        );
    }

    fn varchange(&mut self, time: u64, key: &str, value: &str) {
        self.print_time_event(
            time,
            0,
            event::VARCHANGE,
            None,
            None,
            None,
            Some(&format!("{key} = {value}")),
        );
    }

    fn time_event(
        &mut self,
        time: u64,
        length: u64,
        event: &str,
        task_id: Option<u64>,
        cpu: Option<u32>,
        bin_id: Option<u64>,
        msg: Option<&str>,
    ) {
        self.print_time_event(time, length, event, task_id, cpu, bin_id, msg);
    }

    fn warning(&mut self, time: u64, msg: &str) {
        log::warn!("[{time:020}] {msg}");
        println!("{time:020}: Warning {msg}");
    }

    fn error(&mut self, time: u64, msg: &str) {
        log::error!("[{time:020}] {msg}");
        println!("{time:020}: Error {msg}");
    }

    fn end_log(&mut self) {}
}

/// Append-only JSON-lines sink. A durable, file-backed alternative to
/// `StdoutSink` — each event is written as one JSON object per line and
/// the writer is flushed when the log is closed.
pub struct JsonlSink {
    writer: BufWriter<File>,
    verbose: bool,
}

impl JsonlSink {
    pub fn create(path: &Path, verbose: bool) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self { writer: BufWriter::new(file), verbose })
    }

    fn write_event(&mut self, event: &Event) {
        if self.verbose {
            log::debug!("{event:?}");
        }
        // A line that fails to serialize or flush is a logging-layer bug,
        // not a recoverable simulation condition; see `SchedulerState`'s
        // own use of `assert!` for invariant violations.
        let line = serde_json::to_string(event).expect("Event always serializes");
        writeln!(self.writer, "{line}").expect("jsonl sink write failed");
    }
}

impl LogSink for JsonlSink {
    fn add_misc(&mut self, key: &str, val: &str) {
        self.write_event(&Event::Misc { key: key.into(), val: val.into() });
    }

    fn add_task(&mut self, time: u64, task_id: u64, group: &str, name: &str, index: usize, cost: u64) {
        self.write_event(&Event::AddTask {
            time,
            task_id,
            group: group.into(),
            name: name.into(),
            index,
            cost,
        });
    }

    fn rm_task(&mut self, time: u64, task_id: u64) {
        self.write_event(&Event::RmTask { time, task_id });
    }

    fn add_check(&mut self, time: u64, group: &str, name: &str) {
        self.write_event(&Event::AddCheck { time, group: group.into(), name: name.into() });
    }

    fn rm_check(&mut self, time: u64, group: &str, name: &str) {
        self.write_event(&Event::RmCheck { time, group: group.into(), name: name.into() });
    }

    fn varchange(&mut self, time: u64, key: &str, value: &str) {
        self.write_event(&Event::VarChange { time, key: key.into(), value: value.into() });
    }

    fn time_event(
        &mut self,
        time: u64,
        length: u64,
        event: &str,
        task_id: Option<u64>,
        cpu: Option<u32>,
        bin_id: Option<u64>,
        msg: Option<&str>,
    ) {
        self.write_event(&Event::Time {
            time,
            length,
            event: event.into(),
            task_id,
            cpu,
            bin_id,
            msg: msg.map(String::from),
        });
    }

    fn warning(&mut self, time: u64, msg: &str) {
        log::warn!("[{time:020}] {msg}");
        self.write_event(&Event::Warning { time, msg: msg.into() });
    }

    fn error(&mut self, time: u64, msg: &str) {
        log::error!("[{time:020}] {msg}");
        self.write_event(&Event::Error { time, msg: msg.into() });
    }

    fn end_log(&mut self) {
        let _ = self.writer.flush();
    }
}

impl fmt::Debug for JsonlSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonlSink").field("verbose", &self.verbose).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_events_in_order() {
        let mut sink = MemorySink::new();
        sink.add_task(0, 1, "G", "C", 0, 50);
        sink.time_event(10, 50, event::RUN_TASK, Some(1), Some(0), Some(7), None);
        sink.rm_task(60, 1);

        assert_eq!(sink.events.len(), 3);
        assert_eq!(sink.events[0].event_name(), event::ADD_TASK);
        assert_eq!(sink.events[1].time(), Some(10));
        assert_eq!(sink.events[2].task_id(), Some(1));
    }

    #[test]
    fn jsonl_sink_writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        {
            let mut sink = JsonlSink::create(&path, false).unwrap();
            sink.add_check(0, "G", "C");
            sink.warning(5, "overrun");
            sink.end_log();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }
}
