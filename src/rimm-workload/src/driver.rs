//! One-event-lookahead dispatch of workload actions into `SchedulerState`.

use std::io::BufRead;

use rimm_core::SchedulerState;
use rimm_log::LogSink;

use crate::action::{Action, WorkloadEvent};
use crate::error::WorkloadError;
use crate::stream::WorkloadStream;

/// Wraps a [`WorkloadStream`] with a one-event lookahead, and dispatches
/// each action kind's effect on a `SchedulerState`.
pub struct WorkloadDriver<R> {
    stream: WorkloadStream<R>,
    next_event: Option<WorkloadEvent>,
}

impl<R: BufRead> WorkloadDriver<R> {
    pub fn new(reader: R, interactive: bool, validate: bool) -> Self {
        Self { stream: WorkloadStream::new(reader, interactive, validate), next_event: None }
    }

    fn fill_next(&mut self) -> Result<(), WorkloadError> {
        if self.next_event.is_none() {
            self.next_event = self.stream.next_event()?;
        }
        Ok(())
    }

    /// Drains and applies every queued event whose time has arrived.
    /// Signals `end_sim` itself once the stream is exhausted with nothing
    /// left to dispatch.
    pub fn update_workload<L: LogSink>(&mut self, state: &mut SchedulerState<L>) -> Result<(), WorkloadError> {
        if state.is_done() {
            return Ok(());
        }
        self.fill_next()?;
        loop {
            let Some(event) = &self.next_event else {
                state.end_sim();
                return Ok(());
            };
            if event.time > state.time {
                return Ok(());
            }
            let event = self.next_event.take().expect("checked Some above");
            dispatch(state, event);
            self.fill_next()?;
        }
    }
}

fn dispatch<L: LogSink>(state: &mut SchedulerState<L>, event: WorkloadEvent) {
    match event.action {
        Action::NewCheck(checks) => {
            for c in checks {
                state.add_check(&c.group, &c.name, c.cost, c.priority);
            }
        }
        Action::RemoveCheck(checks) => {
            for c in checks {
                state.remove_check(&c.group, &c.name);
            }
        }
        Action::ChangeVars(vars) => {
            for (key, value) in vars {
                if let Err(e) = state.update_var(&key, value) {
                    let time = state.time;
                    let msg = e.to_string();
                    state.log_mut().error(time, &msg);
                }
            }
        }
        Action::EndSim => state.end_sim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rimm_log::MemorySink;
    use std::io::Cursor;

    fn driver(text: &str) -> WorkloadDriver<Cursor<Vec<u8>>> {
        WorkloadDriver::new(Cursor::new(text.as_bytes().to_vec()), false, false)
    }

    #[test]
    fn absorbs_time_zero_events_on_first_call() {
        let mut d = driver(
            r#"{"action":"newcheck","time":0,"checks":[{"group":"G","name":"C","cost":50,"priority":5}]}"#,
        );
        let mut state = SchedulerState::new(MemorySink::new());
        d.update_workload(&mut state).unwrap();
        assert!(state.find_check("G", "C").is_some());
    }

    #[test]
    fn does_not_dispatch_events_in_the_future() {
        let mut d = driver(r#"{"action":"endsim","time":1000}"#);
        let mut state = SchedulerState::new(MemorySink::new());
        d.update_workload(&mut state).unwrap();
        assert!(!state.is_done());
    }

    #[test]
    fn exhausted_stream_ends_the_simulation() {
        let mut d = driver("");
        let mut state = SchedulerState::new(MemorySink::new());
        d.update_workload(&mut state).unwrap();
        assert!(state.is_done());
    }

    #[test]
    fn changevars_error_is_logged_not_fatal() {
        let mut d = driver(r#"{"action":"changevars","time":0,"vars":{"bogus":1}}"#);
        let mut state = SchedulerState::new(MemorySink::new());
        d.update_workload(&mut state).unwrap();
        assert!(state.log().events.iter().any(|e| e.event_name() == "error"));
    }
}
