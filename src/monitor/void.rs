//! A `Monitor` that discards everything. Grounded on
//! `conserve::monitor::void`.

use crate::job::JobID;
use crate::monitor::{Counter, Monitor, Problem};

#[derive(Debug, Default)]
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn count(&self, _counter: Counter, _increment: usize) {}

    fn set_counter(&self, _counter: Counter, _value: usize) {}

    fn problem(&self, _problem: Problem) {}

    fn on_first_part_accepted(&self, _job_id: JobID) {}
}
