//! A `Monitor` that records every call, for test assertions. Grounded on
//! `conserve::monitor::collect`.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::job::JobID;
use crate::monitor::{Counter, Monitor, Problem};

#[derive(Default)]
pub struct CollectingMonitor {
    counters: Mutex<HashMap<Counter, usize>>,
    problems: Mutex<Vec<String>>,
    first_part_accepted: Mutex<Vec<JobID>>,
}

impl CollectingMonitor {
    pub fn new() -> Self {
        CollectingMonitor::default()
    }

    pub fn counter(&self, counter: Counter) -> usize {
        *self.counters.lock().expect("monitor mutex poisoned").get(&counter).unwrap_or(&0)
    }

    pub fn problems(&self) -> Vec<String> {
        self.problems.lock().expect("monitor mutex poisoned").clone()
    }

    pub fn first_part_accepted_count(&self) -> usize {
        self.first_part_accepted.lock().expect("monitor mutex poisoned").len()
    }
}

impl Monitor for CollectingMonitor {
    fn count(&self, counter: Counter, increment: usize) {
        *self.counters.lock().expect("monitor mutex poisoned").entry(counter).or_insert(0) += increment;
    }

    fn set_counter(&self, counter: Counter, value: usize) {
        self.counters.lock().expect("monitor mutex poisoned").insert(counter, value);
    }

    fn problem(&self, problem: Problem) {
        let message = match problem {
            Problem::ObjectError { path, message } => format!("{path}: {message}"),
            Problem::Other(message) => message,
        };
        self.problems.lock().expect("monitor mutex poisoned").push(message);
    }

    fn on_first_part_accepted(&self, job_id: JobID) {
        self.first_part_accepted.lock().expect("monitor mutex poisoned").push(job_id);
    }
}
