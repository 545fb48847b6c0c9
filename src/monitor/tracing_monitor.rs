//! A `Monitor` that emits `tracing` events, the default for the `azcopy`
//! binary. Grounded on `conserve`'s use of `tracing` throughout its core
//! modules (e.g. `index.rs`'s `debug_span!`/`error!` calls).

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::job::JobID;
use crate::monitor::{Counter, Monitor, Problem};

#[derive(Default)]
pub struct TracingMonitor {
    counters: Mutex<HashMap<Counter, usize>>,
}

impl TracingMonitor {
    pub fn new() -> Self {
        TracingMonitor::default()
    }

    pub fn counter(&self, counter: Counter) -> usize {
        *self.counters.lock().expect("monitor mutex poisoned").get(&counter).unwrap_or(&0)
    }

    pub fn snapshot(&self) -> HashMap<Counter, usize> {
        self.counters.lock().expect("monitor mutex poisoned").clone()
    }
}

impl Monitor for TracingMonitor {
    fn count(&self, counter: Counter, increment: usize) {
        let mut counters = self.counters.lock().expect("monitor mutex poisoned");
        *counters.entry(counter).or_insert(0) += increment;
        debug!(counter = counter.label(), increment, "counter incremented");
    }

    fn set_counter(&self, counter: Counter, value: usize) {
        self.counters.lock().expect("monitor mutex poisoned").insert(counter, value);
    }

    fn problem(&self, problem: Problem) {
        match problem {
            Problem::ObjectError { path, message } => {
                info!(%path, %message, "per-object error, skipping and continuing");
            }
            Problem::Other(message) => warn!(%message, "problem reported"),
        }
    }

    fn on_first_part_accepted(&self, job_id: JobID) {
        info!(%job_id, "first job part accepted; progress polling may begin");
    }
}
