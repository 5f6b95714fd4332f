//! Scripted operation for dispatcher integration tests.
//!
//! Each target follows a script of steps (latency + result); the last step
//! repeats once the script runs out. The operation records start/end events,
//! per-target call counts and the peak number of concurrent invocations.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use fanout_core::{FailureKind, Operation, OperationError};

#[derive(Debug, Clone)]
pub struct Step {
    pub latency: Duration,
    pub result: Result<(), FailureKind>,
}

pub fn ok(ms: u64) -> Step {
    Step {
        latency: Duration::from_millis(ms),
        result: Ok(()),
    }
}

pub fn transient(ms: u64) -> Step {
    Step {
        latency: Duration::from_millis(ms),
        result: Err(FailureKind::Transient),
    }
}

pub fn permanent(ms: u64) -> Step {
    Step {
        latency: Duration::from_millis(ms),
        result: Err(FailureKind::Permanent),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

#[derive(Default)]
pub struct ScriptedOperation {
    scripts: HashMap<String, Vec<Step>>,
    calls: Mutex<HashMap<String, usize>>,
    events: Mutex<Vec<Event>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, target: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(target.to_string(), steps);
        self
    }

    pub fn calls(&self, target: &str) -> usize {
        self.calls.lock().unwrap().get(target).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn position(&self, event: &Event) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event {:?} not recorded", event))
    }

    fn next_step(&self, target: &str) -> Step {
        let mut calls = self.calls.lock().unwrap();
        let n = calls.entry(target.to_string()).or_insert(0);
        let call = *n;
        *n += 1;
        match self.scripts.get(target) {
            Some(steps) if !steps.is_empty() => steps[call.min(steps.len() - 1)].clone(),
            _ => ok(0),
        }
    }
}

impl Operation<String> for ScriptedOperation {
    type Output = String;

    fn perform(
        &self,
        target: &String,
    ) -> impl Future<Output = Result<String, OperationError>> + Send {
        async move {
            let step = self.next_step(target);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.events.lock().unwrap().push(Event::Start(target.clone()));

            tokio::time::sleep(step.latency).await;

            self.events.lock().unwrap().push(Event::End(target.clone()));
            self.active.fetch_sub(1, Ordering::SeqCst);
            match step.result {
                Ok(()) => Ok(format!("{} done", target)),
                Err(FailureKind::Transient) => {
                    Err(OperationError::transient(format!("{} unavailable", target)))
                }
                Err(FailureKind::Permanent) => {
                    Err(OperationError::permanent(format!("{} rejected request", target)))
                }
            }
        }
    }
}

pub fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
