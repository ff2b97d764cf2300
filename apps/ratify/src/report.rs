//! Run report: events keyed by validator name, in insertion order.
//!
//! The report holds no pass/fail flag of its own. Callers derive the outcome
//! from the presence of failing events. Appending is the only mutation and is
//! safe to call from parallel validators.

use crate::models::Event;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct Report {
    sources: Mutex<Vec<(String, Vec<Event>)>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event under its `source`, creating the entry on first use.
    pub fn add_event(&self, event: Event) {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        match sources.iter_mut().find(|(name, _)| *name == event.source) {
            Some((_, events)) => events.push(event),
            None => sources.push((event.source.clone(), vec![event])),
        }
    }

    /// Register a source so it is rendered even when it produced no events.
    pub fn touch(&self, source: &str) {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        if !sources.iter().any(|(name, _)| name == source) {
            sources.push((source.to_string(), Vec::new()));
        }
    }

    /// Snapshot of every source and its events.
    pub fn sources(&self) -> Vec<(String, Vec<Event>)> {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_for(&self, source: &str) -> Vec<Event> {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, events)| events.clone())
            .unwrap_or_default()
    }

    pub fn has_failures(&self) -> bool {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(_, events)| events.iter().any(Event::is_failing))
    }

    /// Number of failing events recorded under `source`.
    pub fn failing_count(&self, source: &str) -> usize {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(name, _)| name == source)
            .map_or(0, |(_, events)| events.iter().filter(|e| e.is_failing()).count())
    }

    pub fn len(&self) -> usize {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, events)| events.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
