//! Execution planner - groups managed instances by provider

use crate::instance::Managed;
use crate::provider::Provider;

/// Instances of one type bound to the provider that converges them
pub struct Batch<'a> {
    pub provider: Box<dyn Provider + 'a>,
    pub managed: Vec<Managed>,
}

impl<'a> Batch<'a> {
    pub fn new(provider: Box<dyn Provider + 'a>, managed: Vec<Managed>) -> Self {
        Self { provider, managed }
    }

    /// Declared type name of the batch
    pub fn resource_type(&self) -> &'static str {
        self.provider.descriptor().type_name
    }
}

/// An execution plan: batches run in insertion order
#[derive(Default)]
pub struct ExecutionPlan<'a> {
    pub batches: Vec<Batch<'a>>,
}

impl<'a> ExecutionPlan<'a> {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            batches: Vec::new(),
        }
    }

    /// Add a batch, ignoring empty ones
    pub fn add_batch(&mut self, batch: Batch<'a>) {
        if !batch.managed.is_empty() {
            self.batches.push(batch);
        }
    }

    /// Filter plan to only include instances matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Managed) -> bool,
    {
        let mut plan = Self::new();
        for mut batch in self.batches {
            batch.managed.retain(|m| predicate(m));
            plan.add_batch(batch);
        }
        plan
    }

    /// Filter plan to only include instances matching a target pattern
    ///
    /// Target format: "type" or "type.title"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, title) = parse_target(t);
                self.filter(|m| matches_filter(m, resource_type.as_deref(), title.as_deref()))
            }
        }
    }

    /// Total number of instances in the plan
    pub fn total_resources(&self) -> usize {
        self.batches.iter().map(|b| b.managed.len()).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Parse a target string like "type.title" into (type, title)
///
/// Titles may contain dots; only the first one separates.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some(("", title)) => (None, Some(title.to_string())),
        Some((resource_type, title)) => (Some(resource_type.to_string()), Some(title.to_string())),
    }
}

/// Check if an instance matches the filter criteria
fn matches_filter(managed: &Managed, resource_type: Option<&str>, title: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        // "check" is short for "sensu_check"
        let type_name = managed.descriptor().type_name;
        if type_name != rt && type_name.strip_prefix("sensu_") != Some(rt) {
            return false;
        }
    }

    if let Some(t) = title
        && !managed.title().contains(t)
    {
        return false;
    }

    true
}
