//! Progress and confirmation callbacks
//!
//! These traits keep the executor free of any terminal or UI dependency.

use crate::diff::ResourceDiff;
use crate::types::ApplyResult;
use anyhow::Result;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called once after prefetch with every pending change
    fn on_plan(&mut self, _diffs: &[ResourceDiff]) {}

    /// Called when starting to converge the instances of one type
    fn on_batch_start(&mut self, resource_type: &str, count: usize);

    /// Called when starting to converge a single instance
    fn on_resource_start(&mut self, title: &str);

    /// Called when an instance completes
    fn on_resource_complete(&mut self, title: &str, result: &ApplyResult);

    /// Called when a batch completes
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _resource_type: &str, _count: usize) {}
    fn on_resource_start(&mut self, _title: &str) {}
    fn on_resource_complete(&mut self, _title: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
