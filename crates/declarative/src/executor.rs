//! Execution engine - converges planned instances one at a time

use crate::context::{ConfirmCallback, ProgressCallback};
use crate::diff::{ResourceDiff, property_changes};
use crate::instance::{Ensure, Managed};
use crate::planner::ExecutionPlan;
use crate::provider::Provider;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;

/// Converge one prefetched instance
///
/// Drifted properties are staged and written by a single flush.
pub fn converge(provider: &dyn Provider, managed: &mut Managed) -> Result<ApplyResult> {
    match (managed.ensure(), provider.exists(managed)) {
        (Ensure::Present, false) => {
            provider.create(managed)?;
            Ok(ApplyResult::Created)
        }
        (Ensure::Present, true) => {
            let changes = property_changes(managed);
            for change in &changes {
                managed.stage(change.property.clone(), change.desired.clone());
            }
            provider.flush(managed)?;
            if changes.is_empty() {
                Ok(ApplyResult::NoChange)
            } else {
                Ok(ApplyResult::Modified)
            }
        }
        (Ensure::Absent, true) => {
            provider.destroy(managed)?;
            Ok(ApplyResult::Removed)
        }
        (Ensure::Absent, false) => Ok(ApplyResult::NoChange),
    }
}

/// Collect pending diffs of already prefetched batches
fn collect_diffs(plan: &ExecutionPlan, skip: &[bool]) -> Vec<ResourceDiff> {
    plan.batches
        .iter()
        .zip(skip)
        .filter(|(_, skipped)| !**skipped)
        .flat_map(|(batch, _)| {
            batch
                .managed
                .iter()
                .filter_map(|m| ResourceDiff::from_managed(batch.provider.as_ref(), m))
        })
        .collect()
}

/// Prefetch every batch and return the pending changes
///
/// Fails on the first prefetch error.
pub fn preview(plan: &mut ExecutionPlan) -> Result<Vec<ResourceDiff>> {
    for batch in &mut plan.batches {
        batch.provider.prefetch(&mut batch.managed)?;
    }
    Ok(collect_diffs(plan, &vec![false; plan.batches.len()]))
}

/// Execute a plan with the given options and callbacks
///
/// A batch whose prefetch fails has every instance marked failed; the rest of
/// the plan still runs. Failures while converging are recorded per instance.
///
/// # Returns
/// Summary of execution results
pub fn execute<P, C>(
    plan: &mut ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let mut summary = ExecuteSummary::default();
    let mut failed = Vec::with_capacity(plan.batches.len());

    for batch in &mut plan.batches {
        match batch.provider.prefetch(&mut batch.managed) {
            Ok(()) => failed.push(false),
            Err(e) => {
                log::error!("Failed to prefetch {}: {e:#}", batch.resource_type());
                let result = ApplyResult::Failed {
                    error: format!("prefetch failed: {e:#}"),
                };
                for managed in &batch.managed {
                    progress.on_resource_complete(managed.title(), &result);
                    summary.add_result(&result);
                }
                failed.push(true);
            }
        }
    }

    let diffs = collect_diffs(plan, &failed);
    progress.on_plan(&diffs);

    let reachable: usize = plan
        .batches
        .iter()
        .zip(&failed)
        .filter(|(_, failed)| !**failed)
        .map(|(batch, _)| batch.managed.len())
        .sum();

    if diffs.is_empty() {
        summary.no_change += reachable;
        return Ok(summary);
    }

    if opts.dry_run {
        summary.skipped += diffs.len();
        summary.no_change += reachable - diffs.len();
        return Ok(summary);
    }

    let prompt = format!(
        "Apply {} change{}?",
        diffs.len(),
        if diffs.len() == 1 { "" } else { "s" }
    );
    if !confirm.confirm(&prompt)? {
        summary.skipped += diffs.len();
        summary.no_change += reachable - diffs.len();
        return Ok(summary);
    }

    for (batch, failed) in plan.batches.iter_mut().zip(&failed) {
        if *failed {
            continue;
        }
        let provider = batch.provider.as_ref();
        progress.on_batch_start(provider.descriptor().type_name, batch.managed.len());
        for managed in &mut batch.managed {
            progress.on_resource_start(managed.title());
            let result = converge(provider, managed).unwrap_or_else(|e| {
                log::error!("{} {}: {e:#}", provider.descriptor().type_name, managed.title());
                ApplyResult::Failed {
                    error: format!("{e:#}"),
                }
            });
            if opts.verbose {
                log::info!("{} {}: {result:?}", provider.descriptor().type_name, managed.title());
            }
            progress.on_resource_complete(managed.title(), &result);
            summary.add_result(&result);
        }
        progress.on_batch_complete();
    }

    Ok(summary)
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(plan: &mut ExecutionPlan, opts: &ExecuteOptions) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoDecline, NoProgress};
    use crate::planner::Batch;
    use crate::provider::Reconciler;
    use crate::testing::{MemoryStore, WIDGET, declare};
    use serde_json::json;

    fn plan_for(store: &MemoryStore, declared: &[(&str, Ensure)]) -> ExecutionPlan<'static> {
        let mut plan = ExecutionPlan::new();
        plan.add_batch(Batch::new(
            Box::new(Reconciler::new(store.clone(), &WIDGET)),
            declared
                .iter()
                .map(|(title, ensure)| Managed::new(declare(title, *ensure)))
                .collect(),
        ));
        plan
    }

    #[test]
    fn test_execute_empty_plan() {
        let mut plan = ExecutionPlan::new();
        let result = execute_simple(&mut plan, &ExecuteOptions::default()).unwrap();
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_create_then_second_pass_is_idempotent() {
        let store = MemoryStore::new();
        let declared = [("a", Ensure::Present), ("b in dev", Ensure::Present)];

        let summary = execute_simple(&mut plan_for(&store, &declared), &ExecuteOptions::default()).unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(store.writes().len(), 2);

        let summary = execute_simple(&mut plan_for(&store, &declared), &ExecuteOptions::default()).unwrap();
        assert_eq!(summary.no_change, 2);
        assert_eq!(summary.total_changes(), 0);
        assert_eq!(store.writes().len(), 2);
    }

    #[test]
    fn test_update_is_one_write() {
        let store = MemoryStore::new();
        store.seed(
            "default",
            json!({"metadata": {"name": "a"}, "command": "old", "interval": 10, "publish": false}),
        );

        let summary = execute_simple(
            &mut plan_for(&store, &[("a", Ensure::Present)]),
            &ExecuteOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.modified, 1);
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "update a in default");
        assert_eq!(writes[0].1["command"], "x");
        assert_eq!(writes[0].1["interval"], 60);
        assert_eq!(writes[0].1["publish"], true);
    }

    #[test]
    fn test_destroy() {
        let store = MemoryStore::new();
        store.seed("default", json!({"metadata": {"name": "a"}, "command": "x"}));

        let summary = execute_simple(
            &mut plan_for(&store, &[("a", Ensure::Absent), ("b", Ensure::Absent)]),
            &ExecuteOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(store.writes()[0].0, "delete a in default");
    }

    #[test]
    fn test_dry_run_and_decline_write_nothing() {
        let store = MemoryStore::new();
        let declared = [("a", Ensure::Present)];

        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = execute_simple(&mut plan_for(&store, &declared), &opts).unwrap();
        assert_eq!(summary.skipped, 1);

        let summary = execute(
            &mut plan_for(&store, &declared),
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_prefetch_failure_fails_batch() {
        let store = MemoryStore::new();
        store.fail_lists();

        let summary = execute_simple(
            &mut plan_for(&store, &[("a", Ensure::Present), ("b", Ensure::Present)]),
            &ExecuteOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.failed, 2);
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_converge_propagates_store_errors() {
        let store = MemoryStore::new();
        let provider = Reconciler::new(store.clone(), &WIDGET);
        let mut managed = vec![Managed::new(declare("a", Ensure::Present))];
        provider.prefetch(&mut managed).unwrap();
        // created behind the reconciler's back
        store.seed("default", json!({"metadata": {"name": "a"}}));

        assert!(converge(&provider, &mut managed[0]).is_err());
    }

    #[test]
    fn test_preview() {
        let store = MemoryStore::new();
        let diffs = preview(&mut plan_for(&store, &[("a", Ensure::Present)])).unwrap();
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].is_addition());
        assert!(store.writes().is_empty());
    }
}
