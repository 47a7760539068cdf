//! `sensu-converge apply`

use super::Session;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::progress::{ConsoleConfirm, ConsoleProgress};
use crate::ui;
use anyhow::{Result, bail};
use declarative::{ConfirmCallback, ExecuteOptions, ExecuteSummary, ProgressCallback};
use std::time::Duration;

/// How long `--wait` polls the API
const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut progress = ConsoleProgress::new(ctx.quiet);
    let mut confirm = ConsoleConfirm::new(args.yes);

    let summary = converge(ctx, &session, args, &mut progress, &mut confirm)?;

    for (title, error) in progress.failures() {
        ui::error(&format!("{title}: {error}"));
    }
    if !ctx.quiet {
        ui::print_summary(&summary, args.dry_run);
    }
    if !summary.is_success() {
        bail!("{} failed", ui::plural(summary.failed, "resource"));
    }
    Ok(())
}

/// One reconciliation pass over the manifest
pub fn converge<P, C>(
    ctx: &Context,
    session: &Session,
    args: &ApplyArgs,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    if args.wait && !session.client.wait_until_reachable("/info", WAIT_TIMEOUT) {
        bail!("Sensu API at {} is not reachable", session.client.base_url());
    }

    let mut plan = session.plan(&args.manifest.file, args.target.as_deref())?;
    if plan.is_empty() {
        if !ctx.quiet {
            ui::info("Nothing to apply");
        }
        return Ok(ExecuteSummary::default());
    }
    log::info!(
        "Converging {} in {} batches",
        ui::plural(plan.total_resources(), "resource"),
        plan.batches.len()
    );

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        verbose: ctx.verbose > 0,
    };
    declarative::execute(&mut plan, &opts, progress, confirm)
}
