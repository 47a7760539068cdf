//! `sensu-converge diff`

use super::Session;
use crate::Context;
use crate::cli::DiffArgs;
use crate::differ;
use anyhow::Result;
use declarative::ResourceDiff;

pub fn run(ctx: &Context, args: &DiffArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let diffs = pending(&session, args)?;
    differ::display_diff(&diffs);
    Ok(())
}

/// Changes an apply of the manifest would make
pub fn pending(session: &Session, args: &DiffArgs) -> Result<Vec<ResourceDiff>> {
    let mut plan = session.plan(&args.manifest.file, args.target.as_deref())?;
    declarative::preview(&mut plan)
}
