//! `sensu-converge validate`

use super::load_config;
use crate::Context;
use crate::cli::ManifestArgs;
use crate::manifest::Manifest;
use crate::registry::Registry;
use crate::ui;
use anyhow::{Result, bail};

/// Check a manifest offline; nothing is sent to the backend.
pub fn run(ctx: &Context, args: &ManifestArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let registry = Registry::new(config.default_provider);
    let manifest = Manifest::load(&args.file)?;

    let (resolved, errors) = manifest.check(&registry);
    for error in &errors {
        ui::error(&error.to_string());
    }
    if !errors.is_empty() {
        bail!(
            "{} has {}",
            args.file.display(),
            ui::plural(errors.len(), "invalid resource")
        );
    }

    if !ctx.quiet {
        ui::success(&format!(
            "{}: {} valid",
            args.file.display(),
            ui::plural(resolved.len(), "resource")
        ));
    }
    Ok(())
}
