//! `sensu-converge ping`

use super::Session;
use crate::Context;
use crate::cli::PingArgs;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use std::time::Duration;

pub fn run(ctx: &Context, args: &PingArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    check(&session, args)?;

    if !ctx.quiet {
        ui::success(&format!("Sensu API at {} is reachable", session.client.base_url()));
        ui::kv("user", &session.config.api.username);
    }
    Ok(())
}

/// Wait for the API, then make sure the credentials are accepted.
pub fn check(session: &Session, args: &PingArgs) -> Result<()> {
    let client = &session.client;
    if !client.wait_until_reachable(&args.path, Duration::from_secs(args.timeout)) {
        bail!(
            "Sensu API at {}{} did not answer within {}s",
            client.base_url(),
            args.path,
            args.timeout
        );
    }
    client
        .auth_test()
        .with_context(|| format!("Could not log in as {}", session.config.api.username))
}
