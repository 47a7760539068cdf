//! `sensu-converge list`

use super::Session;
use crate::Context;
use crate::cli::ListArgs;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use declarative::Instance;

pub fn run(ctx: &Context, args: &ListArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let instances = instances(&session, &args.resource_type)?;
    let descriptor = session.registry.descriptor(&args.resource_type)?;

    if args.json {
        let records: Vec<_> = instances.iter().map(|i| descriptor.denormalize(i)).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    ui::header(&format!(
        "{} ({})",
        descriptor.type_name,
        ui::plural(instances.len(), "instance")
    ));
    for instance in &instances {
        println!("  {} {}", "•".cyan(), instance.key);
        if ctx.verbose > 0 {
            for (property, value) in &instance.attributes {
                ui::dim(&format!("    {property} = {value}"));
            }
        }
    }
    Ok(())
}

/// Every instance of a type on the backend, through the default provider
pub fn instances(session: &Session, type_name: &str) -> Result<Vec<Instance>> {
    let descriptor = session.registry.descriptor(type_name)?;
    let provider = session.registry.provider(
        descriptor,
        session.registry.default_provider(),
        &session.backends(),
    );
    log::debug!("Listing {} through {}", descriptor.type_name, provider.name());
    provider.instances()
}
