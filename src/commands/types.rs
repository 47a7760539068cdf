//! `sensu-converge types`

use crate::cli::TypesArgs;
use crate::registry::Registry;
use crate::types;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use declarative::{Descriptor, Placement, PropertySpec, Requirement, Scope};

pub fn run(args: &TypesArgs) -> Result<()> {
    match args.resource_type.as_deref() {
        None => {
            ui::header("Resource types");
            for descriptor in types::ALL {
                println!("  {}", summary_line(descriptor));
            }
        }
        Some(type_name) => {
            let descriptor = Registry::default().descriptor(type_name)?;
            ui::header(descriptor.type_name);
            ui::kv("kind", descriptor.kind);
            ui::kv("api", &format!("{}/{}", descriptor.api_group, descriptor.collection));
            ui::kv("sensuctl", descriptor.cli_command);
            ui::kv("title", descriptor.title_patterns.join("  |  ").as_str());

            ui::section("Properties");
            for property in descriptor.properties {
                println!("  {}", property_line(property));
            }
            if !descriptor.requires_one_of.is_empty() {
                ui::dim(&format!("one of {} is required", descriptor.requires_one_of.join(", ")));
            }
        }
    }
    Ok(())
}

fn summary_line(descriptor: &Descriptor) -> String {
    let scope = match descriptor.scope {
        Scope::Namespaced => "namespaced",
        Scope::Cluster => "cluster",
    };
    format!(
        "{:<30} {:<12} {}",
        descriptor.type_name.bold(),
        scope,
        descriptor.collection.dimmed()
    )
}

fn property_line(property: &PropertySpec) -> String {
    let mut notes = Vec::new();
    match property.requirement {
        Requirement::Optional => {}
        Requirement::WhenPresent => notes.push("required"),
        Requirement::Always => notes.push("always required"),
    }
    if property.placement == Placement::Metadata {
        notes.push("metadata");
    }
    if property.write_only {
        notes.push("write-only");
    }

    let notes = if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join(", "))
    };
    format!("{:<28} {}{}", property.name, property.kind.expected(), notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CHECK, USER};

    #[test]
    fn test_property_line() {
        let command = CHECK.property("command").unwrap();
        assert!(property_line(command).ends_with("a String (required)"));

        let password = USER.property("password").unwrap();
        assert!(property_line(password).contains("write-only"));

        let labels = CHECK.property("labels").unwrap();
        assert!(property_line(labels).ends_with("a Hash (metadata)"));
    }

    #[test]
    fn test_every_type_has_a_summary() {
        for descriptor in types::ALL {
            assert!(summary_line(descriptor).contains(descriptor.collection));
        }
    }
}
