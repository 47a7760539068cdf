//! Wrapper around the `sensuctl` command line tool.
//!
//! Every call goes through a [`Runner`], so tests can swap the real process
//! for a [`MockRunner`] that records invocations and replays canned output.

mod runner;

pub use runner::{CommandOutput, Invocation, MockRunner, ProcessRunner, Runner};

use crate::client::members_of;
use crate::error::{Error, Result};
use crate::types::ClusterMember;
use serde_json::{Deserializer, Value};

/// Handle on a `sensuctl` binary.
pub struct Sensuctl {
    program: String,
    runner: Box<dyn Runner>,
}

impl Sensuctl {
    /// Use the `sensuctl` found at `program` (a path or a name on `PATH`).
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_runner(program, Box::new(ProcessRunner))
    }

    /// Use a custom runner (useful for testing).
    pub fn with_runner(program: impl Into<String>, runner: Box<dyn Runner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    /// Program name or path used for every invocation.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run sensuctl and return stdout, failing on a non-zero exit.
    pub fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        log::debug!("{} {}", self.program, args.join(" "));
        let output = self.runner.run(&self.program, args, stdin)?;
        if !output.success {
            return Err(Error::Command {
                args: args.join(" "),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// `sensuctl <command> list --format json`, scoped to one namespace when
    /// given. Cluster-scoped commands pass `None`.
    pub fn list(&self, command: &str, namespace: Option<&str>) -> Result<Vec<Value>> {
        let mut args = vec![
            command.to_string(),
            "list".to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];
        if let Some(namespace) = namespace {
            args.push("--namespace".to_string());
            args.push(namespace.to_string());
        }
        parse_list(&self.run(&args, None)?)
    }

    /// Names of all namespaces.
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let records = self.list("namespace", None)?;
        Ok(records
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// `sensuctl create` with a wrapped resource on stdin. Creates or
    /// replaces the resource.
    pub fn create(&self, resource: &Value) -> Result<()> {
        let body = serde_json::to_string(resource)?;
        self.run(&["create".to_string()], Some(&body))?;
        Ok(())
    }

    /// `sensuctl <command> <verb> <ids>... --skip-confirm [--namespace ns]`.
    ///
    /// The verb is `delete` for most commands; users are `disable`d instead.
    /// Events take two ids, the entity then the check.
    pub fn delete(&self, command: &str, verb: &str, ids: &[&str], namespace: Option<&str>) -> Result<()> {
        let mut args = vec![command.to_string(), verb.to_string()];
        args.extend(ids.iter().map(|id| (*id).to_string()));
        args.push("--skip-confirm".to_string());
        if let Some(namespace) = namespace {
            args.push("--namespace".to_string());
            args.push(namespace.to_string());
        }
        self.run(&args, None)?;
        Ok(())
    }

    /// `sensuctl dump <resource> --format json`, for resources without a
    /// command of their own. The output is a stream of wrapped objects.
    pub fn dump(&self, resource: &str, namespace: Option<&str>) -> Result<Vec<Value>> {
        let mut args = vec![
            "dump".to_string(),
            resource.to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];
        match namespace {
            Some(namespace) => {
                args.push("--namespace".to_string());
                args.push(namespace.to_string());
            }
            None => args.push("--all-namespaces".to_string()),
        }
        parse_stream(&self.run(&args, None)?)
    }

    /// `sensuctl delete` with a wrapped resource on stdin.
    pub fn delete_resource(&self, resource: &Value) -> Result<()> {
        let body = serde_json::to_string(resource)?;
        self.run(&["delete".to_string()], Some(&body))?;
        Ok(())
    }

    // =========================================================================
    // Cluster members
    // =========================================================================

    /// `sensuctl cluster member-list --format json`
    pub fn member_list(&self) -> Result<Vec<ClusterMember>> {
        let args = ["cluster", "member-list", "--format", "json"].map(String::from);
        let stdout = self.run(&args, None)?;
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        members_of(serde_json::from_str(stdout.trim())?)
    }

    /// `sensuctl cluster member-add <name> <peer-urls>`
    pub fn member_add(&self, name: &str, peer_urls: &[String]) -> Result<()> {
        let args = ["cluster", "member-add", name, peer_urls.join(",").as_str()].map(String::from);
        self.run(&args, None)?;
        Ok(())
    }

    /// `sensuctl cluster member-update <id> <peer-urls>`; ids are hexadecimal.
    pub fn member_update(&self, id: u64, peer_urls: &[String]) -> Result<()> {
        let id = format!("{id:x}");
        let args = ["cluster", "member-update", id.as_str(), peer_urls.join(",").as_str()].map(String::from);
        self.run(&args, None)?;
        Ok(())
    }

    /// `sensuctl cluster member-remove <id>`
    pub fn member_remove(&self, id: u64) -> Result<()> {
        let id = format!("{id:x}");
        let args = ["cluster", "member-remove", id.as_str()].map(String::from);
        self.run(&args, None)?;
        Ok(())
    }
}

/// Parse list output. sensuctl prints `null` (or nothing) for an empty list.
fn parse_list(stdout: &str) -> Result<Vec<Value>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(trimmed)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        other => Err(Error::InvalidResponse(format!(
            "expected a JSON array from sensuctl, got {other}"
        ))),
    }
}

/// Parse a stream of concatenated JSON values, as printed by `sensuctl dump`.
/// Arrays in the stream are flattened.
fn parse_stream(stdout: &str) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    for value in Deserializer::from_str(stdout).into_iter::<Value>() {
        match value? {
            Value::Null => {}
            Value::Array(values) => items.extend(values),
            other => items.push(other),
        }
    }
    Ok(items)
}
