//! # Declarative
//!
//! A framework for declarative resource reconciliation.
//!
//! This crate provides the core abstractions for declaring desired state,
//! observing current state, and converging a remote backend to match.
//!
//! ## Core Concepts
//!
//! - **Descriptor**: static description of a resource type (properties, kinds,
//!   title patterns, record layout)
//! - **Managed**: a declared instance with its prefetched state and staged writes
//! - **Provider**: converges the instances of one type; [`Reconciler`] is the
//!   generic implementation over a [`Store`]
//! - **ExecutionPlan**: instances batched by provider
//! - **Executor**: prefetches each batch, then creates, flushes or destroys
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Batch, Ensure, ExecuteOptions, ExecutionPlan, Managed, Reconciler};
//!
//! let declared = CHECK.declare("cpu in dev", Ensure::Present, &input)?;
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add_batch(Batch::new(
//!     Box::new(Reconciler::new(store, &CHECK)),
//!     vec![Managed::new(declared)],
//! ));
//!
//! let summary = declarative::execute_simple(&mut plan, &ExecuteOptions::default())?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Store`]: reads and writes raw records
//! - [`Provider`]: converges instances, when a type needs more than a store
//! - [`ProgressCallback`]: receives progress updates
//! - [`ConfirmCallback`]: handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on a specific
//! client, UI framework or backend.

pub mod context;
pub mod descriptor;
pub mod diff;
pub mod error;
pub mod executor;
pub mod instance;
pub mod planner;
pub mod provider;
pub mod types;
pub mod value;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use descriptor::{
    ANNOTATIONS, DefaultValue, Descriptor, Envelope, LABELS, NameField, Placement, PropertySpec,
    Requirement, Scope,
};
pub use diff::{DiffAction, DiffSummary, PropertyChange, ResourceDiff, group_by_type};
pub use error::ValidationError;
pub use executor::{converge, execute, execute_simple, preview};
pub use instance::{Declared, Ensure, Instance, InstanceKey, Managed, PropertyFlush};
pub use planner::{Batch, ExecutionPlan};
pub use provider::{Provider, Reconciler, Store};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary};
pub use value::{PropertyKind, Value};
