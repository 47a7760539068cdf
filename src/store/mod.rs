//! Record stores backing the two providers
//!
//! Both stores exchange the flat records produced by
//! [`declarative::Descriptor::denormalize`]; wrapping into the
//! `{type, api_version, metadata, spec}` envelope happens here, where the
//! backend needs it.

mod api;
mod cli;

pub use api::ApiStore;
pub use cli::CliStore;
