//! Orchestration engine for cloudlet policy versions and activations.
//!
//! Two components drive the remote policy service through the injected
//! [`PolicyStore`] collaborator:
//!
//! - [`VersionLifecycleManager`] decides whether a desired change may
//!   mutate an existing policy version in place or must create a new one,
//!   based on the live activation state of that version, and tears a
//!   policy down in the only order the remote service accepts.
//! - [`ActivationController`] drives the asynchronous activation state
//!   machine for a (resource, network) pair: submit, poll to a terminal
//!   status, and short-circuit when the desired state already holds.
//!
//! The remote service is the single source of truth. Nothing here caches
//! activation status across calls; every decision point re-queries the
//! collaborator.

pub mod activation;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod store;

pub use activation::ActivationController;
pub use config::PollConfig;
pub use error::EngineError;
pub use lifecycle::VersionLifecycleManager;
pub use store::{NewPolicy, PolicyStore, PolicyUpdate, StoreError, VersionContent};
