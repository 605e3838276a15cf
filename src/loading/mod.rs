//! # Loading vocabulary.
//!
//! This module provides the value types and the contract the orchestrator drives:
//! - [`LoaderKind`] - opaque tag naming a loader family
//! - [`LoadDescriptor`] / [`DescriptorRef`] - kind-tagged "what to load"
//! - [`LoadRequest`] / [`LoadSettings`] - descriptors plus limits for one cycle
//! - [`Phase`] - ordered pipeline steps
//! - [`Loader`] / [`LoaderBox`] - five-phase unit of work

mod descriptor;
mod kind;
mod loader;
mod phase;
mod request;

pub use descriptor::{DescriptorRef, LoadDescriptor};
pub use kind::LoaderKind;
pub use loader::{Loader, LoaderBox};
pub use phase::Phase;
pub use request::{LoadRequest, LoadSettings};
