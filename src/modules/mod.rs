//! # External loader modules.
//!
//! A module pairs a [`LoaderFactory`] with a worker task that watches request
//! broadcasts and submits a loader whenever a request needs the factory's kind.
//! Modules never talk to each other or to observers; the bus is the only link.

mod factory;
mod worker;

pub use factory::LoaderFactory;
pub(crate) use worker::spawn_module;
