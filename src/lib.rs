//! # loadvisor
//!
//! **Loadvisor** is a barrier-synchronized, multi-phase load orchestrator for Rust.
//!
//! Independent modules each contribute a loader for the part of a load request they
//! understand (a scene, a HUD, a set of audio banks...). The orchestrator waits until
//! every needed loader has registered, then walks all of them through five ordered
//! phases, publishing progress on a typed event bus that observers can follow.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller                         ┌────────────────────────────┐
//!     │ submit(LoadRequest)        │  EventBus (one broadcast   │
//!     ▼                            │  channel per event type)   │
//! ┌──────────┐  publish_complete   │                            │
//! │ Commands │────────────────────►│  LoadRequest  ──────────┐  │
//! └────┬─────┘                     │  LoadProgress ───────┐  │  │
//!      │ prepare_for_load          └──────────────────────┼──┼──┘
//!      ▼                                                  │  │
//! ┌──────────────────────────────┐  register_loader       │  ▼
//! │ Orchestrator                 │◄──────────────── ┌────────────────┐
//! │ - pending descriptors        │                  │ module workers │
//! │ - registered loaders         │                  │ (LoaderFactory)│
//! │ - registration watchdog      │                  └────────────────┘
//! │ - phase pipeline ────────────┼─► LoadProgress ──┘
//! └──────────────────────────────┘                  ▼
//!                                           ┌────────────────┐
//!                                           │  ObserverSet   │
//!                                           │  (Observe)     │
//!                                           └────────────────┘
//! ```
//!
//! ### Cycle
//! ```text
//! submit(request)
//!   ├─► orchestrator records descriptors, arms watchdog(max_wait)
//!   └─► request broadcast once, request channel closed
//!
//! each module whose kind is requested:
//!   create() ─► initialize(descriptor) ─► submit_loader_registration_for(cycle, loader)
//!
//! last needed loader registers:
//!   for phase in [Scene, Resource, Prefab, Instantiate, Init] {
//!     ├─► publish LoadProgress{ phase, step, total }
//!     └─► run phase on every loader, in registration order
//!   }
//!   ├─ all Ok        ─► reset ─► complete(progress) ─► complete(request)
//!   └─ any failure   ─► reset ─► error-stop(progress) ─► error-stop(request)
//!
//! watchdog fires before the barrier ─► reset ─► error-stop(RegistrationTimeout)
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                              |
//! |-------------------|-------------------------------------------------------------------|-------------------------------------------------|
//! | **Event bus**     | Typed, ref-counted, lazily created pub/sub channels.              | [`EventBus`], [`Subscription`], [`FeedStream`]  |
//! | **Orchestration** | Barrier + five-phase pipeline, one cycle at a time.               | [`Orchestrator`], [`Registration`], [`Phase`]   |
//! | **Loaders**       | Contract for units of loading work and the modules that make them.| [`Loader`], [`LoaderFactory`], [`LoadDescriptor`]|
//! | **Requests**      | Descriptors plus per-cycle limits, submitted through commands.    | [`LoadRequest`], [`LoadSettings`], [`Commands`] |
//! | **Observers**     | Follow progress, completion and failure of every cycle.           | [`Observe`], [`ObserverSet`], [`LoadProgress`]  |
//! | **Errors**        | Typed errors for loaders, cycles and requests.                    | [`LoaderError`], [`LoadError`], [`RequestError`]|
//! | **Configuration** | Centralize bus capacity and default windows.                      | [`Config`]                                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] observer _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use loadvisor::{
//!     Config, DescriptorRef, LoadDescriptor, Loadvisor, Loader, LoaderBox, LoaderError,
//!     LoaderFactory, LoaderKind,
//! };
//!
//! const HUD: LoaderKind = LoaderKind::from_static("hud");
//!
//! #[derive(Debug)]
//! struct HudDescriptor;
//! impl LoadDescriptor for HudDescriptor {
//!     fn loader_kind(&self) -> LoaderKind { HUD }
//! }
//!
//! struct HudLoader;
//!
//! #[async_trait]
//! impl Loader for HudLoader {
//!     fn kind(&self) -> LoaderKind { HUD }
//!     fn initialize(&mut self, _d: DescriptorRef) -> Result<(), LoaderError> { Ok(()) }
//!     async fn init_loaded_things(&mut self) -> Result<(), LoaderError> {
//!         println!("HUD ready");
//!         Ok(())
//!     }
//! }
//!
//! struct HudModule;
//! impl LoaderFactory for HudModule {
//!     fn kind(&self) -> LoaderKind { HUD }
//!     fn create(&self) -> LoaderBox { Box::new(HudLoader) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let modules: Vec<Arc<dyn LoaderFactory>> = vec![Arc::new(HudModule)];
//!     let visor = Loadvisor::builder(Config::default())
//!         .with_modules(modules)
//!         .build();
//!
//!     let mut cycles = visor.cycle_watcher();
//!     let cycle = visor.submit(visor.request().with(HudDescriptor))?;
//!
//!     let report = cycles.wait_for(cycle).await.expect("orchestrator alive");
//!     assert!(report.is_success());
//!
//!     visor.shutdown().await;
//!     Ok(())
//! }
//! ```
mod commands;
mod config;
mod core;
mod error;
mod events;
mod loading;
mod modules;
mod observers;

// ---- Public re-exports ----

pub use crate::core::{
    CycleReport, CycleState, CycleWatcher, Loadvisor, LoadvisorBuilder, Orchestrator,
    OrchestratorSnapshot, Registration,
};
pub use commands::Commands;
pub use config::Config;
pub use error::{ChannelError, LoadError, LoaderError, RequestError};
pub use events::{
    BusEvent, ChannelStats, EventBus, EventStream, Feed, FeedStream, LoadProgress, Subscription,
};
pub use loading::{
    DescriptorRef, LoadDescriptor, LoadRequest, LoadSettings, Loader, LoaderBox, LoaderKind,
    Phase,
};
pub use modules::LoaderFactory;
pub use observers::{Observe, ObserverSet};

// Optional: expose a simple built-in logger observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;
