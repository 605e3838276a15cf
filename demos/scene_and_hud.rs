//! # Example: Scene and HUD
//!
//! Two independent modules (a scene loader and a HUD) answer one load request.
//! The built-in `LogWriter` prints progress; a second request with a broken HUD
//! shows how a failed cycle is reported and then retried.
//!
//! Run with: `RUST_LOG=info cargo run --example scene_and_hud --features logging`

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use loadvisor::{
    Config, DescriptorRef, LoadDescriptor, LoadRequest, Loader, LoaderBox, LoaderError,
    LoaderFactory, LoaderKind, Loadvisor, LogWriter, Observe,
};
use tracing_subscriber::EnvFilter;

const SCENE: LoaderKind = LoaderKind::from_static("scene");
const HUD: LoaderKind = LoaderKind::from_static("hud");

#[derive(Debug)]
struct SceneDescriptor(String);

impl LoadDescriptor for SceneDescriptor {
    fn loader_kind(&self) -> LoaderKind {
        SCENE
    }
}

#[derive(Debug)]
struct HudDescriptor {
    broken: bool,
}

impl LoadDescriptor for HudDescriptor {
    fn loader_kind(&self) -> LoaderKind {
        HUD
    }
}

/// Pretends to stream a scene from disk.
#[derive(Default)]
struct SceneLoader {
    name: String,
}

#[async_trait]
impl Loader for SceneLoader {
    fn kind(&self) -> LoaderKind {
        SCENE
    }

    fn initialize(&mut self, descriptor: DescriptorRef) -> Result<(), LoaderError> {
        let scene = descriptor
            .downcast_ref::<SceneDescriptor>()
            .ok_or_else(|| LoaderError::fail("expected a scene descriptor"))?;
        self.name = scene.0.clone();
        Ok(())
    }

    async fn load_scene(&mut self) -> Result<(), LoaderError> {
        println!("[scene] streaming '{}'", self.name);
        tokio::time::sleep(Duration::from_millis(150)).await;
        Ok(())
    }

    async fn load_resource(&mut self) -> Result<(), LoaderError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }

    async fn init_loaded_things(&mut self) -> Result<(), LoaderError> {
        println!("[scene] '{}' ready", self.name);
        Ok(())
    }
}

#[derive(Default)]
struct HudLoader {
    broken: bool,
}

#[async_trait]
impl Loader for HudLoader {
    fn kind(&self) -> LoaderKind {
        HUD
    }

    fn initialize(&mut self, descriptor: DescriptorRef) -> Result<(), LoaderError> {
        let hud = descriptor
            .downcast_ref::<HudDescriptor>()
            .ok_or_else(|| LoaderError::fail("expected a hud descriptor"))?;
        self.broken = hud.broken;
        Ok(())
    }

    async fn load_prefab(&mut self) -> Result<(), LoaderError> {
        if self.broken {
            return Err(LoaderError::fail("hud prefab not found"));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    async fn instantiate_prefab(&mut self) -> Result<(), LoaderError> {
        println!("[hud] widgets spawned");
        Ok(())
    }
}

struct SceneModule;

impl LoaderFactory for SceneModule {
    fn kind(&self) -> LoaderKind {
        SCENE
    }

    fn create(&self) -> LoaderBox {
        Box::new(SceneLoader::default())
    }

    fn name(&self) -> &'static str {
        "scene-module"
    }
}

struct HudModule;

impl LoaderFactory for HudModule {
    fn kind(&self) -> LoaderKind {
        HUD
    }

    fn create(&self) -> LoaderBox {
        Box::new(HudLoader::default())
    }

    fn name(&self) -> &'static str {
        "hud-module"
    }
}

fn level(name: &str, broken_hud: bool, base: LoadRequest) -> LoadRequest {
    base.with(SceneDescriptor(name.to_string()))
        .with(HudDescriptor { broken: broken_hud })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut cfg = Config::default();
    cfg.max_wait = Duration::from_secs(5);
    cfg.phase_timeout = Duration::from_secs(2);

    let modules: Vec<Arc<dyn LoaderFactory>> = vec![Arc::new(SceneModule), Arc::new(HudModule)];
    let observers: Vec<Arc<dyn Observe>> = vec![Arc::new(LogWriter)];
    let visor = Loadvisor::builder(cfg)
        .with_modules(modules)
        .with_observers(observers)
        .build();
    let mut cycles = visor.cycle_watcher();

    let first = visor.submit(level("Level1", false, visor.request()))?;
    let report = cycles
        .wait_for(first)
        .await
        .ok_or_else(|| anyhow::anyhow!("orchestrator gone"))?;
    println!("cycle {} success={}", report.cycle, report.is_success());

    let second = visor.submit(level("Level2", true, visor.request()))?;
    let report = cycles
        .wait_for(second)
        .await
        .ok_or_else(|| anyhow::anyhow!("orchestrator gone"))?;
    if let Err(err) = &report.outcome {
        println!("cycle {} failed: {err}", report.cycle);
    }

    let third = visor.submit(level("Level2", false, visor.request()))?;
    let report = cycles
        .wait_for(third)
        .await
        .ok_or_else(|| anyhow::anyhow!("orchestrator gone"))?;
    println!("cycle {} success={}", report.cycle, report.is_success());

    visor.shutdown().await;
    Ok(())
}
