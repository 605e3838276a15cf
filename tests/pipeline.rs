use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use loadvisor::{
    ChannelError, Config, DescriptorRef, LoadDescriptor, LoadError, LoadProgress, LoadRequest,
    Loader, LoaderBox, LoaderError, LoaderFactory, LoaderKind, Loadvisor, Observe, Phase,
};
use parking_lot::Mutex;

const SCENE: LoaderKind = LoaderKind::from_static("scene");
const PROGRESS_BAR: LoaderKind = LoaderKind::from_static("progress-bar");

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
struct SceneDescriptor(&'static str);

impl LoadDescriptor for SceneDescriptor {
    fn loader_kind(&self) -> LoaderKind {
        SCENE
    }
}

#[derive(Debug, Default)]
struct ProgressBarDescriptor {
    broken_at: Option<Phase>,
}

impl LoadDescriptor for ProgressBarDescriptor {
    fn loader_kind(&self) -> LoaderKind {
        PROGRESS_BAR
    }
}

struct SceneLoader {
    journal: Journal,
    scene: Option<&'static str>,
}

#[async_trait]
impl Loader for SceneLoader {
    fn kind(&self) -> LoaderKind {
        SCENE
    }

    fn initialize(&mut self, descriptor: DescriptorRef) -> Result<(), LoaderError> {
        let scene = descriptor
            .downcast_ref::<SceneDescriptor>()
            .ok_or_else(|| LoaderError::fail("not a scene descriptor"))?;
        self.scene = Some(scene.0);
        Ok(())
    }

    async fn run_phase(&mut self, phase: Phase) -> Result<(), LoaderError> {
        let scene = self.scene.unwrap_or("?");
        self.journal.lock().push(format!("{}:{scene}", phase.as_label()));
        Ok(())
    }
}

struct ProgressBarLoader {
    journal: Journal,
    broken_at: Option<Phase>,
}

#[async_trait]
impl Loader for ProgressBarLoader {
    fn kind(&self) -> LoaderKind {
        PROGRESS_BAR
    }

    fn initialize(&mut self, descriptor: DescriptorRef) -> Result<(), LoaderError> {
        let bar = descriptor
            .downcast_ref::<ProgressBarDescriptor>()
            .ok_or_else(|| LoaderError::fail("not a progress bar descriptor"))?;
        self.broken_at = bar.broken_at;
        Ok(())
    }

    async fn run_phase(&mut self, phase: Phase) -> Result<(), LoaderError> {
        self.journal.lock().push(format!("{}:bar", phase.as_label()));
        if self.broken_at == Some(phase) {
            return Err(LoaderError::fail("progress bar prefab missing"));
        }
        Ok(())
    }
}

struct SceneModule(Journal);

impl LoaderFactory for SceneModule {
    fn kind(&self) -> LoaderKind {
        SCENE
    }

    fn create(&self) -> LoaderBox {
        Box::new(SceneLoader {
            journal: Arc::clone(&self.0),
            scene: None,
        })
    }
}

struct ProgressBarModule(Journal);

impl LoaderFactory for ProgressBarModule {
    fn kind(&self) -> LoaderKind {
        PROGRESS_BAR
    }

    fn create(&self) -> LoaderBox {
        Box::new(ProgressBarLoader {
            journal: Arc::clone(&self.0),
            broken_at: None,
        })
    }
}

#[derive(Default)]
struct Hud {
    log: Mutex<Vec<String>>,
}

#[async_trait]
impl Observe for Hud {
    async fn on_progress(&self, p: &LoadProgress) {
        self.log.lock().push(format!("show {}/{} {}", p.step, p.total, p.message()));
    }

    async fn on_finished(&self) {
        self.log.lock().push("hide: done".into());
    }

    async fn on_failed(&self, error: &ChannelError) {
        let label = error
            .downcast_ref::<LoadError>()
            .map_or("unknown", |e| e.as_label());
        self.log.lock().push(format!("hide: {label}"));
    }

    fn name(&self) -> &'static str {
        "hud"
    }
}

fn system(journal: &Journal, hud: &Arc<Hud>) -> Arc<Loadvisor> {
    let modules: Vec<Arc<dyn LoaderFactory>> = vec![
        Arc::new(SceneModule(Arc::clone(journal))),
        Arc::new(ProgressBarModule(Arc::clone(journal))),
    ];
    let observers: Vec<Arc<dyn Observe>> = vec![hud.clone()];
    Loadvisor::builder(Config::default())
        .with_modules(modules)
        .with_observers(observers)
        .build()
}

fn level1(bar: ProgressBarDescriptor) -> LoadRequest {
    LoadRequest::new().with(SceneDescriptor("Level1")).with(bar)
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn scene_and_progress_bar_load_end_to_end() {
    let journal = Journal::default();
    let hud = Arc::new(Hud::default());
    let visor = system(&journal, &hud);

    let (progress, _p) = visor.bus().subscribe::<LoadProgress>();
    let cycle = visor
        .submit(level1(ProgressBarDescriptor::default()))
        .expect("accepted");
    assert_eq!(cycle, 1);
    // Opened after the broadcast: only the final completion reaches it.
    let (requests, _r) = visor.bus().subscribe::<LoadRequest>();

    let messages: Vec<_> = progress
        .map(|p| p.expect("progress").message())
        .collect()
        .await;
    assert_eq!(
        messages,
        [
            "Loading Scenes…",
            "Reading Resources…",
            "Loading Prefabs…",
            "Instantiating Prefabs…",
            "Initializing…",
        ]
    );
    assert_eq!(requests.count().await, 0);

    let report = visor.cycle_watcher().wait_for(cycle).await.expect("report");
    assert!(report.is_success());
    assert!(visor.orchestrator().snapshot().is_empty());

    // Which module registers first is not fixed; phases still never interleave.
    let journal = journal.lock().clone();
    assert_eq!(journal.len(), 10);
    for (pair, phase) in journal.chunks(2).zip(Phase::ALL) {
        let mut pair = pair.to_vec();
        pair.sort();
        let label = phase.as_label();
        assert_eq!(pair, [format!("{label}:Level1"), format!("{label}:bar")]);
    }

    eventually(|| hud.log.lock().last().is_some_and(|l| l == "hide: done")).await;
    assert_eq!(hud.log.lock()[0], "show 1/5 Loading Scenes…");
    assert_eq!(hud.log.lock().len(), 6);

    visor.shutdown().await;
}

#[tokio::test]
async fn failed_cycle_stops_both_channels_and_a_retry_succeeds() {
    let journal = Journal::default();
    let hud = Arc::new(Hud::default());
    let visor = system(&journal, &hud);
    let mut cycles = visor.cycle_watcher();

    let (progress, _p) = visor.bus().subscribe::<LoadProgress>();
    visor
        .submit(level1(ProgressBarDescriptor {
            broken_at: Some(Phase::Prefab),
        }))
        .expect("accepted");
    let (mut requests, _r) = visor.bus().subscribe::<LoadRequest>();

    let items: Vec<_> = progress.collect().await;
    assert_eq!(items.len(), 4);
    assert!(items[..3].iter().all(Result::is_ok));
    let err = items[3].as_ref().expect_err("error-stop");
    assert!(matches!(
        err.downcast_ref::<LoadError>(),
        Some(LoadError::PhaseFailed {
            phase: Phase::Prefab,
            ..
        })
    ));
    assert!(requests.next().await.expect("signal").is_err());
    assert!(requests.next().await.is_none());

    let report = cycles.finished().await.expect("report");
    assert_eq!(report.cycle, 1);
    assert!(!report.is_success());
    assert!(visor.orchestrator().is_idle());
    eventually(|| hud.log.lock().last().is_some_and(|l| l == "hide: load_phase_failed")).await;

    let retry = visor
        .submit(level1(ProgressBarDescriptor::default()))
        .expect("accepted");
    assert_eq!(retry, 2);
    let report = cycles.wait_for(retry).await.expect("report");
    assert!(report.is_success());

    visor.shutdown().await;
}

#[tokio::test]
async fn request_appended_to_the_open_cycle_reaches_its_module() {
    let journal = Journal::default();
    let hud = Arc::new(Hud::default());
    let visor = system(&journal, &hud);
    let mut cycles = visor.cycle_watcher();

    let scene = visor
        .submit(LoadRequest::new().with(SceneDescriptor("Level1")))
        .expect("accepted");
    let bar = visor
        .submit(LoadRequest::new().with(ProgressBarDescriptor::default()))
        .expect("appended");
    assert_eq!((scene, bar), (1, 1));

    let report = cycles.wait_for(1).await.expect("report");
    assert!(report.is_success(), "unexpected outcome: {:?}", report.outcome);
    assert_eq!(journal.lock().len(), 10);

    visor.shutdown().await;
}

#[tokio::test]
async fn back_to_back_cycles_are_fully_observed() {
    let journal = Journal::default();
    let hud = Arc::new(Hud::default());
    let visor = system(&journal, &hud);
    let mut cycles = visor.cycle_watcher();

    for expected in 1..=2 {
        let cycle = visor
            .submit(level1(ProgressBarDescriptor::default()))
            .expect("accepted");
        assert_eq!(cycle, expected);
        assert!(cycles.wait_for(cycle).await.expect("report").is_success());
    }

    eventually(|| hud.log.lock().len() == 12).await;
    let log = hud.log.lock().clone();
    for cycle in log.chunks(6) {
        assert_eq!(cycle.iter().filter(|l| l.starts_with("show ")).count(), 5);
        assert_eq!(cycle[0], "show 1/5 Loading Scenes…");
        assert_eq!(cycle[5], "hide: done");
    }

    visor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retry_right_after_a_failure_report_is_always_served() {
    let journal = Journal::default();
    let hud = Arc::new(Hud::default());
    let visor = system(&journal, &hud);
    let mut cycles = visor.cycle_watcher();

    for round in 0..50 {
        let broken = visor
            .submit(level1(ProgressBarDescriptor {
                broken_at: Some(Phase::Resource),
            }))
            .expect("accepted");
        let report = cycles.wait_for(broken).await.expect("report");
        assert!(!report.is_success(), "round {round}: broken cycle succeeded");

        let retry = visor
            .submit(level1(ProgressBarDescriptor::default()))
            .expect("accepted");
        let report = tokio::time::timeout(Duration::from_secs(2), cycles.wait_for(retry))
            .await
            .expect("retry cycle never finished")
            .expect("report");
        assert_eq!(report.cycle, retry);
        assert!(report.is_success(), "round {round}: {:?}", report.outcome);
    }

    visor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn missing_module_times_out_the_cycle() {
    let journal = Journal::default();
    let hud = Arc::new(Hud::default());
    let visor = system(&journal, &hud);
    let mut cycles = visor.cycle_watcher();

    #[derive(Debug)]
    struct Audio;
    impl LoadDescriptor for Audio {
        fn loader_kind(&self) -> LoaderKind {
            LoaderKind::from_static("audio")
        }
    }

    let request = LoadRequest::new()
        .with(SceneDescriptor("Level2"))
        .with(Audio)
        .with_max_wait(Duration::from_secs(2));
    visor.submit(request).expect("accepted");

    let report = cycles.finished().await.expect("report");
    match report.outcome {
        Err(LoadError::RegistrationTimeout { missing, .. }) => {
            assert_eq!(missing, [LoaderKind::from_static("audio")]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(journal.lock().is_empty());

    visor.shutdown().await;
}

#[tokio::test]
async fn rejected_requests_are_not_broadcast() {
    let journal = Journal::default();
    let hud = Arc::new(Hud::default());
    let visor = system(&journal, &hud);

    assert!(visor.submit(LoadRequest::new()).is_err());
    assert!(visor.orchestrator().is_idle());
    assert_eq!(visor.orchestrator().snapshot().cycle, 0);

    visor.shutdown().await;
}

#[tokio::test]
async fn shutdown_fails_the_open_cycle_and_ends_all_streams() {
    let journal = Journal::default();
    let hud = Arc::new(Hud::default());
    let visor = system(&journal, &hud);
    let mut cycles = visor.cycle_watcher();

    // No module serves this kind, so the cycle stays open until shutdown.
    #[derive(Debug)]
    struct Audio;
    impl LoadDescriptor for Audio {
        fn loader_kind(&self) -> LoaderKind {
            LoaderKind::from_static("audio")
        }
    }
    visor
        .submit(visor.request().with(Audio).with_max_wait(Duration::ZERO))
        .expect("accepted");

    let (stray, _s) = visor.bus().subscribe::<u32>();
    visor.shutdown().await;

    let report = cycles.finished().await.expect("report");
    assert!(matches!(report.outcome, Err(LoadError::Shutdown { cycle: 1 })));
    assert_eq!(stray.count().await, 0);
    assert_eq!(visor.bus().channel_count(), 0);

    // Idempotent.
    visor.shutdown().await;
}
