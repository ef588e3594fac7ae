//! Pipeline state machine tests against a scripted process host

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use upd_errors::{Error, PluginError};
use upd_events::{channel, StreamEvent};
use upd_metrics::MetricsAccumulator;
use upd_plugin::{NullSampler, PhaseProcess, PluginCommand, ProcessHost};
use upd_pipeline::{Pipeline, PipelineConfig, PipelineContext};
use upd_resources::ResourceRegistry;
use upd_types::{Phase, PhaseSet, PhaseStatus, PipelineState, PluginDescriptor};

/// What the scripted host should do when asked to run one command.
#[derive(Clone)]
enum Script {
    /// Emit these events, then end the stream.
    Events(Vec<StreamEvent>),
    /// Emit these events, then block until terminated.
    Hang(Vec<StreamEvent>),
    /// Fail the spawn itself.
    SpawnError,
}

struct ScriptedProcess {
    events: VecDeque<StreamEvent>,
    hang: bool,
    terminated: Arc<AtomicBool>,
}

#[async_trait]
impl PhaseProcess for ScriptedProcess {
    fn pid(&self) -> Option<u32> {
        None
    }

    async fn next_event(&mut self) -> Option<StreamEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        None
    }

    async fn terminate(&mut self, _grace: Duration) -> Result<(), Error> {
        self.terminated.store(true, Ordering::SeqCst);
        self.hang = false;
        self.events.clear();
        Ok(())
    }
}

/// Host that replays a script per command and records every spawn.
struct ScriptedHost {
    scripts: HashMap<&'static str, Script>,
    spawned: Mutex<Vec<PluginCommand>>,
    terminated: Arc<AtomicBool>,
}

impl ScriptedHost {
    fn new(scripts: impl IntoIterator<Item = (&'static str, Script)>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
            spawned: Mutex::new(Vec::new()),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    fn spawned(&self) -> Vec<PluginCommand> {
        self.spawned.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessHost for ScriptedHost {
    async fn spawn(
        &self,
        plugin: &PluginDescriptor,
        command: PluginCommand,
    ) -> Result<Box<dyn PhaseProcess>, Error> {
        self.spawned.lock().unwrap().push(command);
        let key = command.args()[0];
        match self.scripts.get(key) {
            Some(Script::Events(events)) => Ok(Box::new(ScriptedProcess {
                events: events.clone().into(),
                hang: false,
                terminated: Arc::clone(&self.terminated),
            })),
            Some(Script::Hang(events)) => Ok(Box::new(ScriptedProcess {
                events: events.clone().into(),
                hang: true,
                terminated: Arc::clone(&self.terminated),
            })),
            Some(Script::SpawnError) | None => Err(PluginError::SpawnFailed {
                plugin: plugin.name.clone(),
                phase: key.to_string(),
                message: format!("no script for {key}"),
            }
            .into()),
        }
    }
}

fn exits(code: i32) -> Script {
    Script::Events(vec![StreamEvent::Exit { code }])
}

fn context(host: ScriptedHost) -> (PipelineContext, Arc<ScriptedHost>) {
    let host = Arc::new(host);
    let ctx = PipelineContext {
        registry: Arc::new(ResourceRegistry::new()),
        host: Arc::clone(&host) as Arc<dyn ProcessHost>,
        sampler: Arc::new(NullSampler),
        config: PipelineConfig::default(),
    };
    (ctx, host)
}

fn pipeline(
    descriptor: PluginDescriptor,
) -> (Pipeline, upd_events::StreamReceiver, CancellationToken) {
    let (tx, rx) = channel(descriptor.name.clone(), 64);
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(
        descriptor,
        Arc::new(MetricsAccumulator::new()),
        tx,
        cancel.clone(),
    );
    (pipeline, rx, cancel)
}

#[tokio::test]
async fn all_phases_succeed() {
    let (ctx, host) = context(ScriptedHost::new([
        ("is-applicable", exits(0)),
        ("download", exits(0)),
        (
            "update",
            Script::Events(vec![
                StreamEvent::Output {
                    text: "upgrading 3 packages".into(),
                },
                StreamEvent::Exit { code: 0 },
            ]),
        ),
    ]));
    let descriptor = PluginDescriptor::new("apt").with_phases(PhaseSet::all());
    let (pipeline, mut rx, _cancel) = pipeline(descriptor);

    let report = pipeline.run(&ctx).await;

    assert_eq!(report.state, PipelineState::Completed);
    assert_eq!(report.failure, None);
    assert_eq!(report.outcomes.len(), 3);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == PhaseStatus::Success));
    assert_eq!(
        host.spawned(),
        vec![
            PluginCommand::IsApplicable,
            PluginCommand::Download,
            PluginCommand::Update { dry_run: false },
        ]
    );

    // The channel carries every forwarded event then closes.
    let mut saw_output = false;
    let mut completions = 0;
    while let Some(envelope) = rx.recv().await {
        match envelope.event {
            StreamEvent::Output { ref text } if text == "upgrading 3 packages" => {
                saw_output = true;
            }
            StreamEvent::PhaseComplete { success: true, .. } => completions += 1,
            _ => {}
        }
    }
    assert!(saw_output);
    assert_eq!(completions, 3);
}

#[tokio::test]
async fn check_exit_one_skips_remaining_phases() {
    let (ctx, host) = context(ScriptedHost::new([("is-applicable", exits(1))]));
    let descriptor = PluginDescriptor::new("cargo").with_phases(PhaseSet::all());
    let (pipeline, _rx, _cancel) = pipeline(descriptor);

    let report = pipeline.run(&ctx).await;

    assert_eq!(report.state, PipelineState::Skipped);
    assert_eq!(report.failure, None);
    assert_eq!(host.spawned(), vec![PluginCommand::IsApplicable]);
    assert_eq!(report.outcomes[0].status, PhaseStatus::Skipped);
    assert_eq!(report.outcomes[0].summary, "nothing to update");
}

#[tokio::test]
async fn execute_failure_reports_process_failure() {
    let (ctx, _host) = context(ScriptedHost::new([
        ("is-applicable", exits(0)),
        (
            "update",
            Script::Events(vec![
                StreamEvent::Error {
                    message: "repository unreachable".into(),
                },
                StreamEvent::Exit { code: 7 },
            ]),
        ),
    ]));
    let (pipeline, _rx, _cancel) = pipeline(PluginDescriptor::new("flatpak"));

    let report = pipeline.run(&ctx).await;

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.failure.as_deref(), Some("process failure"));
    let execute = report
        .outcomes
        .iter()
        .find(|o| o.phase == Phase::Execute)
        .unwrap();
    assert_eq!(execute.status, PhaseStatus::Failed);
    assert_eq!(execute.summary, "exit code 7");
    assert!(report
        .recent_output
        .iter()
        .any(|line| line.contains("repository unreachable")));
}

#[tokio::test]
async fn contended_resource_fails_without_spawning() {
    let (mut ctx, host) = context(ScriptedHost::new([("is-applicable", exits(0))]));
    ctx.config.acquire_timeout = Duration::from_millis(50);

    let descriptor =
        PluginDescriptor::new("apt").with_resources(Phase::Check, ["dpkg-lock"]);
    let blocker = ctx
        .registry
        .acquire("other", &["dpkg-lock".to_string()].into(), Duration::from_secs(1))
        .await
        .unwrap();

    let (pipeline, _rx, _cancel) = pipeline(descriptor);
    let report = pipeline.run(&ctx).await;
    drop(blocker);

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.failure.as_deref(), Some("resource contention"));
    assert!(host.spawned().is_empty(), "no subprocess may start");
}

#[tokio::test]
async fn cancellation_terminates_subprocess_and_releases_resources() {
    let (ctx, host) = context(ScriptedHost::new([
        ("is-applicable", exits(0)),
        (
            "update",
            Script::Hang(vec![StreamEvent::Output {
                text: "working".into(),
            }]),
        ),
    ]));
    let descriptor =
        PluginDescriptor::new("apt").with_resources(Phase::Execute, ["dpkg-lock"]);
    let (pipeline, mut rx, cancel) = pipeline(descriptor);

    let registry = Arc::clone(&ctx.registry);
    let runner = tokio::spawn(async move { pipeline.run(&ctx).await });

    // Wait for the execute subprocess's output to prove it is running.
    loop {
        let envelope = rx.recv().await.expect("channel closed early");
        if matches!(envelope.event, StreamEvent::Output { ref text } if text == "working") {
            break;
        }
    }
    cancel.cancel();

    let report = runner.await.unwrap();
    assert_eq!(report.state, PipelineState::Cancelled);
    assert!(host.terminated.load(Ordering::SeqCst));
    assert!(!registry.is_held("dpkg-lock"));
    // The channel closes after cancellation; recv drains then ends.
    while rx.recv().await.is_some() {}
    assert!(rx.is_closed());
}

#[tokio::test]
async fn dry_run_skips_execute_when_unsupported() {
    let (mut ctx, host) = context(ScriptedHost::new([("is-applicable", exits(0))]));
    ctx.config.dry_run = true;

    let (pipeline, _rx, _cancel) = pipeline(PluginDescriptor::new("apt"));
    let report = pipeline.run(&ctx).await;

    assert_eq!(report.state, PipelineState::Skipped);
    assert_eq!(host.spawned(), vec![PluginCommand::IsApplicable]);
    let execute = report
        .outcomes
        .iter()
        .find(|o| o.phase == Phase::Execute)
        .unwrap();
    assert_eq!(execute.status, PhaseStatus::Skipped);
    assert_eq!(execute.summary, "dry-run not supported");
}

#[tokio::test]
async fn dry_run_passes_flag_when_supported() {
    let (mut ctx, host) = context(ScriptedHost::new([
        ("is-applicable", exits(0)),
        ("update", exits(0)),
    ]));
    ctx.config.dry_run = true;

    let descriptor = PluginDescriptor::new("flatpak").with_dry_run_support();
    let (pipeline, _rx, _cancel) = pipeline(descriptor);
    let report = pipeline.run(&ctx).await;

    assert_eq!(report.state, PipelineState::Completed);
    assert!(host
        .spawned()
        .contains(&PluginCommand::Update { dry_run: true }));
}

#[tokio::test]
async fn unsupported_phases_pass_through() {
    let (ctx, host) = context(ScriptedHost::new([("update", exits(0))]));
    let descriptor = PluginDescriptor::new("firmware")
        .with_phases(PhaseSet::empty().with(Phase::Execute));
    let (pipeline, _rx, _cancel) = pipeline(descriptor);

    let report = pipeline.run(&ctx).await;

    assert_eq!(report.state, PipelineState::Completed);
    assert_eq!(host.spawned(), vec![PluginCommand::Update { dry_run: false }]);
    // Check and download appear as skipped outcomes, not as spawns.
    assert_eq!(
        report
            .outcomes
            .iter()
            .filter(|o| o.status == PhaseStatus::Skipped)
            .count(),
        2
    );
}

#[tokio::test]
async fn spawn_failure_fails_the_phase() {
    let (ctx, _host) = context(ScriptedHost::new([("is-applicable", Script::SpawnError)]));
    let (pipeline, _rx, _cancel) = pipeline(PluginDescriptor::new("ghost"));

    let report = pipeline.run(&ctx).await;

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.failure.as_deref(), Some("process failure"));
}
