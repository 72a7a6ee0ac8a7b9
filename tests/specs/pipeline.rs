// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline specs
//!
//! Wire discovery, build, scheduling and state persistence together by hand,
//! with short intervals, and follow job files through their lifecycle.

use crate::prelude::*;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wd_adapters::{FileLockRegistry, VnodeRegistry};
use wd_core::{Config, ConfigError};
use wd_discovery::{DiscoveryManager, FileWatcher};
use wd_engine::{
    BuildManager, Creator, JobInfo, Metrics, MetricsSink, Module, ModuleError, ModuleJobFactory,
    ModuleRegistry, RunManager,
};
use wd_storage::StateManager;

/// Answers checks according to its `up` key and reports one gauge.
struct Probe {
    up: bool,
}

fn create_probe(cfg: &Config) -> Result<Box<dyn Module>, ConfigError> {
    let up = cfg.get("up").and_then(|v| v.as_bool()).unwrap_or(true);
    Ok(Box::new(Probe { up }))
}

impl Module for Probe {
    fn check(&mut self) -> Result<(), ModuleError> {
        if self.up {
            Ok(())
        } else {
            Err(ModuleError::Check("down".into()))
        }
    }

    fn collect(&mut self) -> Result<Metrics, ModuleError> {
        Ok(Metrics::from([("up".to_string(), 1)]))
    }
}

#[derive(Default)]
struct RecordingSink {
    collected: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn collected_from(&self, full_name: &str) -> bool {
        self.collected.lock().unwrap().iter().any(|n| n == full_name)
    }
}

impl MetricsSink for RecordingSink {
    fn write(&self, job: &JobInfo, _clock: u64, _metrics: &Metrics) {
        self.collected.lock().unwrap().push(job.full_name.clone());
    }
}

struct Pipeline {
    runner: Arc<RunManager>,
    sink: Arc<RecordingSink>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Pipeline {
    fn start(project: &Project) -> Self {
        let mut modules = ModuleRegistry::new();
        modules.register("probe", Creator::new(create_probe));
        let defaults = modules.defaults();

        let sink = Arc::new(RecordingSink::default());
        let runner = Arc::new(RunManager::new().with_tick_interval(Duration::from_millis(100)));
        let state = Arc::new(
            StateManager::new(project.state_path()).with_flush_interval(Duration::from_millis(100)),
        );
        let factory = ModuleJobFactory::new(modules, VnodeRegistry::new(), sink.clone());
        let build = BuildManager::new(Arc::new(factory), runner.clone())
            .with_registry(Arc::new(FileLockRegistry::new(project.lock_dir())))
            .with_saver(state.clone());
        let watcher = FileWatcher::new(vec![project.jobs_pattern()], defaults)
            .with_rescan_every(Duration::from_millis(200));
        let discovery = DiscoveryManager::new()
            .with_discoverer(Arc::new(watcher))
            .with_send_every(Duration::from_millis(100));

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        let tasks = vec![
            tokio::spawn({
                let (state, cancel) = (state.clone(), cancel.clone());
                async move { state.run(cancel).await }
            }),
            tokio::spawn({
                let (runner, cancel) = (runner.clone(), cancel.clone());
                async move { runner.run(cancel).await }
            }),
            tokio::spawn(build.run(cancel.clone(), rx)),
            tokio::spawn(discovery.run(cancel.clone(), tx)),
        ];
        Self { runner, sink, cancel, tasks }
    }

    async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            task.await.unwrap();
        }
        self.runner.cleanup().await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn job_file_lifecycle_is_followed_end_to_end() {
    let project = Project::empty();
    let pipeline = Pipeline::start(&project);

    project.file(
        "jobs/probe.toml",
        "[[jobs]]\nname = \"a\"\n\n[[jobs]]\nname = \"b\"\n\n[[jobs]]\nname = \"c\"\nup = false\n",
    );

    let sink = pipeline.sink.clone();
    let collecting = wait_for(SPEC_WAIT_MAX_MS, || {
        sink.collected_from("probe_a") && sink.collected_from("probe_b")
    })
    .await;
    assert!(collecting, "both healthy jobs should collect");
    let recorded = wait_for(SPEC_WAIT_MAX_MS, || {
        let states = project.states();
        states["probe"]["a"] == "success" && states["probe"]["c"] == "failed"
    })
    .await;
    assert!(recorded, "states should be flushed: {}", project.states());
    assert!(!sink.collected_from("probe_c"));

    // Dropping a job from the file stops it and forgets its state.
    project.file("jobs/probe.toml", "[[jobs]]\nname = \"a\"\n");
    let runner = pipeline.runner.clone();
    let stopped = wait_for(SPEC_WAIT_MAX_MS, || runner.running() == vec!["probe_a"]).await;
    assert!(stopped, "only probe_a should keep running: {:?}", runner.running());
    let forgotten = wait_for(SPEC_WAIT_MAX_MS, || {
        let states = project.states();
        states["probe"]["b"].is_null() && states["probe"]["c"].is_null()
    })
    .await;
    assert!(forgotten, "removed jobs should leave the state file: {}", project.states());

    // Deleting the file withdraws the rest.
    project.remove("jobs/probe.toml");
    let drained = wait_for(SPEC_WAIT_MAX_MS, || runner.is_empty()).await;
    assert!(drained, "nothing should run once the file is gone");

    pipeline.stop().await;
    similar_asserts::assert_eq!(project.states(), serde_json::json!({}));
}

#[tokio::test(flavor = "multi_thread")]
async fn two_pipelines_sharing_locks_run_each_job_once() {
    let project = Project::empty();
    project.file("jobs/probe.toml", "[[jobs]]\nname = \"solo\"\n");

    let first = Pipeline::start(&project);
    let runner = first.runner.clone();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || !runner.is_empty()).await);

    let other = Project::empty();
    let second = {
        // Same job files and lock dir, separate state file.
        let mut modules = ModuleRegistry::new();
        modules.register("probe", Creator::new(create_probe));
        let defaults = modules.defaults();
        let runner = Arc::new(RunManager::new());
        let state = Arc::new(StateManager::new(other.state_path()));
        let build = BuildManager::new(
            Arc::new(ModuleJobFactory::new(modules, VnodeRegistry::new(), Arc::new(RecordingSink::default()))),
            runner.clone(),
        )
        .with_registry(Arc::new(FileLockRegistry::new(project.lock_dir())))
        .with_saver(state.clone());
        let discovery = DiscoveryManager::new()
            .with_discoverer(Arc::new(FileWatcher::new(vec![project.jobs_pattern()], defaults)));
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        let build_task = tokio::spawn(build.run(cancel.clone(), rx));
        let discovery_task = tokio::spawn(discovery.run(cancel.clone(), tx));
        (runner, state, cancel, build_task, discovery_task)
    };
    let (second_runner, second_state, second_cancel, build_task, discovery_task) = second;

    let classified = wait_for(SPEC_WAIT_MAX_MS, || {
        second_state.lookup(&probe_config("solo")) == Some(wd_core::JobState::DuplicateGlobal)
    })
    .await;
    assert!(classified, "second pipeline should see the job held elsewhere");
    assert!(second_runner.is_empty());
    assert_eq!(runner.running(), vec!["probe_solo"]);

    second_cancel.cancel();
    build_task.await.unwrap();
    discovery_task.await.unwrap();
    first.stop().await;
}

fn probe_config(name: &str) -> Config {
    let mut cfg = Config::new();
    cfg.set_module("probe");
    cfg.set("name", name);
    cfg
}
