// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End to end launcher behaviour against real `/bin/sh` children.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use warplaunch::plan::{HY2_PORT_VAR, REALITY_PORT_VAR};
use warplaunch::{
    ChildProcessResult, ChildProcessSpec, Environment, IoMode, LaunchPlan, Launcher, Reporter,
};

/// Variables a shell may export on its own even when started with nothing
const SHELL_INJECTED: &[&str] = &["PWD", "OLDPWD", "SHLVL", "_", "PATH"];

const MISSING_DIR: &str = "/this/directory/does/not/exist";

#[derive(Default)]
struct Recorder {
    started: Mutex<Vec<(String, Instant)>>,
    completed: Mutex<Vec<(String, ChildProcessResult)>>,
}

impl Recorder {
    fn started_commands(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    fn take_completed(&self) -> Vec<(String, ChildProcessResult)> {
        std::mem::take(&mut *self.completed.lock().unwrap())
    }
}

#[async_trait]
impl Reporter for Recorder {
    fn started(&self, spec: &ChildProcessSpec, _pid: Option<u32>) {
        self.started
            .lock()
            .unwrap()
            .push((spec.command().to_string(), Instant::now()));
    }

    async fn background_completed(&self, spec: &ChildProcessSpec, result: ChildProcessResult) {
        self.completed
            .lock()
            .unwrap()
            .push((spec.command().to_string(), result));
    }
}

fn launcher() -> (Arc<Recorder>, Launcher) {
    let recorder = Arc::new(Recorder::default());
    let launcher = Launcher::new(recorder.clone());
    (recorder, launcher)
}

fn background(command: &str) -> ChildProcessSpec {
    ChildProcessSpec::new(command, Environment::empty(), IoMode::Captured)
}

fn foreground(command: &str) -> ChildProcessSpec {
    ChildProcessSpec::new(command, Environment::empty(), IoMode::Inherit)
}

fn standard_foreground_env() -> Environment {
    LaunchPlan::standard().specs()[1].environment().clone()
}

fn env_names(dump: &str) -> BTreeSet<String> {
    dump.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(name, _)| name.to_string())
        .collect()
}

#[tokio::test]
async fn background_is_launched_before_foreground() {
    let (recorder, launcher) = launcher();
    let plan = LaunchPlan::new(background("true"), foreground("true"));

    launcher.execute(&plan).await.expect("launch failed");

    let started = recorder.started.lock().unwrap().clone();
    assert_eq!(
        started.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>(),
        vec!["true", "true"]
    );
    assert!(started[0].1 <= started[1].1);
}

#[tokio::test]
async fn background_non_zero_exit_does_not_fail_the_launch() {
    let (recorder, launcher) = launcher();
    let plan = LaunchPlan::new(
        background("echo registered; echo 'curl: timeout' >&2; exit 1"),
        foreground("exit 0"),
    );

    let report = launcher.execute(&plan).await.expect("launch should succeed");
    assert_eq!(report.background.len(), 1);
    assert_eq!(report.foreground.len(), 1);
    assert!(report.foreground[0].is_success());

    launcher.drain_background().await;
    let completed = recorder.take_completed();
    assert_eq!(completed.len(), 1);

    let result = &completed[0].1;
    let err = result.exit_error.as_ref().expect("background should have failed");
    assert!(err.is_non_zero_exit());
    assert_eq!(err.exit_code(), 1);
    assert_eq!(result.standard_output.as_deref(), Some("registered\n"));
    assert_eq!(result.standard_error.as_deref(), Some("curl: timeout\n"));
}

#[tokio::test]
async fn background_spawn_failure_is_reported_not_raised() {
    let (recorder, launcher) = launcher();
    let plan = LaunchPlan::new(
        background("true").with_current_dir(MISSING_DIR),
        foreground("exit 0"),
    );

    let report = launcher.execute(&plan).await.expect("launch should succeed");
    assert_eq!(report.background[0].pid(), None);

    launcher.drain_background().await;
    let completed = recorder.take_completed();
    assert_eq!(completed.len(), 1);
    let err = completed[0].1.exit_error.as_ref().expect("expected a spawn failure");
    assert!(err.is_spawn_failure());

    // only the foreground child was ever started
    assert_eq!(recorder.started_commands(), vec!["exit 0"]);
}

#[tokio::test]
async fn foreground_non_zero_exit_is_the_launch_failure() {
    let (_recorder, launcher) = launcher();
    let plan = LaunchPlan::new(background("exit 0"), foreground("exit 1"));

    let err = launcher.execute(&plan).await.expect_err("launch should fail");
    assert!(err.is_non_zero_exit());
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn foreground_failure_is_independent_of_background_outcome() {
    for warp in &["exit 0", "exit 1", "exit 7"] {
        let (_recorder, launcher) = launcher();
        let plan = LaunchPlan::new(background(warp), foreground("exit 1"));

        let err = launcher.execute(&plan).await.expect_err("launch should fail");
        assert!(err.is_non_zero_exit(), "background `{}`", warp);
        assert_eq!(err.exit_code(), 1);
    }
}

#[tokio::test]
async fn foreground_failure_halts_remaining_steps() {
    let (recorder, launcher) = launcher();
    let plan = LaunchPlan::new(foreground("exit 4"), background("true"));

    let err = launcher.execute(&plan).await.expect_err("launch should fail");
    assert_eq!(err.exit_code(), 4);
    assert_eq!(recorder.started_commands(), vec!["exit 4"]);

    launcher.drain_background().await;
    assert!(recorder.take_completed().is_empty());
}

#[tokio::test]
async fn foreground_spawn_failure_halts_remaining_steps() {
    let (recorder, launcher) = launcher();
    let plan = LaunchPlan::new(
        foreground("true").with_current_dir(MISSING_DIR),
        background("true"),
    );

    let err = launcher.execute(&plan).await.expect_err("launch should fail");
    assert!(err.is_spawn_failure());
    assert_eq!(err.exit_code(), warplaunch::SPAWN_FAILURE_EXIT_CODE);
    assert!(recorder.started_commands().is_empty());
}

#[tokio::test]
async fn background_is_not_waited_for() {
    let (recorder, launcher) = launcher();
    let plan = LaunchPlan::new(background("sleep 5"), foreground("exit 0"));

    let start = Instant::now();
    let report = launcher.execute(&plan).await.expect("launch failed");

    assert!(start.elapsed() < Duration::from_secs(4));
    assert!(report.background[0].pid().is_some());
    assert!(recorder.take_completed().is_empty());

    for handle in report.background {
        handle.detach();
    }
}

#[tokio::test]
async fn foreground_receives_only_the_port_variables() {
    let dir = tempfile::tempdir().unwrap();
    let (_recorder, launcher) = launcher();
    let start = ChildProcessSpec::new("env > env.out", standard_foreground_env(), IoMode::Inherit)
        .with_current_dir(dir.path());
    let plan = LaunchPlan::new(background("true"), start);

    launcher.execute(&plan).await.expect("launch failed");

    let dump = std::fs::read_to_string(dir.path().join("env.out")).unwrap();
    assert!(dump.lines().any(|l| l == "REALITY_PORT=20143"));
    assert!(dump.lines().any(|l| l == "HY2_PORT=20143"));

    let names = env_names(&dump);
    for name in &names {
        let expected = name == REALITY_PORT_VAR || name == HY2_PORT_VAR;
        assert!(
            expected || SHELL_INJECTED.contains(&name.as_str()),
            "unexpected variable in foreground env: {}",
            name
        );
    }
}

#[tokio::test]
async fn background_receives_an_empty_environment() {
    let (recorder, launcher) = launcher();
    let warp = LaunchPlan::standard().specs()[0].clone();
    assert_eq!(warp.environment(), &Environment::empty());

    let dump_env = ChildProcessSpec::new("env", warp.environment().clone(), warp.io_mode());
    let plan = LaunchPlan::new(dump_env, foreground("true"));

    launcher.execute(&plan).await.expect("launch failed");
    launcher.drain_background().await;

    let completed = recorder.take_completed();
    let result = &completed[0].1;
    assert!(result.is_success());

    let names = env_names(result.standard_output.as_deref().unwrap_or_default());
    for name in &names {
        assert!(
            SHELL_INJECTED.contains(&name.as_str()),
            "unexpected variable in background env: {}",
            name
        );
    }
}

#[tokio::test]
async fn inherit_environment_passes_launcher_variables_through() {
    let leaked = match std::env::vars().find(|(name, value)| {
        !SHELL_INJECTED.contains(&name.as_str()) && !value.contains('\n')
    }) {
        Some(var) => var,
        // nothing to observe in an empty environment
        None => return,
    };

    let (recorder, launcher) = launcher();
    let dump_env = ChildProcessSpec::new("env", Environment::Inherit, IoMode::Captured);
    let plan = LaunchPlan::new(dump_env, foreground("true"));

    launcher.execute(&plan).await.expect("launch failed");
    launcher.drain_background().await;

    let completed = recorder.take_completed();
    let dump = completed[0].1.standard_output.clone().unwrap_or_default();
    assert!(dump.lines().any(|l| l == format!("{}={}", leaked.0, leaked.1)));
}

#[tokio::test]
async fn captured_output_is_truncated_at_the_limit() {
    let recorder = Arc::new(Recorder::default());
    let launcher = Launcher::new(recorder.clone()).with_capture_limit(4);

    let handle = launcher.run_background(background("printf 0123456789; printf abcdefgh >&2"));
    assert_eq!(handle.command(), "printf 0123456789; printf abcdefgh >&2");
    handle.detach();

    launcher.drain_background().await;
    let completed = recorder.take_completed();
    let result = &completed[0].1;
    assert_eq!(result.standard_output.as_deref(), Some("0123"));
    assert_eq!(result.standard_error.as_deref(), Some("abcd"));
}

#[tokio::test]
async fn standard_plan_fails_without_the_start_script() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, launcher) = launcher();
    let standard = LaunchPlan::standard();
    let plan = LaunchPlan::new(
        standard.specs()[0].clone().with_current_dir(dir.path()),
        standard.specs()[1].clone().with_current_dir(dir.path()),
    );

    // neither warp.sh nor start.sh exist here, bash reports that as a failed exit
    let err = launcher.execute(&plan).await.expect_err("launch should fail");
    assert!(err.is_non_zero_exit());
    assert_eq!(recorder.started_commands(), vec!["bash warp.sh", "bash start.sh"]);
}
