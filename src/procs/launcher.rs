// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::mem;
use std::sync::{Arc, Mutex};

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::DEFAULT_CAPTURE_LIMIT;
use crate::plan::{ChildProcessSpec, IoMode, LaunchPlan};
use crate::procs::{background, foreground, BackgroundHandle, ChildProcessResult, Reporter};
use crate::Error;

/// Launch programs
///
/// Rules:
/// - background (captured) children are started and never waited on
/// - foreground (inherited) children are waited on, and their failure ends the run
/// - a background failure never becomes the launcher's failure
pub struct Launcher {
    reporter: Arc<dyn Reporter>,
    capture_limit: usize,
    pending_reports: Mutex<Vec<JoinHandle<()>>>,
}

/// How the teardown drain ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drained {
    /// Every background report was delivered
    Completed,
    /// SIGTERM, SIGINT or SIGHUP arrived first, undelivered reports were abandoned
    Interrupted,
}

/// What `execute` started
#[derive(Debug, Default)]
pub struct LaunchReport {
    pub background: Vec<BackgroundHandle>,
    pub foreground: Vec<ChildProcessResult>,
}

impl Launcher {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
            pending_reports: Mutex::new(Vec::new()),
        }
    }

    /// Maximum bytes retained per captured stream
    pub fn with_capture_limit(mut self, capture_limit: usize) -> Self {
        self.capture_limit = capture_limit;
        self
    }

    /// Start `spec` and return without waiting for it
    ///
    /// Failure to start, or an unsuccessful exit, is only ever seen by the reporter.
    pub fn run_background(&self, spec: ChildProcessSpec) -> BackgroundHandle {
        let (handle, report) =
            background::spawn(spec, Arc::clone(&self.reporter), self.capture_limit);

        match self.pending_reports.lock() {
            Ok(mut pending) => pending.push(report),
            // a poisoned list only costs the teardown drain, the report task still runs
            Err(_) => warn!("pending report list poisoned, background report will not be drained"),
        }

        handle
    }

    /// Start `spec` and wait for it to exit
    pub async fn run_foreground(
        &self,
        spec: &ChildProcessSpec,
    ) -> Result<ChildProcessResult, Error> {
        foreground::run(spec, self.reporter.as_ref()).await
    }

    /// Run every spec of `plan` in order
    ///
    /// Captured specs are started in the background and the walk moves straight on, inherited
    ///  specs are waited for. The first foreground failure stops the walk and is returned.
    pub async fn execute(&self, plan: &LaunchPlan) -> Result<LaunchReport, Error> {
        let mut report = LaunchReport::default();

        for spec in plan {
            match spec.io_mode() {
                IoMode::Captured => {
                    let handle = self.run_background(spec.clone());
                    report.background.push(handle);
                }
                IoMode::Inherit => {
                    let result = self.run_foreground(spec).await?;
                    report.foreground.push(result);
                }
            }
        }

        Ok(report)
    }

    /// Wait until every background completion has been delivered to the reporter
    ///
    /// This is for process teardown only, after `execute` has returned. Nothing it observes can
    ///  change the outcome of `execute`.
    pub async fn drain_background(&self) {
        let pending = match self.pending_reports.lock() {
            Ok(mut pending) => mem::take(&mut *pending),
            Err(_) => return,
        };

        debug!(count = pending.len(), "waiting for background reports");
        for report in pending {
            if let Err(err) = report.await {
                warn!(error = %err, "background report task failed");
            }
        }
    }

    /// `drain_background`, cut short by SIGTERM, SIGINT or SIGHUP
    ///
    /// The foreground wait leaves tokio's handlers installed for these signals, after it they
    ///  only end the process through this wait.
    pub async fn drain_background_until_signal(&self) -> Result<Drained, Error> {
        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut hangup = signal(SignalKind::hangup())?;

        let drained = tokio::select! {
            _ = self.drain_background() => Drained::Completed,
            _ = terminate.recv() => Drained::Interrupted,
            _ = interrupt.recv() => Drained::Interrupted,
            _ = hangup.recv() => Drained::Interrupted,
        };

        if drained == Drained::Interrupted {
            info!("signalled during teardown, background output will not be waited for");
        }

        Ok(drained)
    }
}
