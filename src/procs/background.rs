// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join3;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::{self, Captured};
use crate::error::ErrorKind;
use crate::fork::new_process;
use crate::plan::ChildProcessSpec;
use crate::procs::{ChildProcessResult, Reporter};

/// Receipt for a child started in the background
///
/// There is deliberately no way to join or await the child through this handle: its completion
///  goes to the `Reporter` only. Holding or dropping the handle has no effect on the child.
#[derive(Debug)]
pub struct BackgroundHandle {
    command: String,
    pid: Option<u32>,
    launched_at: Instant,
}

impl BackgroundHandle {
    pub fn command(&self) -> &str {
        &self.command
    }

    /// `None` if the process could not be created
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn launched_at(&self) -> Instant {
        self.launched_at
    }

    /// Let go of the child, it keeps running and still reports on completion
    pub fn detach(self) {
        debug!(command = %self.command, pid = ?self.pid, "detached background child");
    }
}

/// Create the process for `spec` now, and collect its completion on a detached task
///
/// The returned `JoinHandle` only tracks delivery to the reporter; it is for process teardown, not
///  for the launch sequence.
pub(crate) fn spawn(
    spec: ChildProcessSpec,
    reporter: Arc<dyn Reporter>,
    capture_limit: usize,
) -> (BackgroundHandle, JoinHandle<()>) {
    let launched_at = Instant::now();
    let child = new_process(&spec);

    let pid = match &child {
        Ok(child) => {
            let pid = child.id();
            reporter.started(&spec, pid);
            pid
        }
        // reported from the completion task like any other failure
        Err(_) => None,
    };

    let handle = BackgroundHandle {
        command: spec.command().to_string(),
        pid,
        launched_at,
    };

    let task = tokio::spawn(async move {
        let result = match child {
            Ok(child) => collect(child, &spec, capture_limit).await,
            Err(err) => ChildProcessResult::spawn_failed(err),
        };

        match &result.exit_error {
            None => info!(
                command = spec.command(),
                elapsed_ms = launched_at.elapsed().as_millis() as u64,
                "background child completed"
            ),
            Some(err) => warn!(command = spec.command(), error = %err, "background child failed"),
        }

        reporter.background_completed(&spec, result).await;
    });

    (handle, task)
}

async fn collect(mut child: Child, spec: &ChildProcessSpec, limit: usize) -> ChildProcessResult {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr, status) = join3(
        capture_stream(stdout, "stdout", spec, limit),
        capture_stream(stderr, "stderr", spec, limit),
        child.wait(),
    )
    .await;

    let exit_error = match status {
        Ok(status) if status.success() => None,
        Ok(status) => Some(
            ErrorKind::NonZeroExit {
                command: spec.command().to_string(),
                status,
            }
            .into(),
        ),
        Err(err) => Some(err.into()),
    };

    ChildProcessResult {
        exit_error,
        standard_output: Some(stdout.into_text()),
        standard_error: Some(stderr.into_text()),
    }
}

async fn capture_stream<R>(
    stream: Option<R>,
    label: &'static str,
    spec: &ChildProcessSpec,
    limit: usize,
) -> Captured
where
    R: AsyncRead + Unpin,
{
    let stream = match stream {
        Some(stream) => stream,
        None => return Captured::default(),
    };

    match capture::drain(stream, limit).await {
        Ok(captured) => {
            if captured.is_truncated() {
                warn!(
                    command = spec.command(),
                    stream = label,
                    discarded = captured.discarded(),
                    limit,
                    "captured output exceeded the limit and was truncated"
                );
            }
            captured
        }
        Err(err) => {
            warn!(
                command = spec.command(),
                stream = label,
                error = %err,
                "failed to read captured output"
            );
            Captured::default()
        }
    }
}
