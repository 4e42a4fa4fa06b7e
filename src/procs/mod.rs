// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod background;
mod foreground;
mod launcher;
mod logger;

pub use background::BackgroundHandle;
pub use launcher::{Drained, LaunchReport, Launcher};
pub use logger::ConsoleReporter;

use async_trait::async_trait;
use tracing::debug;

use crate::plan::ChildProcessSpec;
use crate::Error;

/// Outcome of one child process, produced once when it completes
#[derive(Debug)]
pub struct ChildProcessResult {
    pub exit_error: Option<Error>,
    pub standard_output: Option<String>,
    pub standard_error: Option<String>,
}

impl ChildProcessResult {
    /// A child with inherited stdio that exited successfully, there is nothing captured to report
    pub fn succeeded() -> Self {
        Self {
            exit_error: None,
            standard_output: None,
            standard_error: None,
        }
    }

    /// The child never started, so nothing was captured
    pub fn spawn_failed(err: Error) -> Self {
        Self {
            exit_error: Some(err),
            standard_output: None,
            standard_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_error.is_none()
    }
}

/// Receives launch and completion notices from the `Launcher`
///
/// The completion of a background child is delivered here and nowhere else, the launcher never
///  waits on it.
#[async_trait]
pub trait Reporter: Send + Sync + 'static {
    /// Called synchronously right after the OS process for `spec` was created
    fn started(&self, spec: &ChildProcessSpec, pid: Option<u32>) {
        debug!(command = spec.command(), pid = ?pid, "launched");
    }

    /// A background child finished, or could not be started at all
    async fn background_completed(&self, spec: &ChildProcessSpec, result: ChildProcessResult);
}
