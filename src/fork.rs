// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::ErrorKind;
use crate::plan::{ChildProcessSpec, IoMode};
use crate::Error;

/// Absolute so that lookup never depends on a cleared `PATH`
pub const SHELL: &str = "/bin/sh";

pub struct StdIoConf {
    pub stdin: Stdio,
    pub stderr: Stdio,
    pub stdout: Stdio,
}

impl StdIoConf {
    pub fn for_mode(io_mode: IoMode) -> Self {
        match io_mode {
            IoMode::Inherit => StdIoConf {
                stdin: Stdio::inherit(),
                stderr: Stdio::inherit(),
                stdout: Stdio::inherit(),
            },
            IoMode::Captured => StdIoConf {
                // nothing is ever written to a background child
                stdin: Stdio::null(),
                stderr: Stdio::piped(),
                stdout: Stdio::piped(),
            },
        }
    }
}

/// Build the command for `spec` without starting it
pub fn command_for(spec: &ChildProcessSpec) -> Command {
    let stdio = StdIoConf::for_mode(spec.io_mode());

    let mut command = Command::new(SHELL);
    command.arg("-c").arg(spec.command());
    spec.environment().apply(&mut command);

    if let Some(dir) = spec.current_dir() {
        command.current_dir(dir);
    }

    // children outlive the handle, the launcher never kills them on drop
    command
        .kill_on_drop(false)
        .stdin(stdio.stdin)
        .stdout(stdio.stdout)
        .stderr(stdio.stderr);

    command
}

/// Start the OS process for `spec`
pub fn new_process(spec: &ChildProcessSpec) -> Result<Child, Error> {
    let child = command_for(spec)
        .spawn()
        .map_err(|source| ErrorKind::SpawnFailure {
            command: spec.command().to_string(),
            source,
        })?;

    debug!(
        command = spec.command(),
        pid = ?child.id(),
        io_mode = ?spec.io_mode(),
        isolated_env = spec.environment().is_isolated(),
        "started child process"
    );

    Ok(child)
}
