// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::process::ExitStatus;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};

use crate::error::ErrorKind;
use crate::fork::new_process;
use crate::plan::ChildProcessSpec;
use crate::procs::{ChildProcessResult, Reporter};
use crate::Error;

/// Start `spec` and block until it exits
///
/// stdio is whatever `spec` asks for; for the start script that is the launcher's own streams,
///  so nothing is captured and the result carries no output.
pub(crate) async fn run(
    spec: &ChildProcessSpec,
    reporter: &dyn Reporter,
) -> Result<ChildProcessResult, Error> {
    let mut child = new_process(spec)?;
    reporter.started(spec, child.id());

    let status = wait_forwarding_signals(&mut child, spec).await?;

    if !status.success() {
        warn!(command = spec.command(), %status, "foreground child failed");
        return Err(ErrorKind::NonZeroExit {
            command: spec.command().to_string(),
            status,
        }
        .into());
    }

    info!(command = spec.command(), "foreground child completed");
    Ok(ChildProcessResult::succeeded())
}

/// Wait for `child`, passing SIGTERM and SIGHUP received by the launcher on to it
///
/// SIGINT is only absorbed: the terminal delivers it to the whole process group, the child
///  included, and the launcher reports whatever status the child ends with.
async fn wait_forwarding_signals(
    child: &mut Child,
    spec: &ChildProcessSpec,
) -> Result<ExitStatus, Error> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            status = child.wait() => return Ok(status?),
            _ = terminate.recv() => forward(child, spec, Signal::SIGTERM),
            _ = hangup.recv() => forward(child, spec, Signal::SIGHUP),
            _ = interrupt.recv() => {
                debug!(command = spec.command(), "interrupted, waiting for the foreground child");
            }
        }
    }
}

fn forward(child: &Child, spec: &ChildProcessSpec, sig: Signal) {
    let pid = match child.id().and_then(|pid| i32::try_from(pid).ok()) {
        Some(pid) => Pid::from_raw(pid),
        // already reaped, the next wait returns its status
        None => return,
    };

    info!(command = spec.command(), %pid, signal = %sig, "forwarding signal");
    if let Err(err) = kill(pid, sig) {
        warn!(
            command = spec.command(),
            %pid,
            signal = %sig,
            error = %err,
            "failed to forward signal"
        );
    }
}
