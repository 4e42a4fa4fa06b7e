// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::plan::ChildProcessSpec;
use crate::procs::{ChildProcessResult, Reporter};

/// Channels background output to the launcher's console
///
/// Rules:
///  - the error, if any, then captured stderr go to stderr
///  - captured stdout goes to stdout
///  - printed whether the child succeeded or not
#[derive(Debug, Default)]
pub struct ConsoleReporter;

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn background_completed(&self, spec: &ChildProcessSpec, result: ChildProcessResult) {
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();

        if let Err(err) = write_result(&result, &mut stdout, &mut stderr).await {
            warn!(command = spec.command(), error = %err, "failed to print background output");
        }
    }
}

async fn write_result<O, E>(result: &ChildProcessResult, out: &mut O, err: &mut E) -> io::Result<()>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    if let Some(exit_error) = &result.exit_error {
        err.write_all(format!("{}\n", exit_error).as_bytes()).await?;
    }
    if let Some(text) = result.standard_error.as_deref().filter(|t| !t.is_empty()) {
        err.write_all(text.as_bytes()).await?;
    }
    err.flush().await?;

    if let Some(text) = result.standard_output.as_deref().filter(|t| !t.is_empty()) {
        out.write_all(text.as_bytes()).await?;
    }
    out.flush().await
}
