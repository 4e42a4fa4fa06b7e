// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Collecting the output of a captured child.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Per stream retention limit, bytes past it are read and discarded
pub const DEFAULT_CAPTURE_LIMIT: usize = 1024 * 1024;

const READ_CHUNK: usize = 16 * 1024;

/// Output retained from one stream of a child
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    bytes: Vec<u8>,
    discarded: u64,
}

impl Captured {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes the child wrote beyond the limit
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn is_truncated(&self) -> bool {
        self.discarded > 0
    }

    /// Lossy, the child's output is not required to be UTF-8
    pub fn into_text(self) -> String {
        match String::from_utf8(self.bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}

/// Read `reader` to EOF, keeping at most `limit` bytes
///
/// The stream is always drained fully so that a chatty child never blocks on a full pipe.
pub async fn drain<R>(mut reader: R, limit: usize) -> io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        let room = limit.saturating_sub(captured.bytes.len());
        let keep = room.min(n);
        captured.bytes.extend_from_slice(&buf[..keep]);
        captured.discarded += (n - keep) as u64;
    }

    Ok(captured)
}
