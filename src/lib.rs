// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Launches the warp bootstrap in the background and the start script in the foreground

pub mod capture;
pub mod fork;
pub mod plan;
pub mod procs;

mod error;

pub use error::{Error, ErrorKind, SPAWN_FAILURE_EXIT_CODE};
pub use plan::{ChildProcessSpec, Environment, IoMode, LaunchPlan};
pub use procs::{
    BackgroundHandle, ChildProcessResult, ConsoleReporter, Drained, LaunchReport, Launcher,
    Reporter,
};
