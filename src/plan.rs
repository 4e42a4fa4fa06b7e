// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! What gets launched, and how.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::slice;

use tokio::process::Command;

/// Bootstraps the warp tunnel, runs in the background with its output captured
pub const WARP_COMMAND: &str = "bash warp.sh";
/// Starts the proxy services, runs in the foreground and decides the exit status
pub const START_COMMAND: &str = "bash start.sh";

/// Listening port handed to the REALITY inbound of the start script
pub const REALITY_PORT: u16 = 20143;
pub const REALITY_PORT_VAR: &str = "REALITY_PORT";
/// Listening port handed to the Hysteria2 inbound of the start script
pub const HY2_PORT: u16 = 20143;
pub const HY2_PORT_VAR: &str = "HY2_PORT";

/// The environment a child is started with
///
/// `Exactly` with an empty map is not the same thing as `Inherit`: the former starts the child
///  with no variables at all, the latter passes the launcher's own environment through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    /// Pass the launcher's environment through untouched
    Inherit,
    /// Clear the environment, then set exactly these variables
    Exactly(BTreeMap<String, String>),
}

impl Environment {
    /// No variables at all, nothing inherited
    pub fn empty() -> Self {
        Environment::Exactly(BTreeMap::new())
    }

    pub fn exactly<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Environment::Exactly(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// True if the launcher's variables are cut off from the child
    pub fn is_isolated(&self) -> bool {
        matches!(self, Environment::Exactly(_))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Environment::Inherit => None,
            Environment::Exactly(vars) => vars.get(name).map(String::as_str),
        }
    }

    pub(crate) fn apply(&self, command: &mut Command) {
        if let Environment::Exactly(vars) = self {
            command.env_clear();
            command.envs(vars);
        }
    }
}

/// How the child's standard streams are connected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoMode {
    /// stdout/stderr are the launcher's own, byte for byte
    Inherit,
    /// stdout/stderr are piped into buffers owned by the launcher
    Captured,
}

/// One child process to start. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildProcessSpec {
    command: String,
    environment: Environment,
    io_mode: IoMode,
    current_dir: Option<PathBuf>,
}

impl ChildProcessSpec {
    /// `command` is a shell command line, it is run with `sh -c`
    pub fn new(command: impl Into<String>, environment: Environment, io_mode: IoMode) -> Self {
        Self {
            command: command.into(),
            environment,
            io_mode,
            current_dir: None,
        }
    }

    /// Run the command from `dir` rather than the launcher's working directory
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn io_mode(&self) -> IoMode {
        self.io_mode
    }

    pub fn current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

/// The two processes the launcher runs, in launch order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchPlan {
    specs: [ChildProcessSpec; 2],
}

impl LaunchPlan {
    pub fn new(first: ChildProcessSpec, second: ChildProcessSpec) -> Self {
        Self {
            specs: [first, second],
        }
    }

    /// The warp bootstrap in the background with a scrubbed environment, then the start script
    ///  in the foreground with only the port variables set.
    pub fn standard() -> Self {
        Self::new(
            ChildProcessSpec::new(WARP_COMMAND, Environment::empty(), IoMode::Captured),
            ChildProcessSpec::new(
                START_COMMAND,
                Environment::exactly(vec![
                    (REALITY_PORT_VAR, REALITY_PORT.to_string()),
                    (HY2_PORT_VAR, HY2_PORT.to_string()),
                ]),
                IoMode::Inherit,
            ),
        )
    }

    pub fn specs(&self) -> &[ChildProcessSpec] {
        &self.specs
    }

    pub fn iter(&self) -> slice::Iter<'_, ChildProcessSpec> {
        self.specs.iter()
    }
}

impl<'a> IntoIterator for &'a LaunchPlan {
    type Item = &'a ChildProcessSpec;
    type IntoIter = slice::Iter<'a, ChildProcessSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
