//! # Navigation script interpreter module
//!
//! This module provides an interpreter for navigation scripts, allowing
//! navigation commands to be issued at set times. Each command in a script
//! has the form
//!
//! ```text
//! <time_s>: <json NavCmd>;
//! ```
//!
//! for example `1.0: {"Path": [{"position_m": [1.0, 0.0], "heading_rad": 0.0}]};`.
//! Anything outside of this pattern (comments, blank lines) is ignored.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use comms_if::nav::NavCmd;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
#[derive(Debug, Clone)]
pub struct Command {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    /// The command to issue
    cmd: NavCmd
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use
/// `.get_pending_cmds` to acquire a list of commands that need issuing.
pub struct ScriptInterpreter {
    script_path: PathBuf,
    cmds: VecDeque<Command>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid command at {0} s: {1}")]
    InvalidCmd(f64, serde_json::Error),

    #[error("Could not build the script pattern: {0}")]
    PatternError(regex::Error)
}

#[derive(Debug, PartialEq)]
pub enum PendingCmds {
    None,
    Some(Vec<NavCmd>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {

        let path = PathBuf::from(script_path.as_ref());
        
        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path)
            .map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_script(&script)?;
        interp.script_path = path;

        Ok(interp)
    }

    /// Create a new interpreter from the script contents.
    pub fn from_script(script: &str) -> Result<Self, ScriptError> {

        // Empty queue of commands
        let mut cmd_queue: VecDeque<Command> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::
            new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        for cap in re.captures_iter(script) {
            let time_str = cap.get(1).map_or("", |m| m.as_str());
            let payload = cap.get(3).map_or("", |m| m.as_str());

            // Parse the exec time
            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            // Parse the command from the payload. The scripts contain JSON only.
            let cmd = NavCmd::from_json(payload)
                .map_err(|e| ScriptError::InvalidCmd(exec_time_s, e))?;

            cmd_queue.push_back(Command {
                exec_time_s,
                cmd
            });
        }

        if cmd_queue.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            script_path: PathBuf::new(),
            cmds: cmd_queue
        })
    }

    /// Return the commands whose execution time is before `current_time_s`.
    ///
    /// The time is supplied by the caller so that scripts can run against a
    /// simulated clock.
    pub fn get_pending_cmds(&mut self, current_time_s: f64) -> PendingCmds {

        // If the queue is empty the script is over and we return the end of
        // script variant
        if self.cmds.is_empty() {
            return PendingCmds::EndOfScript
        }

        let mut cmd_vec: Vec<NavCmd> = vec![];

        // Keep popping from the front while the head is due
        while let Some(front) = self.cmds.front() {
            if front.exec_time_s >= current_time_s {
                break;
            }

            if let Some(c) = self.cmds.pop_front() {
                cmd_vec.push(c.cmd);
            }
        }

        if cmd_vec.is_empty() {
            PendingCmds::None
        }
        else {
            PendingCmds::Some(cmd_vec)
        }
    }

    /// Get the number of commands remaining in the script
    pub fn get_num_cmds(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}
