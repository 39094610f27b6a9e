//! External command execution with a hard deadline.
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::COMMAND_POLL_MS;
use crate::types::errors::ActionError;

/// One external invocation. `argv[0]` is resolved through `PATH`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub stdin: Option<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            stdin: None,
            timeout,
        }
    }

    #[must_use]
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Space-joined argv, for logs and facts.
    #[must_use]
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Map a non-zero exit to `ActionError::ExitCode`.
    ///
    /// # Errors
    ///
    /// `ActionError::ExitCode` carrying the child's exit status.
    pub fn check(self) -> Result<Self, ActionError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ActionError::ExitCode(self.exit_code))
        }
    }
}

/// Runs external commands. Implementations must enforce `spec.timeout`.
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output. A non-zero exit is *not* an error here;
    /// callers decide through [`CommandOutput::check`].
    ///
    /// # Errors
    ///
    /// `Timeout` when the deadline expires (the child is killed), `PermissionDenied` when
    /// the program cannot be executed, `Io` for other spawn failures.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ActionError>;
}

/// [`CommandRunner`] over `std::process`, polling `try_wait` against a deadline.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCommandRunner;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ActionError> {
        let Some((program, args)) = spec.argv.split_first() else {
            return Err(ActionError::Unsupported("empty command".into()));
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ActionError::from)?;

        let out = drain(child.stdout.take());
        let err = drain(child.stderr.take());
        // Fed from its own thread so a child that never reads cannot outlive the deadline.
        // A child that exits without reading yields EPIPE; its exit code tells the story.
        let feed = match (spec.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(thread::spawn(move || {
                let _ = pipe.write_all(input.as_bytes());
            })),
            _ => None,
        };

        let deadline = Instant::now() + spec.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(ActionError::from(e)),
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("command timed out after {:?}: {}", spec.timeout, spec.display());
                return Err(ActionError::Timeout(
                    u64::try_from(spec.timeout.as_millis()).unwrap_or(u64::MAX),
                ));
            }
            thread::sleep(Duration::from_millis(COMMAND_POLL_MS));
        };
        if let Some(f) = feed {
            let _ = f.join();
        }

        Ok(CommandOutput {
            // Killed by signal: report 128 + signo like a shell would.
            exit_code: status.code().unwrap_or_else(|| {
                use std::os::unix::process::ExitStatusExt;
                128 + status.signal().unwrap_or(0)
            }),
            stdout: out.join().unwrap_or_default(),
            stderr: err.join().unwrap_or_default(),
        })
    }
}
