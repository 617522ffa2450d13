//! External command execution.
//!
//! Every harness operation is one blocking invocation of an external tool.
//! Operations build a [`CommandSpec`] and hand it to a [`CommandRunner`];
//! [`SystemRunner`] spawns real processes, tests substitute a fake that
//! records the specs and replays canned output.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Write};
use std::process::{ChildStdin, Command, Stdio};

use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Bytes written to the child's stdin before it is closed.
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Append `--port P` when a port is given.
    pub fn opt_port(self, port: Option<u16>) -> Self {
        match port {
            Some(p) => self.arg("--port").arg(p.to_string()),
            None => self,
        }
    }

    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Run this command through `prefix` (e.g. `["sudo"]`).
    ///
    /// An empty prefix leaves the command unchanged.
    pub fn privileged(self, prefix: &[String]) -> Self {
        let Some((head, rest)) = prefix.split_first() else {
            return self;
        };
        let mut args: Vec<OsString> = rest.iter().map(OsString::from).collect();
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: OsString::from(head),
            args,
            stdin: self.stdin,
        }
    }

    /// The argument vector as UTF-8 strings (lossy), for assertions and logs.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// What a finished command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Turn a non-zero exit into [`HarnessError::CommandFailed`].
    pub fn check(self, spec: &CommandSpec) -> HarnessResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(HarnessError::CommandFailed {
                command: spec.to_string(),
                code: self.status,
                stderr: self.stderr_str(),
            })
        }
    }
}

/// Executes command specs.
///
/// Implementations block until the command exits. A command that cannot be
/// started at all is an `Err`; a command that ran and failed is an `Ok`
/// output with a non-zero status.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput>;

    /// Run and require a zero exit status.
    fn run_checked(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        self.run(spec)?.check(spec)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        (**self).run(spec)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        debug!("exec: {}", spec);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn()?;
        let pipe = child.stdin.take();

        // Feed stdin while wait_with_output drains stdout and stderr.
        let output = std::thread::scope(|scope| {
            let feeder = match (pipe, &spec.stdin) {
                (Some(pipe), Some(data)) => {
                    Some(scope.spawn(move || feed_stdin(pipe, data, spec)))
                }
                _ => None,
            };
            let output = child.wait_with_output();
            let fed = match feeder {
                Some(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))),
                None => Ok(()),
            };
            output.and_then(|o| fed.map(|()| o))
        })?;

        let out = CommandOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        };
        debug!(
            "exit: {} status={:?} stdout={}B",
            spec,
            out.status,
            out.stdout.len()
        );
        Ok(out)
    }
}

/// Write `data` and close the pipe so the child sees EOF.
fn feed_stdin(mut pipe: ChildStdin, data: &[u8], spec: &CommandSpec) -> io::Result<()> {
    match pipe.write_all(data) {
        Ok(()) => Ok(()),
        // The child exited without draining stdin; its status says why.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("exec: {} closed stdin early", spec);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
