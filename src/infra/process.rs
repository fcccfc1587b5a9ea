//! External process execution
//!
//! Every external tool (preparation scripts, make, container runtimes) is
//! started through a [`ToolCommand`] and a [`ToolRunner`]. The system runner
//! passes the child's output through byte for byte, mirrors it to a log file
//! and keeps the last lines for error reports.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex as StdMutex;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::config::defaults::DIAGNOSTIC_TAIL_LINES;
use crate::error::ToolError;

/// A fully specified invocation of an external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program name or path
    pub program: String,
    /// Arguments, already expanded
    pub args: Vec<String>,
    /// Variables added to the inherited environment
    pub env: BTreeMap<String, String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// File receiving a copy of all output
    pub log_file: Option<PathBuf>,
}

impl ToolCommand {
    /// Create a command for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            log_file: None,
        }
    }

    /// Build a command from a configured command line, expanding placeholders
    pub fn from_template(
        template: &[String],
        placeholders: &Placeholders,
        stage: &str,
    ) -> Result<Self, ToolError> {
        let (program, args) = template.split_first().ok_or_else(|| ToolError::EmptyCommand {
            stage: stage.to_string(),
        })?;

        Ok(Self::new(placeholders.expand(program))
            .args(args.iter().map(|a| placeholders.expand(a))))
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Mirror output to `path`
    #[must_use]
    pub fn log_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Program and arguments as the user would type them
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `{name}` substitutions applied to configured command lines
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    pairs: Vec<(String, String)>,
}

impl Placeholders {
    /// Create an empty substitution table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a substitution for `{key}`
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.pairs.push((key.to_string(), value.into()));
        self
    }

    /// Add a path substitution
    #[must_use]
    pub fn with_path(self, key: &str, path: &Path) -> Self {
        self.with(key, path.display().to_string())
    }

    /// Replace every known placeholder in `input`
    ///
    /// Substituted values are never expanded again.
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let key = &after[..close];
                self.pairs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, value)| (value, close))
            });

            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Result of running an external tool to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Exit code (`128 + signal` when killed by a signal)
    pub code: i32,
    /// Last lines of combined output
    pub tail: Vec<String>,
}

impl ToolOutcome {
    /// Outcome of a successful run
    pub fn success() -> Self {
        Self {
            code: 0,
            tail: Vec::new(),
        }
    }

    /// Outcome of a failed run with diagnostic lines
    pub fn failure(code: i32, tail: Vec<String>) -> Self {
        Self { code, tail }
    }

    /// Whether the tool reported success
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Runs external tools
///
/// The orchestrator is generic over this trait so that tests can script
/// tool behaviour without spawning processes.
#[allow(async_fn_in_trait)]
pub trait ToolRunner {
    /// Run `command` to completion
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutcome, ToolError>;
}

/// Runs tools as child processes of this one
#[derive(Debug, Clone)]
pub struct SystemRunner {
    tail_lines: usize,
    stdout_to_stderr: bool,
    log_groups: bool,
}

impl SystemRunner {
    /// Create a runner keeping the default number of diagnostic lines
    pub fn new() -> Self {
        Self {
            tail_lines: DIAGNOSTIC_TAIL_LINES,
            stdout_to_stderr: false,
            log_groups: false,
        }
    }

    /// Send the child's stdout to our stderr, leaving our stdout to the caller
    #[must_use]
    pub fn with_stdout_to_stderr(mut self, enabled: bool) -> Self {
        self.stdout_to_stderr = enabled;
        self
    }

    /// Fold each run in the GitHub Actions log (`::group::` markers)
    #[must_use]
    pub fn with_log_groups(mut self, enabled: bool) -> Self {
        self.log_groups = enabled;
        self
    }

    fn stdout_sink(&self) -> Sink {
        if self.stdout_to_stderr {
            Box::new(tokio::io::stderr())
        } else {
            Box::new(tokio::io::stdout())
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutcome, ToolError> {
        tracing::info!("Running: {}", command.command_line());
        if let Some(cwd) = &command.cwd {
            tracing::debug!("  in {}", cwd.display());
        }

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| ToolError::Spawn {
            program: command.program.clone(),
            error: e.to_string(),
        })?;

        let io_err = |e: std::io::Error| ToolError::Io {
            program: command.program.clone(),
            error: e.to_string(),
        };

        if self.log_groups {
            write_marker(self.stdout_sink(), &format!("::group::{}\n", command.command_line())).await;
        }

        let log = Mutex::new(open_log(command.log_file.as_deref()).await.map_err(io_err)?);
        let tail = StdMutex::new(Tail::new(self.tail_lines));

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (out, err, status) = tokio::join!(
            pump(stdout, self.stdout_sink(), &log, &tail),
            pump(stderr, Box::new(tokio::io::stderr()), &log, &tail),
            child.wait(),
        );
        out.map_err(io_err)?;
        err.map_err(io_err)?;
        let status = status.map_err(io_err)?;

        if let Some(file) = log.lock().await.as_mut() {
            if let Err(e) = file.flush().await {
                tracing::warn!("Failed to flush tool log: {e}");
            }
        }

        if self.log_groups {
            write_marker(self.stdout_sink(), "::endgroup::\n").await;
        }

        let code = exit_code(status);
        tracing::debug!("'{}' exited with {code}", command.program);

        let tail = tail.into_inner().map(Tail::into_lines).unwrap_or_default();
        Ok(ToolOutcome { code, tail })
    }
}

/// Where one child stream is forwarded
type Sink = Box<dyn AsyncWrite + Unpin + Send>;

/// Ring buffer of the most recent output lines
struct Tail {
    lines: VecDeque<String>,
    limit: usize,
}

impl Tail {
    fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(limit),
            limit,
        }
    }

    fn push(&mut self, line: String) {
        if self.limit == 0 {
            return;
        }
        if self.lines.len() == self.limit {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn into_lines(self) -> Vec<String> {
        self.lines.into_iter().collect()
    }
}

async fn open_log(path: Option<&Path>) -> std::io::Result<Option<File>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(Some(File::create(path).await?))
}

/// Forward one child stream to ours, line by line, bytes unchanged
///
/// Keeps reading until the child closes the stream, whatever happens to
/// the sink or the log, so the child never blocks on a full pipe.
async fn pump<R>(
    reader: Option<R>,
    mut sink: Sink,
    log: &Mutex<Option<File>>,
    tail: &StdMutex<Tail>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarding = true;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }

        if forwarding {
            if let Err(e) = forward(&mut sink, &buf).await {
                tracing::debug!("Stopped forwarding tool output: {e}");
                forwarding = false;
            }
        }

        append_log(log, &buf).await;

        if let Ok(mut tail) = tail.lock() {
            tail.push(
                String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string(),
            );
        }
    }
}

async fn forward(sink: &mut Sink, bytes: &[u8]) -> std::io::Result<()> {
    sink.write_all(bytes).await?;
    sink.flush().await
}

/// Append to the tool log; the first failed write closes it
async fn append_log(log: &Mutex<Option<File>>, bytes: &[u8]) {
    let mut guard = log.lock().await;
    if let Some(file) = guard.as_mut() {
        if let Err(e) = file.write_all(bytes).await {
            tracing::warn!("Stopped writing tool log: {e}");
            *guard = None;
        }
    }
}

async fn write_marker(mut sink: Sink, line: &str) {
    if let Err(e) = forward(&mut sink, line.as_bytes()).await {
        tracing::debug!("Failed to write log group marker: {e}");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
