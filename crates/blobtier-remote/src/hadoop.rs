use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::error::{RemoteError, RemoteResult};
use crate::traits::{RemoteEntry, RemoteStore};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const LS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Remote store that shells out to the Hadoop filesystem CLI.
///
/// Every operation runs one `hadoop fs <subcommand>` process. With a timeout
/// configured, a command still running at the deadline is killed and the
/// call fails with [`RemoteError::Timeout`].
#[derive(Debug, Clone)]
pub struct HadoopCli {
    program: String,
    base_args: Vec<String>,
    timeout: Option<Duration>,
}

impl HadoopCli {
    /// `hadoop fs`, no timeout.
    pub fn new() -> Self {
        Self::with_command("hadoop", ["fs"])
    }

    /// `hdfs dfs`, no timeout.
    pub fn hdfs() -> Self {
        Self::with_command("hdfs", ["dfs"])
    }

    /// Run `program base_args... <subcommand>` for every operation.
    pub fn with_command<I, S>(program: impl Into<String>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            base_args: base_args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    /// Kill commands that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn run(&self, args: &[&str]) -> RemoteResult<CommandOutput> {
        let op = args.first().copied().unwrap_or("fs").trim_start_matches('-').to_string();
        debug!(program = %self.program, ?args, "running remote command");

        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RemoteError::Unavailable(format!("cannot run {}: {e}", self.program)))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit, &op)?,
            None => child.wait()?,
        };

        Ok(CommandOutput {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }

    /// Run a command that must succeed; failures are classified from stderr.
    fn run_checked(&self, args: &[&str], path: &str) -> RemoteResult<String> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(classify_failure(path, &output.stderr))
        }
    }
}

impl Default for HadoopCli {
    fn default() -> Self {
        Self::new()
    }
}

struct CommandOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle.and_then(|h| h.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn wait_with_deadline(child: &mut Child, limit: Duration, op: &str) -> RemoteResult<ExitStatus> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            if let Err(e) = child.kill() {
                warn!(error = %e, op, "failed to kill timed out command");
            }
            let _ = child.wait();
            return Err(RemoteError::Timeout { op: op.to_string(), after: limit });
        }
        thread::sleep(POLL_INTERVAL.min(limit));
    }
}

/// Map a failed command's stderr to a [`RemoteError`].
pub fn classify_failure(path: &str, stderr: &str) -> RemoteError {
    let message = stderr.trim();
    if message.contains("No such file or directory") || message.contains("FileNotFoundException") {
        RemoteError::NotFound(path.to_string())
    } else if message.contains("Connection refused")
        || message.contains("UnknownHostException")
        || message.contains("Call From")
        || message.contains("ConnectException")
    {
        RemoteError::Unavailable(message.to_string())
    } else {
        let reason = if message.is_empty() { "command failed".to_string() } else { message.to_string() };
        RemoteError::Rejected { path: path.to_string(), reason }
    }
}

/// Parse `-ls` output into entries.
///
/// ```text
/// Found 2 items
/// drwxr-xr-x   - hdfs supergroup          0 2024-03-01 09:15 /registry/a
/// -rw-r--r--   3 hdfs supergroup         11 2024-03-01 09:16 /registry/b
/// ```
///
/// Lines that do not have the eight expected columns are skipped.
pub fn parse_ls(output: &str) -> Vec<RemoteEntry> {
    output
        .lines()
        .filter(|line| !line.starts_with("Found "))
        .filter_map(parse_ls_line)
        .collect()
}

fn parse_ls_line(line: &str) -> Option<RemoteEntry> {
    let mut rest = line.trim_start();
    let mut fields = Vec::with_capacity(7);
    for _ in 0..7 {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    if rest.is_empty() {
        return None;
    }

    let is_dir = fields[0].starts_with('d');
    let size = fields[4].parse().ok()?;
    let stamp = format!("{} {}", fields[5], fields[6]);
    let modified = NaiveDateTime::parse_from_str(&stamp, LS_TIME_FORMAT).ok();

    Some(RemoteEntry {
        path: rest.to_string(),
        size: if is_dir { 0 } else { size },
        is_dir,
        modified,
    })
}

/// Parse `-du -s` output: the first column is the byte count.
pub fn parse_du(output: &str) -> Option<u64> {
    output.split_whitespace().next()?.parse().ok()
}

impl RemoteStore for HadoopCli {
    fn mkdir_parents(&self, path: &str) -> RemoteResult<()> {
        self.run_checked(&["-mkdir", "-p", path], path).map(|_| ())
    }

    fn disk_usage(&self, path: &str) -> RemoteResult<u64> {
        let out = self.run_checked(&["-du", "-s", path], path)?;
        parse_du(&out).ok_or_else(|| RemoteError::Rejected {
            path: path.to_string(),
            reason: format!("unparseable du output: {}", out.trim()),
        })
    }

    fn remove_recursive(&self, path: &str) -> RemoteResult<()> {
        self.run_checked(&["-rm", "-r", path], path).map(|_| ())
    }

    fn upload_force(&self, local_path: &Path, remote_path: &str) -> RemoteResult<()> {
        let local = local_path.to_string_lossy();
        self.run_checked(&["-put", "-f", &local, remote_path], remote_path).map(|_| ())
    }

    fn download(&self, remote_path: &str, local_path: &Path) -> RemoteResult<()> {
        let local = local_path.to_string_lossy();
        self.run_checked(&["-get", remote_path, &local], remote_path).map(|_| ())
    }

    fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let out = self.run_checked(&["-ls", path], path)?;
        Ok(parse_ls(&out))
    }

    fn exists(&self, path: &str) -> RemoteResult<bool> {
        let output = self.run(&["-test", "-e", path])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) if output.stderr.trim().is_empty() => Ok(false),
            _ => match classify_failure(path, &output.stderr) {
                RemoteError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }
}
