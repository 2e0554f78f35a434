//! Execution substrates behind one seam.
//!
//! A worker owns one [`Executor`] for its whole life. In-process executors call the writer
//! directly; child-process executors forward each [`WriteRequest`] as a JSON line to a
//! `--worker-stdio` child and read one [`WriteReply`] line back.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::error::ItemError;
use crate::pipeline::writer::write_artifact;
use crate::{Substrate, WriteRequest};

/// Flag that switches the binary into child-worker mode.
pub const WORKER_STDIO_FLAG: &str = "--worker-stdio";

/// Runs writes for one worker.
pub trait Executor: Send {
    fn execute(&mut self, req: &WriteRequest) -> Result<PathBuf, ItemError>;
}

/// Builds one executor per worker. An `Err` aborts pool construction.
pub trait ExecutorFactory: Send + Sync {
    fn build(&self, worker_id: usize) -> io::Result<Box<dyn Executor>>;
}

impl<F> ExecutorFactory for F
where
    F: Fn(usize) -> io::Result<Box<dyn Executor>> + Send + Sync,
{
    fn build(&self, worker_id: usize) -> io::Result<Box<dyn Executor>> {
        self(worker_id)
    }
}

impl ExecutorFactory for Substrate {
    fn build(&self, worker_id: usize) -> io::Result<Box<dyn Executor>> {
        match self {
            Substrate::Threads => Ok(Box::new(InProcessExecutor)),
            Substrate::Processes { program } => {
                Ok(Box::new(ChildProcessExecutor::spawn(program, worker_id)?))
            }
        }
    }
}

/// Calls the writer on the worker thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessExecutor;

impl Executor for InProcessExecutor {
    fn execute(&mut self, req: &WriteRequest) -> Result<PathBuf, ItemError> {
        write_artifact(req)
    }
}

/// Reply line written by a child worker.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteReply {
    Written { item_id: u64, path: PathBuf },
    Failed { item_id: Option<u64>, reason: String },
}

struct ChildPipe {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl ChildPipe {
    fn spawn(program: &Path) -> io::Result<Self> {
        let mut child = Command::new(program)
            .arg(WORKER_STDIO_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| io::Error::other("child stdout not captured"))?;
        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    fn round_trip(&mut self, req: &WriteRequest) -> Result<WriteReply, ItemError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ItemError::Worker("child stdin closed".into()))?;
        let mut line = serde_json::to_vec(req).map_err(|e| ItemError::Worker(e.to_string()))?;
        line.push(b'\n');
        stdin
            .write_all(&line)
            .and_then(|_| stdin.flush())
            .map_err(|e| ItemError::Worker(format!("send request: {e}")))?;

        let mut reply = String::new();
        let n = self
            .stdout
            .read_line(&mut reply)
            .map_err(|e| ItemError::Worker(format!("read reply: {e}")))?;
        if n == 0 {
            return Err(ItemError::Worker("child exited before replying".into()));
        }
        serde_json::from_str(&reply).map_err(|e| ItemError::Worker(format!("bad reply: {e}")))
    }

    /// Close stdin so the child's read loop ends, then reap it.
    fn shutdown(mut self) {
        self.stdin.take();
        match self.child.wait() {
            Ok(status) if !status.success() => warn!("worker child exited with {}", status),
            Ok(_) => {}
            Err(e) => warn!("waiting for worker child: {}", e),
        }
    }
}

/// Drives one child process. A child that dies is replaced on the next request.
pub struct ChildProcessExecutor {
    program: PathBuf,
    worker_id: usize,
    pipe: Option<ChildPipe>,
}

impl ChildProcessExecutor {
    pub fn spawn(program: &Path, worker_id: usize) -> io::Result<Self> {
        let pipe = ChildPipe::spawn(program)?;
        debug!("worker {} started child pid {}", worker_id, pipe.child.id());
        Ok(Self {
            program: program.to_path_buf(),
            worker_id,
            pipe: Some(pipe),
        })
    }
}

impl Executor for ChildProcessExecutor {
    fn execute(&mut self, req: &WriteRequest) -> Result<PathBuf, ItemError> {
        if self.pipe.is_none() {
            let pipe = ChildPipe::spawn(&self.program)
                .map_err(|e| ItemError::Worker(format!("respawn child: {e}")))?;
            debug!("worker {} respawned child pid {}", self.worker_id, pipe.child.id());
            self.pipe = Some(pipe);
        }
        let Some(pipe) = self.pipe.as_mut() else {
            return Err(ItemError::Worker("no child process".into()));
        };
        match pipe.round_trip(req) {
            Ok(WriteReply::Written { item_id, path }) if item_id == req.item.id => Ok(path),
            Ok(WriteReply::Written { item_id, .. }) => Err(ItemError::Worker(format!(
                "reply for item {item_id}, expected {}",
                req.item.id
            ))),
            Ok(WriteReply::Failed { reason, .. }) => Err(ItemError::Worker(reason)),
            Err(e) => {
                // Protocol is out of sync or the child is gone: replace it.
                if let Some(mut pipe) = self.pipe.take() {
                    let _ = pipe.child.kill();
                    pipe.shutdown();
                }
                Err(e)
            }
        }
    }
}

impl Drop for ChildProcessExecutor {
    fn drop(&mut self) {
        if let Some(pipe) = self.pipe.take() {
            pipe.shutdown();
        }
    }
}

/// Child side: read requests from `input` until EOF, write one reply line per request.
pub fn serve_stdio<R: BufRead, W: Write>(input: R, mut output: W) -> io::Result<usize> {
    let mut served = 0_usize;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<WriteRequest>(&line) {
            Ok(req) => match write_artifact(&req) {
                Ok(path) => WriteReply::Written {
                    item_id: req.item.id,
                    path,
                },
                Err(e) => WriteReply::Failed {
                    item_id: Some(req.item.id),
                    reason: e.to_string(),
                },
            },
            Err(e) => WriteReply::Failed {
                item_id: None,
                reason: format!("bad request: {e}"),
            },
        };
        serde_json::to_writer(&mut output, &reply)?;
        output.write_all(b"\n")?;
        output.flush()?;
        served += 1;
    }
    Ok(served)
}
