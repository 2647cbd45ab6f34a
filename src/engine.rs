//! conversion execution engine
//!
//! One engine instance owns exactly one spawned process. Lifecycle:
//! spawn → `Start` event → `Progress` events in diagnostic-line arrival
//! order → exactly one terminal (`Done` on success, `Err` on failure or
//! cancellation). Materialized temp inputs are removed on every terminal
//! transition.
use crate::{
    error::Error,
    input,
    process::LineBuffer,
    progress::{Progress, ProgressParser, looks_like_error},
};
use log::debug;
use std::{
    path::PathBuf,
    pin::Pin,
    process::Stdio,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    io::AsyncWriteExt,
    process::Command,
    sync::Notify,
    time::{Instant, sleep_until},
};
use tokio_process_stream::{Item, ProcessChunkStream};
use tokio_stream::{Stream, StreamExt};

/// Window between the graceful-quit request and the unconditional kill.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Conversion event stream items.
#[derive(Debug)]
pub enum ConvertOut {
    /// Emitted once, before any output is processed; carries the display
    /// command string.
    Start(String),
    Progress(Progress),
    /// Terminal success.
    Done(ConvertOutput),
}

/// Success value of a conversion.
#[derive(Debug, PartialEq, Eq)]
pub enum ConvertOutput {
    /// Output was written to the configured path.
    Written,
    /// Captured stdout bytes (pipe output mode).
    Captured(Vec<u8>),
}

impl ConvertOutput {
    pub fn into_captured(self) -> Vec<u8> {
        match self {
            Self::Captured(bytes) => bytes,
            Self::Written => Vec::new(),
        }
    }
}

/// Requests cooperative cancellation of one conversion.
///
/// The engine first asks the executable to quit gracefully; if the process
/// is still alive after the grace window it is killed unconditionally.
/// Either way the conversion terminates with [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<CancelInner>);

#[derive(Debug, Default)]
struct CancelInner {
    requested: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.requested.store(true, Ordering::SeqCst);
        self.0.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.0.notify.notified().await;
    }
}

/// Everything the engine needs to run one conversion.
#[derive(Debug)]
pub(crate) struct ExecPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Display command for start events and error reporting.
    pub command: String,
    /// Materialized temp input to remove on terminal transitions.
    pub temp_input: Option<PathBuf>,
    /// Accumulate stdout and return it as the success value.
    pub capture: bool,
}

/// A running (or about to run) conversion: a stream of [`ConvertOut`]
/// events plus its cancellation handle.
pub struct Conversion {
    events: Pin<Box<dyn Stream<Item = Result<ConvertOut, Error>> + Send>>,
    cancel: CancelHandle,
}

impl std::fmt::Debug for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversion").finish_non_exhaustive()
    }
}

impl Conversion {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drain all events and return the terminal result.
    pub async fn wait(mut self) -> Result<ConvertOutput, Error> {
        let mut output = None;
        while let Some(event) = self.next().await {
            if let ConvertOut::Done(out) = event? {
                output = Some(out);
            }
        }
        output.ok_or_else(|| Error::ExecutionFailed {
            command: String::new(),
            detail: "conversion ended without a terminal event".to_owned(),
            stderr: String::new(),
        })
    }
}

impl Stream for Conversion {
    type Item = Result<ConvertOut, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next(cx)
    }
}

pub(crate) fn spawn(plan: ExecPlan) -> Conversion {
    let cancel = CancelHandle::default();
    Conversion {
        events: Box::pin(run(plan, cancel.clone())),
        cancel,
    }
}

fn run(plan: ExecPlan, cancel: CancelHandle) -> impl Stream<Item = Result<ConvertOut, Error>> {
    async_stream::stream! {
        let ExecPlan { program, args, command, temp_input, capture } = plan;

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(match capture {
                true => Stdio::piped(),
                false => Stdio::null(),
            })
            .stderr(Stdio::piped());

        debug!("spawning `{command}`");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                input::cleanup(&temp_input).await;
                yield Err(Error::ExecutionFailed {
                    command,
                    detail: format!("failed to spawn: {err}"),
                    stderr: String::new(),
                });
                return;
            }
        };
        // keep stdin for the graceful-quit protocol
        let mut stdin = child.stdin.take();
        let mut proc = ProcessChunkStream::from(child);

        yield Ok(ConvertOut::Start(command.clone()));

        let mut parser = ProgressParser::default();
        let mut lines = LineBuffer::default();
        let mut stderr = String::new();
        let mut stdout = Vec::new();
        let mut status = None;
        let mut cancelling = false;
        let mut kill_at: Option<Instant> = None;

        loop {
            let mut events = Vec::new();
            let mut ended = false;
            tokio::select! {
                biased;
                _ = cancel.notified(), if !cancelling => {
                    cancelling = true;
                    if let Some(mut quit) = stdin.take() {
                        // `q` asks for a clean stop, keeping output indexes sane
                        let _ = quit.write_all(b"q").await;
                        let _ = quit.flush().await;
                    }
                    kill_at = Some(Instant::now() + CANCEL_GRACE);
                }
                _ = sleep_until(kill_at.unwrap_or_else(Instant::now)), if kill_at.is_some() => {
                    debug!("cancel grace window elapsed, killing");
                    if let Some(child) = proc.child_mut() {
                        let _ = child.start_kill();
                    }
                    kill_at = None;
                }
                item = proc.next() => match item {
                    Some(Item::Stderr(chunk)) => {
                        for line in lines.push(&chunk) {
                            handle_line(&line, &mut parser, &mut stderr, &mut events);
                        }
                    }
                    Some(Item::Stdout(chunk)) => {
                        if capture {
                            stdout.extend_from_slice(&chunk);
                        }
                    }
                    Some(Item::Done(code)) => status = Some(code),
                    None => ended = true,
                },
            }
            for progress in events {
                yield Ok(ConvertOut::Progress(progress));
            }
            if ended {
                break;
            }
        }

        if let Some(rest) = lines.take_rest() {
            let mut events = Vec::new();
            handle_line(&rest, &mut parser, &mut stderr, &mut events);
            for progress in events {
                yield Ok(ConvertOut::Progress(progress));
            }
        }

        input::cleanup(&temp_input).await;

        let status = match status {
            Some(Ok(status)) => status,
            Some(Err(err)) => {
                yield Err(Error::ExecutionFailed {
                    command,
                    detail: format!("wait: {err}"),
                    stderr,
                });
                return;
            }
            None => {
                yield Err(Error::ExecutionFailed {
                    command,
                    detail: "process stream ended unexpectedly".to_owned(),
                    stderr,
                });
                return;
            }
        };

        // a cancelled run is reported as cancelled whatever the exit code
        if cancelling || cancel.is_cancelled() {
            yield Err(Error::Cancelled { command });
        } else if status.success() {
            yield Ok(ConvertOut::Done(match capture {
                true => ConvertOutput::Captured(stdout),
                false => ConvertOutput::Written,
            }));
        } else {
            yield Err(Error::ExecutionFailed {
                command,
                detail: format!("exit code {:?}", status.code()),
                stderr,
            });
        }
    }
}

fn handle_line(
    line: &str,
    parser: &mut ProgressParser,
    stderr: &mut String,
    events: &mut Vec<Progress>,
) {
    if line.trim().is_empty() {
        return;
    }
    stderr.push_str(line);
    stderr.push('\n');
    // total duration must be captured before any percent calculation
    parser.observe(line);
    if let Some(progress) = parser.parse_progress(line) {
        events.push(progress);
    } else if looks_like_error(line) {
        debug!("suspicious diagnostic: {line}");
    }
}
