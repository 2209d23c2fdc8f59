use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::rc::Rc;
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::backend::notifier::{Category, Notifier};

/// Bytes kept per captured stream; the rest is read and dropped.
pub const OUTPUT_LIMIT: usize = 32767;
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);
/// Exit status reported when the shell could not be started at all.
pub const SPAWN_FAILURE_STATUS: i32 = -1;

pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Environment overlay, merged into the inherited environment of every spawn.
pub type Env = Vec<(String, String)>;

pub type Completion = Box<dyn FnOnce(ProcOutput)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl ProcOutput {
    fn spawn_failure(cmdline: &str, err: &std::io::Error) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("failed to start `{}`: {}", cmdline, err),
            status: SPAWN_FAILURE_STATUS,
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

struct Job {
    id: JobId,
    cmdline: String,
    env: Env,
    on_complete: Option<Completion>,
}

struct Inner {
    shell: String,
    queue: RefCell<VecDeque<Job>>,
    tick: Cell<Duration>,
    ticking: Cell<bool>,
    ticks: Cell<u64>,
    in_flight: Cell<usize>,
    next_id: Cell<u64>,
}

/// FIFO spawn queue drained one job per tick.
///
/// The drain task only exists while jobs are queued and is started again by the
/// next `enqueue`. Must be driven from inside a `tokio::task::LocalSet`.
#[derive(Clone)]
pub struct Executor {
    inner: Rc<Inner>,
}

impl Executor {
    pub fn new(tick: Duration) -> Self {
        Self::with_shell(tick, DEFAULT_SHELL)
    }

    /// Run commands through `shell -c` instead of `/bin/sh -c`.
    pub fn with_shell(tick: Duration, shell: &str) -> Self {
        Self {
            inner: Rc::new(Inner {
                shell: shell.to_string(),
                queue: RefCell::new(VecDeque::new()),
                tick: Cell::new(tick.max(Duration::from_millis(1))),
                ticking: Cell::new(false),
                ticks: Cell::new(0),
                in_flight: Cell::new(0),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Queue `cmdline` for `<shell> -c`. With `on_complete` the output is captured
    /// and handed over once the process exits; without it the process is detached
    /// and forgotten.
    pub fn enqueue(&self, cmdline: &str, env: Env, on_complete: Option<Completion>) -> JobId {
        let id = JobId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        self.inner.queue.borrow_mut().push_back(Job {
            id,
            cmdline: cmdline.to_string(),
            env,
            on_complete,
        });

        if !self.inner.ticking.get() {
            self.inner.ticking.set(true);
            tokio::task::spawn_local(drain(Rc::clone(&self.inner)));
        }
        id
    }

    /// Tracked spawn whose nonzero exit is reported under the `proc` category.
    pub fn general_spawn(
        &self,
        cmdline: &str,
        env: Env,
        title: &str,
        notifier: Rc<dyn Notifier>,
    ) -> JobId {
        let title = title.to_string();
        self.enqueue(
            cmdline,
            env,
            Some(Box::new(move |output: ProcOutput| {
                if !output.success() {
                    notifier.notify(
                        Category::Proc,
                        &format!("'{}' exited with status {}", title, output.status),
                        Some(output.stderr.trim()),
                    );
                }
            })),
        )
    }

    /// Tracked spawn as a future.
    pub async fn run(&self, cmdline: &str, env: Env) -> ProcOutput {
        let (tx, rx) = flume::bounded(1);
        self.enqueue(
            cmdline,
            env,
            Some(Box::new(move |output| {
                let _ = tx.send(output);
            })),
        );
        rx.recv_async().await.unwrap_or_else(|_| ProcOutput {
            stdout: String::new(),
            stderr: "job was dropped before completing".to_string(),
            status: SPAWN_FAILURE_STATUS,
        })
    }

    pub fn tick(&self) -> Duration {
        self.inner.tick.get()
    }

    /// Takes effect from the next drain cycle.
    pub fn set_tick(&self, tick: Duration) {
        self.inner.tick.set(tick.max(Duration::from_millis(1)));
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn is_ticking(&self) -> bool {
        self.inner.ticking.get()
    }

    /// Ticks that launched a job since creation.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.get()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.get()
    }

    pub fn is_idle(&self) -> bool {
        !self.is_ticking() && self.pending() == 0 && self.in_flight() == 0
    }

    /// Wait until every queued job has been launched. Running processes are not
    /// waited for.
    pub async fn drained(&self) {
        while self.is_ticking() || self.pending() > 0 {
            tokio::time::sleep(self.tick()).await;
        }
    }

    /// Wait until the queue is drained and every tracked job has completed,
    /// including jobs queued by completions along the way.
    pub async fn idle(&self) {
        while !self.is_idle() {
            tokio::time::sleep(self.tick()).await;
        }
    }
}

async fn drain(inner: Rc<Inner>) {
    let period = inner.tick.get();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let job = inner.queue.borrow_mut().pop_front();
        if let Some(job) = job {
            inner.ticks.set(inner.ticks.get() + 1);
            launch(&inner, job);
        }

        if inner.queue.borrow().is_empty() {
            inner.ticking.set(false);
            break;
        }
    }
}

fn launch(inner: &Rc<Inner>, job: Job) {
    let Job {
        id,
        cmdline,
        env,
        on_complete,
    } = job;

    let mut command = Command::new(&inner.shell);
    command
        .arg("-c")
        .arg(&cmdline)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null());

    let Some(done) = on_complete else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
        detach(&mut command);
        // Dropping the child does not kill it; tokio reaps it once it exits.
        match command.spawn() {
            Ok(child) => log::debug!("job {} started as pid {:?}: {}", id.0, child.id(), cmdline),
            Err(e) => log::warn!("Failed to start `{}`: {}", cmdline, e),
        }
        return;
    };

    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    inner.in_flight.set(inner.in_flight.get() + 1);

    let inner = Rc::clone(inner);
    tokio::task::spawn_local(async move {
        let output = match command.spawn() {
            Ok(child) => collect(child).await,
            Err(e) => {
                log::warn!("Failed to start `{}`: {}", cmdline, e);
                ProcOutput::spawn_failure(&cmdline, &e)
            }
        };
        log::debug!("job {} finished with status {}", id.0, output.status);
        done(output);
        inner.in_flight.set(inner.in_flight.get() - 1);
    });
}

/// Start fire-and-forget commands in their own session so they outlive us.
fn detach(command: &mut Command) {
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid()
                .map(drop)
                .map_err(std::io::Error::from)
        });
    }
}

/// stdout is read to EOF before stderr is touched.
async fn collect(mut child: Child) -> ProcOutput {
    let stdout = match child.stdout.take() {
        Some(pipe) => read_capped(pipe).await,
        None => Vec::new(),
    };
    let stderr = match child.stderr.take() {
        Some(pipe) => read_capped(pipe).await,
        None => Vec::new(),
    };

    let status = match child.wait().await {
        Ok(status) => exit_code(status),
        Err(e) => {
            log::warn!("Failed to wait for child: {}", e);
            SPAWN_FAILURE_STATUS
        }
    };

    ProcOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        status,
    }
}

async fn read_capped<R: AsyncRead + Unpin>(mut reader: R) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let room = OUTPUT_LIMIT - kept.len();
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
            Err(e) => {
                log::debug!("pipe read failed: {}", e);
                break;
            }
        }
    }
    kept
}

/// Shell convention: killed by signal N reports 128 + N.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    match status.signal() {
        Some(sig) => {
            let name = Signal::try_from(sig)
                .map(|s| s.as_str())
                .unwrap_or("unknown signal");
            log::info!("child terminated by {}", name);
            128 + sig
        }
        None => SPAWN_FAILURE_STATUS,
    }
}
