// src/core/session_runner.rs

//! Tracked background sessions: one subprocess per run.
//!
//! The runner lives on the control thread and owns every session and the
//! registry. Each child is driven by tokio tasks that only ever send
//! [`SessionEvent`]s back: output chunks while it runs, then exactly one
//! `Exited` event once all output has been forwarded. The control thread
//! applies events with [`SessionRunner::process_event`]. Events of sessions
//! that were destroyed in the meantime are dropped.

use crate::{
    constants::FINISHED_STATUS,
    core::{
        discovery::DiscoveryError,
        dispatcher::{self, CallbackDispatcher, DispatchReport},
        output::{OutputBuffer, OutputMode},
        project::Project,
        prompt::Prompter,
        registry::SessionRegistry,
        specialization::{SessionKind, SpecializationTable},
        surface::SessionSurface,
    },
    models::{CallbackPayload, ProjectContext, SessionState},
    system::{
        environment::{self, EnvironmentError},
        executor::Invocation,
    },
};
use std::{
    collections::HashMap,
    process::Stdio,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin},
    runtime::Handle,
    sync::{mpsc, oneshot},
};

const READ_CHUNK_SIZE: usize = 4096;

// --- ERRORS ---

/// The command is not offered by the project. Recoverable: the operator just
/// picks another one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{command}' is not an available command in project '{project}'.")]
pub struct UnavailableCommandError {
    pub command: String,
    pub project: String,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Unavailable(#[from] UnavailableCommandError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error("Could not start '{command_line}': {source}")]
    Spawn {
        command_line: String,
        #[source]
        source: std::io::Error,
    },
}

// --- SESSIONS ---

/// Messages from the tasks driving a child to the control thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Output { serial: u64, chunk: String },
    /// Always the last event of a session.
    Exited { serial: u64, status: String },
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub capture_output: bool,
    pub suppress_display: bool,
    pub payload: Option<CallbackPayload>,
}

/// One run of a management command.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub context: Arc<ProjectContext>,
    pub command: String,
    pub args: Vec<String>,
    /// The full invocation, as shown to the operator.
    pub command_line: String,
    pub kind: SessionKind,
    pub output: OutputBuffer,
    pub state: SessionState,
    pub exit_status: Option<String>,
    pub payload: Option<CallbackPayload>,
    pub started_at: Instant,
    serial: u64,
    input: Option<mpsc::UnboundedSender<String>>,
    kill: Option<oneshot::Sender<()>>,
}

impl Session {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// A session with no process behind it.
    #[cfg(test)]
    pub(crate) fn detached(
        context: Arc<ProjectContext>,
        command: &str,
        payload: Option<CallbackPayload>,
    ) -> Self {
        Self {
            id: format!("[{}@{}] {}", context.name, context.settings_label(), command),
            context,
            command: command.to_string(),
            args: Vec::new(),
            command_line: command.to_string(),
            kind: SessionKind::Plain,
            output: OutputBuffer::new(OutputMode::Capture),
            state: SessionState::Running,
            exit_status: None,
            payload,
            started_at: Instant::now(),
            serial: 0,
            input: None,
            kill: None,
        }
    }

    fn terminate(&mut self) {
        if let Some(kill) = self.kill.take() {
            // The driver may already be gone; the child is killed on drop then.
            let _ = kill.send(());
        }
        self.input = None;
    }
}

/// What applying an event changed.
#[derive(Debug)]
pub enum EventOutcome {
    Output { id: String, chunk: String },
    Completed {
        id: String,
        success: bool,
        status: String,
        report: Option<DispatchReport>,
    },
    /// The session no longer exists.
    Discarded,
}

/// The session id for a run, before deduplication.
pub fn session_id(context: &ProjectContext, command: &str, args: &[String]) -> String {
    format!(
        "[{}@{}] {} {}",
        context.name,
        context.settings_label(),
        command,
        args.join(" ")
    )
    .trim_end()
    .to_string()
}

// --- RUNNER ---

pub struct SessionRunner {
    runtime: Handle,
    surface: Arc<dyn SessionSurface>,
    specializations: SpecializationTable,
    max_lines: usize,
    sessions: HashMap<String, Session>,
    serials: HashMap<u64, String>,
    registry: SessionRegistry,
    next_serial: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl std::fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("sessions", &self.sessions.keys().collect::<Vec<_>>())
            .field("registry", &self.registry)
            .field("max_lines", &self.max_lines)
            .finish_non_exhaustive()
    }
}

impl SessionRunner {
    pub fn new(runtime: Handle, surface: Arc<dyn SessionSurface>, max_lines: usize) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            surface,
            specializations: SpecializationTable::builtin(),
            max_lines,
            sessions: HashMap::new(),
            serials: HashMap::new(),
            registry: SessionRegistry::new(),
            next_serial: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// The sessions of a project, oldest first.
    pub fn sessions_of(&self, context: &ProjectContext) -> Vec<&Session> {
        self.registry
            .list(context.key())
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .collect()
    }

    /// Starts `command args...` for the project and returns the session id.
    ///
    /// The command must be in the project's catalog. Returns as soon as the
    /// child is spawned.
    pub fn run(
        &mut self,
        project: &mut Project,
        command: &str,
        args: &[String],
        options: RunOptions,
    ) -> Result<String, RunError> {
        let context = Arc::clone(project.context());
        if !project.list_commands(false)?.iter().any(|c| c == command) {
            return Err(UnavailableCommandError {
                command: command.to_string(),
                project: context.name.clone(),
            }
            .into());
        }

        let kind = self
            .specializations
            .resolve(command, args, project.metadata_mut())?;

        let mut env = environment::management_env_from_process(&context)?;
        kind.apply_env(&mut env);
        let full_args = std::iter::once(command.to_string()).chain(args.iter().cloned());
        let invocation = Invocation::management(&context, project.interpreter(), full_args, env);
        let command_line = invocation.display();

        let id = self.unique_id(session_id(&context, command, args));
        let serial = self.next_serial;
        self.next_serial += 1;

        let child = {
            let _guard = self.runtime.enter();
            invocation
                .async_command()
                .stdin(if kind.interactive() {
                    Stdio::piped()
                } else {
                    Stdio::null()
                })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| RunError::Spawn {
                    command_line: command_line.clone(),
                    source,
                })?
        };
        log::debug!("Started session '{}' (serial {}): {}", id, serial, command_line);

        let (kill_tx, input_tx) = self.drive(child, serial);

        let mode = if options.capture_output {
            OutputMode::Capture
        } else {
            OutputMode::Truncate {
                max_lines: self.max_lines,
            }
        };
        let session = Session {
            id: id.clone(),
            context: Arc::clone(&context),
            command: command.to_string(),
            args: args.to_vec(),
            command_line,
            kind,
            output: OutputBuffer::new(mode),
            state: SessionState::Running,
            exit_status: None,
            payload: options.payload,
            started_at: Instant::now(),
            serial,
            input: input_tx,
            kill: Some(kill_tx),
        };

        self.registry.add(context.key(), &id);
        self.serials.insert(serial, id.clone());
        if !options.suppress_display {
            self.surface.show(&session);
        }
        self.sessions.insert(id.clone(), session);
        Ok(id)
    }

    fn unique_id(&self, base: String) -> String {
        if !self.sessions.contains_key(&base) {
            return base;
        }
        let mut n = 2u64;
        loop {
            let candidate = format!("{}<{}>", base, n);
            if !self.sessions.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Spawns the tasks for a child. Returns the kill switch and, for
    /// interactive children, the input sender.
    fn drive(
        &self,
        mut child: Child,
        serial: u64,
    ) -> (oneshot::Sender<()>, Option<mpsc::UnboundedSender<String>>) {
        let (kill_tx, kill_rx) = oneshot::channel();
        let input_tx = child.stdin.take().map(|stdin| {
            let (tx, rx) = mpsc::unbounded_channel();
            self.runtime.spawn(forward_input(stdin, rx));
            tx
        });
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let events = self.events_tx.clone();
        self.runtime
            .spawn(supervise(child, serial, events, kill_rx, stdout, stderr));
        (kill_tx, input_tx)
    }

    /// Writes a line to an interactive session. Returns `false` when the session
    /// does not exist or does not take input.
    pub fn send_input(&self, id: &str, text: &str) -> bool {
        let Some(input) = self.sessions.get(id).and_then(|s| s.input.as_ref()) else {
            return false;
        };
        input.send(format!("{}\n", text)).is_ok()
    }

    /// Kills and destroys a session, after confirmation when `confirm` is set.
    /// Unknown ids are ignored. Returns whether the session was destroyed.
    pub fn kill(&mut self, id: &str, confirm: bool, prompter: &mut dyn Prompter) -> anyhow::Result<bool> {
        if !self.sessions.contains_key(id) {
            log::debug!("Kill requested for unknown session '{}'.", id);
            return Ok(false);
        }
        if confirm && !prompter.confirm(&format!("Kill session {}?", id), true)? {
            return Ok(false);
        }
        self.destroy(id);
        Ok(true)
    }

    /// Kills every session of `context` whose command matches `command_filter`
    /// (all of them without a filter). Asks once for the whole batch.
    pub fn kill_all(
        &mut self,
        context: &ProjectContext,
        command_filter: Option<&str>,
        confirm: bool,
        prompter: &mut dyn Prompter,
    ) -> anyhow::Result<usize> {
        let sessions = &self.sessions;
        let matches = |id: &str| match command_filter {
            None => true,
            Some(filter) => sessions.get(id).is_some_and(|s| s.command == filter),
        };
        let count = self
            .registry
            .list(context.key())
            .iter()
            .filter(|id| matches(id.as_str()))
            .count();
        if count == 0 {
            return Ok(0);
        }
        if confirm && !prompter.confirm(&format!("Kill {} session(s) of {}?", count, context.name), true)? {
            return Ok(0);
        }
        let targets = self.registry.remove_matching(context.key(), matches);
        let mut killed = 0;
        for id in &targets {
            if self.destroy(id) {
                killed += 1;
            }
        }
        Ok(killed)
    }

    /// Bulk teardown when a project is closed: kills everything, no questions.
    pub fn close_project(&mut self, context: &ProjectContext) -> usize {
        let ids = self.registry.clear(context.key());
        let mut killed = 0;
        for id in &ids {
            if self.destroy(id) {
                killed += 1;
            }
        }
        log::debug!("Closed project '{}': {} session(s) torn down.", context.name, killed);
        killed
    }

    fn destroy(&mut self, id: &str) -> bool {
        self.surface.detach(id);
        self.registry.remove(id);
        let Some(mut session) = self.sessions.remove(id) else {
            return false;
        };
        self.serials.remove(&session.serial);
        session.terminate();
        log::debug!("Session '{}' destroyed.", id);
        true
    }

    /// Every event queued so far, without waiting.
    pub fn pending_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Waits for the next event. The runner holds a sender, so this only
    /// returns `None` if the channel is torn down.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Applies one event. A terminal event completes the session and runs its
    /// completion handler, exactly once.
    pub fn process_event(&mut self, event: SessionEvent, dispatcher: &CallbackDispatcher) -> EventOutcome {
        match event {
            SessionEvent::Output { serial, chunk } => {
                let Some(session) = self.session_by_serial(serial) else {
                    return EventOutcome::Discarded;
                };
                session.output.push(&chunk);
                EventOutcome::Output {
                    id: session.id.clone(),
                    chunk,
                }
            }
            SessionEvent::Exited { serial, status } => {
                let Some(id) = self.serials.remove(&serial) else {
                    return EventOutcome::Discarded;
                };
                let Some(session) = self.sessions.get_mut(&id) else {
                    return EventOutcome::Discarded;
                };
                let success = dispatcher::is_success_status(&status);
                session.exit_status = Some(status.clone());
                session.input = None;
                session.kill = None;
                if !session.state.complete(success) {
                    return EventOutcome::Discarded;
                }
                log::debug!("Session '{}' {}.", id, status);
                let report = dispatcher.dispatch(session, success);
                EventOutcome::Completed {
                    id,
                    success,
                    status,
                    report,
                }
            }
        }
    }

    fn session_by_serial(&mut self, serial: u64) -> Option<&mut Session> {
        let id = self.serials.get(&serial)?;
        self.sessions.get_mut(id)
    }
}

// --- TASKS ---

async fn supervise<O, E>(
    mut child: Child,
    serial: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    kill_rx: oneshot::Receiver<()>,
    stdout: Option<O>,
    stderr: Option<E>,
) where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    let readers: Vec<_> = [
        stdout.map(|s| tokio::spawn(forward_output(s, serial, events.clone()))),
        stderr.map(|s| tokio::spawn(forward_output(s, serial, events.clone()))),
    ]
    .into_iter()
    .flatten()
    .collect();

    // A dropped kill sender counts as a kill request too.
    let waited = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill_rx => None,
    };

    let status = match waited {
        Some(status) => {
            for reader in readers {
                let _ = reader.await;
            }
            status
        }
        None => {
            let _ = child.start_kill();
            // Grandchildren may hold the pipes open; nobody reads this session anymore.
            for reader in &readers {
                reader.abort();
            }
            child.wait().await
        }
    };

    let status = match status {
        Ok(status) if status.success() => FINISHED_STATUS.to_string(),
        Ok(status) => match status.code() {
            Some(code) => format!("exited abnormally with code {}", code),
            None => "killed".to_string(),
        },
        Err(e) => format!("failed: {}", e),
    };
    let _ = events.send(SessionEvent::Exited { serial, status });
}

async fn forward_output<R>(mut reader: R, serial: u64, events: mpsc::UnboundedSender<SessionEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut pending = Vec::new();
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        pending.extend_from_slice(buf.get(..n).unwrap_or_default());
        let chunk = take_utf8(&mut pending);
        if chunk.is_empty() {
            continue;
        }
        if events.send(SessionEvent::Output { serial, chunk }).is_err() {
            return;
        }
    }
    if !pending.is_empty() {
        let chunk = String::from_utf8_lossy(&pending).into_owned();
        let _ = events.send(SessionEvent::Output { serial, chunk });
    }
}

/// Decodes the complete UTF-8 in `pending`, leaving a trailing partial
/// character there for the next read. Invalid bytes become U+FFFD.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        match std::str::from_utf8(pending.as_slice()) {
            Ok(text) => {
                out.push_str(text);
                pending.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                let prefix = pending.get(..valid).unwrap_or_default();
                out.push_str(std::str::from_utf8(prefix).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + len);
                    }
                    None => {
                        pending.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}

async fn forward_input(mut stdin: ChildStdin, mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        if stdin.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if stdin.flush().await.is_err() {
            break;
        }
    }
}
