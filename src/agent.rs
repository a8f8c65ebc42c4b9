//! The agent orchestrator.

use crate::callbacks::{CallbackRegistry, Delivery, Registration};
use crate::command::LaunchCommand;
use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::event_log::EventLog;
use crate::interrupt::InterruptController;
use crate::message::{self, UserMessage};
use crate::process::{ProcessHandle, ProcessInput};
use crate::prompt;
use crate::stream::EventReader;
use parking_lot::{ReentrantMutex, RwLock};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// A session with one long-running agent CLI process.
///
/// `connect` runs the read loop on the calling thread; every other method
/// takes `&self`, so share the agent in an `Arc` to ask, interrupt or exit
/// from another thread while it is connected.
pub struct Agent {
    config: AgentConfig,
    log: EventLog,
    callbacks: CallbackRegistry,
    interrupts: InterruptController,
    input: RwLock<Option<Arc<ProcessInput>>>,
    running: AtomicBool,
    session_id: RwLock<Option<String>>,
    dispatch: ReentrantMutex<()>,
}

impl Agent {
    /// Creates an agent with an empty history and no listeners.
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self::with_callbacks(config, CallbackRegistry::new())
    }

    /// Starts a builder that collects listeners before the agent exists.
    #[must_use]
    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder {
            config,
            callbacks: CallbackRegistry::new(),
        }
    }

    fn with_callbacks(config: AgentConfig, callbacks: CallbackRegistry) -> Self {
        let session_id = config.session_key.clone();
        Self {
            config,
            log: EventLog::new(),
            callbacks,
            interrupts: InterruptController::new(),
            input: RwLock::new(None),
            running: AtomicBool::new(false),
            session_id: RwLock::new(session_id),
            dispatch: ReentrantMutex::new(()),
        }
    }

    /// Spawns the process and runs the read loop until its output closes.
    ///
    /// # Errors
    ///
    /// See [`Agent::connect_with`].
    pub fn connect(&self) -> Result<Vec<Arc<Event>>> {
        self.connect_with(|_| Ok(()))
    }

    /// Spawns the process, runs `setup` once the streams are piped, then runs
    /// the read loop until the output closes.
    ///
    /// Returns the full history. The connection is cleared on every path and
    /// every failure is reported to the error listener once before it is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedTemplate`] if the system prompt still holds
    /// template syntax, [`Error::AlreadyConnected`] if a session is running,
    /// [`Error::SpawnFailed`] if the process cannot start, whatever `setup`
    /// returns, and [`Error::ProcessFailed`] if the process exits unsuccessfully.
    pub fn connect_with<F>(&self, setup: F) -> Result<Vec<Arc<Event>>>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        let span = info_span!("agent", name = %self.config.name);
        let _entered = span.enter();
        let result = self.run_session(setup);
        if let Err(ref e) = result {
            warn!(error = %e, "agent session failed");
            // Write failures surface from `ask` or `interrupt` inside setup,
            // which already reported them.
            if !matches!(e, Error::StdinWriteFailed { .. }) {
                self.callbacks.notify_error(e);
            }
        }
        result
    }

    fn run_session<F>(&self, setup: F) -> Result<Vec<Arc<Event>>>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        prompt::ensure_resolved(&self.config.system_prompt)?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyConnected);
        }
        let result = self.drive(setup);
        if let Some(input) = self.input.write().take() {
            input.close();
        }
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn drive<F>(&self, setup: F) -> Result<Vec<Arc<Event>>>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        let launch = LaunchCommand::for_config(&self.config);
        if let Some(ref dir) = launch.working_dir {
            std::fs::create_dir_all(dir).map_err(|e| Error::SpawnFailed { source: e })?;
        }
        let (mut process, input, stdout) = ProcessHandle::spawn(launch.to_command())?;
        *self.input.write() = Some(Arc::new(input));

        setup(self)?;

        let decoded = EventReader::new(stdout).for_each_event(|event| self.record(event));
        debug!(decoded, "agent output closed");
        if let Some(input) = self.input.write().take() {
            input.close();
        }
        process.wait()?;
        info!(events = self.log.len(), "agent session finished");
        Ok(self.log.snapshot())
    }

    /// Sends `text` from the default sender.
    ///
    /// # Errors
    ///
    /// See [`Agent::ask_message`].
    pub fn ask(&self, text: &str) -> Result<()> {
        self.ask_message(UserMessage::new(text))
    }

    /// Sends `text` wrapped as a system message.
    ///
    /// # Errors
    ///
    /// See [`Agent::ask_message`].
    pub fn send_system_message(&self, text: &str) -> Result<()> {
        self.ask_message(UserMessage::system(text))
    }

    /// Formats and sends one user turn.
    ///
    /// Blank text is ignored. Otherwise a local `user` event carrying the raw
    /// and formatted text is dispatched, then the turn is written to the
    /// process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] or [`Error::InputClosed`] without
    /// dispatching anything when there is nothing to write to, and the write
    /// error (after notifying the error listener) if the line cannot be
    /// written.
    pub fn ask_message(&self, message: UserMessage) -> Result<()> {
        if message.is_blank() {
            return Ok(());
        }
        let input = self.current_input().ok_or(Error::NotConnected)?;
        if input.is_closed() {
            return Err(Error::InputClosed);
        }
        let formatted = message.format();
        let session_id = self.session_id();
        let line = message::user_turn(&formatted, session_id.as_deref()).to_string();

        self.record(Event::user_turn(&message.text, &formatted, &message.sender));
        input
            .write_line(&line)
            .inspect_err(|e| self.callbacks.notify_error(e))
    }

    /// Stages a message to send once the next interrupt is acknowledged.
    ///
    /// Nothing is written now.
    pub fn ask_after_interrupt(&self, message: UserMessage) {
        self.interrupts.stage_ask(message);
    }

    /// Asks the process to interrupt its current turn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] or [`Error::InputClosed`] if there is
    /// nothing to write to, and the write error (after notifying the error
    /// listener) if the request cannot be written.
    pub fn interrupt(&self) -> Result<()> {
        let input = self.current_input().ok_or(Error::NotConnected)?;
        if input.is_closed() {
            return Err(Error::InputClosed);
        }
        let request_id = message::new_request_id();
        let line = message::interrupt_request(&request_id).to_string();
        self.interrupts.arm(request_id.as_str());
        self.record(Event::interrupt_request(&request_id));
        debug!(request_id = %request_id, "sending interrupt");
        input.write_line(&line).inspect_err(|e| {
            self.interrupts.disarm(&request_id);
            self.callbacks.notify_error(e);
        })
    }

    /// Closes the process input, letting the process finish.
    ///
    /// Does nothing without a connection. While an interrupt is in flight the
    /// close is deferred until the interrupt is acknowledged.
    pub fn exit(&self) {
        let Some(input) = self.current_input() else {
            debug!("exit without a connection");
            return;
        };
        if self.interrupts.defer_exit() {
            info!("exit deferred until the interrupt is acknowledged");
            return;
        }
        input.close();
    }

    /// Appends and dispatches a locally synthesised event.
    ///
    /// The event goes through the same pipeline as process output, including
    /// interrupt resolution.
    pub fn inject_event(&self, fields: Map<String, Value>) {
        self.record(Event::local(fields));
    }

    /// Sets the listener that receives every event.
    pub fn on_message<F>(&self, listener: F)
    where
        F: Fn(&Event, &[Arc<Event>]) + Send + Sync + 'static,
    {
        self.callbacks.set_general(listener);
    }

    /// Alias of [`Agent::on_message`].
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&Event, &[Arc<Event>]) + Send + Sync + 'static,
    {
        self.on_message(listener);
    }

    /// Sets the listener that receives connect, ask and interrupt failures.
    pub fn on_error<F>(&self, listener: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.callbacks.set_error_listener(listener);
    }

    /// Registers `listener` under `name`: a named callback if
    /// [`Agent::create_message_callback`] declared a processor with that name,
    /// a typed listener for dispatch key `name` otherwise.
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> Registration
    where
        F: Fn(&Delivery<'_>) + Send + Sync + 'static,
    {
        self.callbacks.register(name, listener)
    }

    /// Adds a typed listener for a dispatch key.
    pub fn on_typed<F>(&self, key: impl Into<String>, listener: F)
    where
        F: Fn(&Event, &[Arc<Event>]) + Send + Sync + 'static,
    {
        self.callbacks.register_typed(key, listener);
    }

    /// Declares a processor for a later [`Agent::on`] under the same name.
    pub fn create_message_callback<P>(&self, name: impl Into<String>, processor: P)
    where
        P: Fn(&Event, &[Arc<Event>]) -> Option<Value> + Send + Sync + 'static,
    {
        self.callbacks.declare_processor(name, processor);
    }

    /// Registers a processor and listener pair in one call.
    pub fn on_named<P, F>(&self, name: impl Into<String>, processor: P, listener: F)
    where
        P: Fn(&Event, &[Arc<Event>]) -> Option<Value> + Send + Sync + 'static,
        F: Fn(&Value, &Event) + Send + Sync + 'static,
    {
        self.callbacks.register_named(name, processor, listener);
    }

    /// The callback registry.
    #[must_use]
    pub const fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// The interrupt controller.
    #[must_use]
    pub const fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    /// A copy of the history so far.
    #[must_use]
    pub fn history(&self) -> Vec<Arc<Event>> {
        self.log.snapshot()
    }

    /// Whether a process is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.input.read().is_some()
    }

    /// Whether the process input has been closed, or there is no process.
    #[must_use]
    pub fn is_input_closed(&self) -> bool {
        self.current_input().map_or(true, |input| input.is_closed())
    }

    /// The session id reported by the process, or the configured resume key.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// The agent name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configuration the agent was built with.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn current_input(&self) -> Option<Arc<ProcessInput>> {
        self.input.read().clone()
    }

    fn record(&self, event: Event) {
        let _order = self.dispatch.lock();
        if !event.is_local() {
            if let Some(id) = event.session_id() {
                self.remember_session(id);
            }
        }
        let event = Arc::new(event);
        let history = self.log.append(Arc::clone(&event));
        self.callbacks
            .dispatch_with(&event, &history, |event| self.resolve_interrupt(event));
    }

    fn remember_session(&self, id: &str) {
        let mut current = self.session_id.write();
        if current.as_deref() != Some(id) {
            debug!(session_id = id, "session id updated");
            *current = Some(id.to_string());
        }
    }

    fn resolve_interrupt(&self, event: &Event) {
        if event.event_type() != Some("control_response") || !self.interrupts.is_armed() {
            return;
        }
        let Some(ack) = self.interrupts.acknowledge(event) else {
            debug!("control response does not match the in-flight interrupt");
            return;
        };
        info!(request_id = %ack.request_id, "interrupt acknowledged");
        if let Some(message) = ack.replay {
            if let Err(e) = self.ask_message(message) {
                warn!(error = %e, "failed to send the ask staged for after the interrupt");
            }
        }
        if ack.exit {
            if let Some(input) = self.current_input() {
                input.close();
            }
        }
    }
}

/// Collects listeners for an [`Agent`] before it is built.
pub struct AgentBuilder {
    config: AgentConfig,
    callbacks: CallbackRegistry,
}

impl AgentBuilder {
    /// Sets the listener that receives every event.
    #[must_use]
    pub fn on_event<F>(self, listener: F) -> Self
    where
        F: Fn(&Event, &[Arc<Event>]) + Send + Sync + 'static,
    {
        self.callbacks.set_general(listener);
        self
    }

    /// Registers a listener under a name; see [`Agent::on`].
    #[must_use]
    pub fn on<F>(self, name: impl Into<String>, listener: F) -> Self
    where
        F: Fn(&Delivery<'_>) + Send + Sync + 'static,
    {
        self.callbacks.register(name, listener);
        self
    }

    /// Adds a typed listener for a dispatch key.
    #[must_use]
    pub fn on_typed<F>(self, key: impl Into<String>, listener: F) -> Self
    where
        F: Fn(&Event, &[Arc<Event>]) + Send + Sync + 'static,
    {
        self.callbacks.register_typed(key, listener);
        self
    }

    /// Declares a processor for a later `on` under the same name.
    #[must_use]
    pub fn message_callback<P>(self, name: impl Into<String>, processor: P) -> Self
    where
        P: Fn(&Event, &[Arc<Event>]) -> Option<Value> + Send + Sync + 'static,
    {
        self.callbacks.declare_processor(name, processor);
        self
    }

    /// Registers a processor and listener pair.
    #[must_use]
    pub fn on_named<P, F>(self, name: impl Into<String>, processor: P, listener: F) -> Self
    where
        P: Fn(&Event, &[Arc<Event>]) -> Option<Value> + Send + Sync + 'static,
        F: Fn(&Value, &Event) + Send + Sync + 'static,
    {
        self.callbacks.register_named(name, processor, listener);
        self
    }

    /// Sets the error listener.
    #[must_use]
    pub fn on_error<F>(self, listener: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.callbacks.set_error_listener(listener);
        self
    }

    /// Builds the agent.
    #[must_use]
    pub fn build(self) -> Agent {
        Agent::with_callbacks(self.config, self.callbacks)
    }
}
