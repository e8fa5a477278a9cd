//! Generic runtime.
//!
//! A single dispatch loop that races the next link event against the next
//! input line, feeds the result through the state machines, and executes the
//! actions they return.
//!
//! ```text
//!  link event ──> Connection ──ConnectionAction──┐
//!                     ^                          │ Emit(event)
//!                     │ send(payload)            v
//!  input line ──> App ──> LockClient ──ClientAction──> sink / App
//! ```
//!
//! All work is queued and drained in FIFO order, so requests reach the link
//! in the order they were issued.
//! A request frame the link refuses is handed back to the client, which
//! undoes what it assumed about the request.

use std::collections::VecDeque;

use distlock_client::{ClientAction, ClientConfig, ClientError, ClientEvent, LockClient};
use distlock_core::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, Environment, Link, LinkEvent,
    Transport, TransportError, TransportKind,
};
use distlock_proto::Request;

use crate::{
    App, AppAction, Driver, NotificationSink, commands::parse, error::RuntimeError,
};

/// Runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Channel configuration.
    pub connection: ConnectionConfig,
    /// Lock client configuration.
    pub client: ClientConfig,
}

#[derive(Debug)]
enum Work {
    Connection(ConnectionAction),
    Client(ClientAction),
    /// Frame carrying a client request; the client hears about it if the
    /// frame is not written.
    Request { request: Request, raw: String },
}

/// Generic runtime that orchestrates the app, the client, and the channel.
pub struct Runtime<D: Driver, T: Transport, E: Environment> {
    driver: D,
    transport: T,
    env: E,
    app: App,
    client: LockClient<E>,
    connection: Connection,
    link: Option<T::Link>,
    queue: VecDeque<Work>,
}

impl<D: Driver, T: Transport, E: Environment> Runtime<D, T, E> {
    /// Create a runtime. Nothing happens until [`Runtime::run`].
    pub fn new(driver: D, transport: T, env: E, config: RuntimeConfig) -> Self {
        let (connection, actions) = Connection::open(config.connection);
        let client = LockClient::new(env.clone(), config.client);
        let queue = actions.into_iter().map(Work::Connection).collect();

        Self {
            driver,
            transport,
            env,
            app: App::new(),
            client,
            connection,
            link: None,
            queue,
        }
    }

    /// Application state.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Lock client.
    pub fn client(&self) -> &LockClient<E> {
        &self.client
    }

    /// Channel state machine.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Frontend driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Run until the user quits or input is exhausted, then close the
    /// channel.
    pub async fn run(&mut self) -> Result<(), RuntimeError<D::Error>> {
        tracing::info!("runtime started");
        self.drain().await?;

        loop {
            self.app.sync(self.client.session());
            self.driver.render(&self.app).map_err(RuntimeError::Driver)?;

            tokio::select! {
                biased;

                event = next_link_event(&mut self.link) => self.on_link_event(event)?,

                input = self.driver.next_input() => {
                    match input.map_err(RuntimeError::Driver)? {
                        Some(line) => {
                            if !self.on_input(&line) {
                                break;
                            }
                        },
                        None => break,
                    }
                },
            }

            self.drain().await?;
        }

        self.shutdown().await
    }

    async fn shutdown(&mut self) -> Result<(), RuntimeError<D::Error>> {
        tracing::info!("runtime stopping");
        let actions = self.connection.close();
        self.enqueue_connection(actions);
        self.drain().await?;

        self.app.sync(self.client.session());
        self.driver.render(&self.app).map_err(RuntimeError::Driver)?;
        self.driver.stop();
        Ok(())
    }

    /// Returns false when the user asked to quit.
    fn on_input(&mut self, line: &str) -> bool {
        let command = parse(line);
        match self.app.on_command(command, self.client.session()) {
            AppAction::Client(event) => {
                let is_lock = matches!(
                    event,
                    ClientEvent::RequestLock(_)
                        | ClientEvent::ReleaseLock(_)
                        | ClientEvent::RequestLocks(_)
                        | ClientEvent::ReleaseLocks(_)
                );
                match self.client.handle(event) {
                    Ok(actions) => {
                        if is_lock {
                            self.app.lock_issued();
                        }
                        self.enqueue_client(actions);
                    },
                    Err(error) => self.reject(&error),
                }
                true
            },
            AppAction::Reject(reason) => {
                self.driver.sink().rejected(&reason);
                true
            },
            AppAction::Ignore => true,
            AppAction::Quit => false,
        }
    }

    fn on_link_event(&mut self, event: Option<LinkEvent>) -> Result<(), RuntimeError<D::Error>> {
        match event {
            Some(LinkEvent::Frame(raw)) => match self.connection.frame_received(raw) {
                Ok(actions) => self.enqueue_connection(actions),
                Err(error) => tracing::warn!(%error, "dropping frame"),
            },
            Some(LinkEvent::Closed) => {
                self.link = None;
                let actions = self.connection.remote_closed();
                self.enqueue_connection(actions);
            },
            Some(LinkEvent::Lost(detail)) => self.link_lost(&detail)?,
            None => self.link_lost("link ended")?,
        }
        Ok(())
    }

    fn link_lost(&mut self, detail: &str) -> Result<(), RuntimeError<D::Error>> {
        self.link = None;
        if self.connection.state() == ConnectionState::Open {
            let actions = self.connection.connection_lost(detail)?;
            self.enqueue_connection(actions);
        } else {
            tracing::debug!(state = %self.connection.state(), detail, "link ended outside open state");
        }
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), RuntimeError<D::Error>> {
        while let Some(work) = self.queue.pop_front() {
            match work {
                Work::Connection(action) => self.execute_connection(action).await?,
                Work::Client(action) => self.execute_client(action),
                Work::Request { request, raw } => {
                    if !self.transmit(raw).await? {
                        let actions = self.client.send_failed(&request);
                        self.enqueue_client(actions);
                    }
                },
            }
        }
        Ok(())
    }

    async fn execute_connection(
        &mut self,
        action: ConnectionAction,
    ) -> Result<(), RuntimeError<D::Error>> {
        match action {
            ConnectionAction::Connect { transport, delay } => {
                if !delay.is_zero() {
                    self.env.sleep(delay).await;
                }
                self.connect(transport).await?;
            },
            ConnectionAction::Transmit(raw) => {
                self.transmit(raw).await?;
            },
            ConnectionAction::Disconnect => {
                if let Some(mut link) = self.link.take() {
                    link.close().await;
                }
            },
            ConnectionAction::Emit(event) => {
                let actions = self.client.on_channel_event(event);
                self.enqueue_client(actions);
            },
        }
        Ok(())
    }

    async fn connect(&mut self, kind: TransportKind) -> Result<(), RuntimeError<D::Error>> {
        match self.transport.connect(kind).await {
            Ok(link) => {
                self.link = Some(link);
                let actions = self.connection.opened(kind)?;
                self.enqueue_connection(actions);
            },
            Err(error) => {
                let reason = error.to_string();
                let actions = match self.connection.state() {
                    ConnectionState::Connecting => {
                        self.connection.negotiation_failed(kind, &reason)?
                    },
                    ConnectionState::Reconnecting => self.connection.reconnect_failed(&reason)?,
                    state => {
                        tracing::debug!(%state, %reason, "ignoring late connect failure");
                        Vec::new()
                    },
                };
                self.enqueue_connection(actions);
            },
        }
        Ok(())
    }

    /// Returns whether the frame was written to the link.
    async fn transmit(&mut self, raw: String) -> Result<bool, RuntimeError<D::Error>> {
        let Some(link) = self.link.as_mut() else {
            tracing::warn!("transmit without a link");
            return Ok(false);
        };

        match link.send(raw).await {
            Ok(()) => return Ok(true),
            Err(TransportError::Closed) => self.link_lost("link closed during send")?,
            Err(error) => {
                let actions = self.connection.fault(&error.to_string());
                self.enqueue_connection(actions);
            },
        }
        Ok(false)
    }

    fn execute_client(&mut self, action: ClientAction) {
        match action {
            ClientAction::Send { request, payload } => match self.connection.send(payload) {
                Ok(actions) => {
                    tracing::debug!(action = %request.action(), "request queued");
                    for action in actions {
                        let work = match action {
                            ConnectionAction::Transmit(raw) => {
                                Work::Request { request: request.clone(), raw }
                            },
                            other => Work::Connection(other),
                        };
                        self.queue.push_back(work);
                    }
                },
                Err(error) => self.reject(&ClientError::from(error)),
            },
            ClientAction::Deliver(notification) => self.driver.sink().notification(&notification),
            ClientAction::Audit(event) => self.driver.sink().audit(&event),
            ClientAction::Inform(info) => self.driver.sink().info(&info),
            ClientAction::EnableInput => self.app.enable_input(),
        }
    }

    fn reject(&mut self, error: &ClientError) {
        tracing::debug!(%error, fatal = error.is_fatal(), "request rejected");
        self.driver.sink().rejected(&error.to_string());
    }

    fn enqueue_connection(&mut self, actions: Vec<ConnectionAction>) {
        self.queue.extend(actions.into_iter().map(Work::Connection));
    }

    fn enqueue_client(&mut self, actions: Vec<ClientAction>) {
        self.queue.extend(actions.into_iter().map(Work::Client));
    }
}

async fn next_link_event<L: Link>(link: &mut Option<L>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}
