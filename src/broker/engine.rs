//! Broker engine
//!
//! This module contains the UDP broker server responsible for:
//! - reading envelopes from the socket and routing them by command
//! - registering subscribers and acknowledging their registration
//! - enqueuing published events into the matching subscribers' buffers
//! - running one dispatch loop per subscriber that drains its buffer
//!
//! Concurrency and usage notes:
//! - The server is shared as `Arc<BrokerServer>`. `start` runs the read loop
//!   and `dispatch_event_publisher` the supervisory scan; both run until their
//!   stop signal fires.
//! - No lock is held across socket I/O. The registry lock only guards the
//!   subscriber map and every buffer has its own lock.
//! - A failed send leaves the event at the front of the subscriber's buffer,
//!   so a destination that keeps failing blocks the events queued behind it.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::broker::registry::{Registration, Registry};
use crate::broker::subscriber::{Subscriber, subscriber_id};
use crate::config::{BrokerSettings, Settings};
use crate::transport::message::REGISTRATION_SUCCESS;
use crate::transport::{Command, Envelope, EventPayload, MAX_DATAGRAM_SIZE, decode, encode};
use crate::utils::signal::{self, StopSignal};
use crate::utils::{BrokerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Listening,
    Stopping,
}

#[derive(Debug)]
pub struct BrokerServer {
    socket: RwLock<Option<Arc<UdpSocket>>>,
    local_addr: SocketAddr,
    registry: Registry,
    state: Mutex<ServerState>,
    closed: Notify,
    dispatch_interval: Duration,
}

impl BrokerServer {
    /// Binds the broker socket to `host:port`. Port 0 picks a free port.
    pub async fn bind(host: &str, port: u16, settings: &BrokerSettings) -> Result<Self> {
        settings.validate()?;
        let socket = UdpSocket::bind((host, port)).await?;
        Self::from_socket(socket, settings)
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        Self::bind(&settings.server.host, settings.server.port, &settings.broker).await
    }

    /// Wraps a socket the caller already bound.
    pub fn from_socket(socket: UdpSocket, settings: &BrokerSettings) -> Result<Self> {
        settings.validate()?;
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket: RwLock::new(Some(Arc::new(socket))),
            local_addr,
            registry: Registry::new(settings.buffer_capacity),
            state: Mutex::new(ServerState::Stopped),
            closed: Notify::new(),
            dispatch_interval: settings.dispatch_interval(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> ServerState {
        *self.lock_state()
    }

    /// Runs the inbound read loop until `stop` fires or the connection is
    /// closed, then closes the socket.
    ///
    /// A datagram that fails to decode or route is logged and dropped; it
    /// never ends the loop.
    pub async fn start(&self, mut stop: StopSignal) -> Result<()> {
        let socket = self.socket()?;
        self.begin_listening()?;
        info!(addr = %self.local_addr, "broker listening");

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            tokio::select! {
                _ = signal::stopped(&mut stop) => break,
                _ = self.closed.notified() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok((n, addr)) => {
                        if let Err(e) = self.handle_datagram(&socket, &buf[..n], addr).await {
                            warn!(from = %addr, error = %e, "unable to process datagram");
                        }
                    }
                    Err(e) => error!(error = %e, "udp receive error"),
                },
            }
        }

        self.set_state(ServerState::Stopping);
        drop(socket);
        if self.close_conn().is_ok() {
            debug!("broker socket closed");
        }
        self.set_state(ServerState::Stopped);
        info!(addr = %self.local_addr, "broker stopped");
        Ok(())
    }

    /// Supervisory scan: every dispatch interval, spawns a dispatch loop for
    /// each subscriber that does not have one yet.
    ///
    /// On stop it waits for the spawned loops to finish.
    pub async fn dispatch_event_publisher(self: Arc<Self>, mut stop: StopSignal) {
        let mut ticker = tokio::time::interval(self.dispatch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut loops = JoinSet::new();

        loop {
            tokio::select! {
                _ = signal::stopped(&mut stop) => break,
                _ = ticker.tick() => {
                    for subscriber in self.registry.snapshot() {
                        if subscriber.is_active() && subscriber.try_begin_dispatch() {
                            debug!(subscriber = ?subscriber.info(), "dispatch for subscriber");
                            loops.spawn(
                                Arc::clone(&self).run_dispatch_loop(subscriber, stop.clone()),
                            );
                        }
                    }
                    while let Some(finished) = loops.try_join_next() {
                        if let Err(e) = finished {
                            error!(error = %e, "dispatch loop panicked");
                        }
                    }
                }
            }
        }

        while let Some(finished) = loops.join_next().await {
            if let Err(e) = finished {
                error!(error = %e, "dispatch loop panicked");
            }
        }
        debug!("dispatch publisher stopped");
    }

    /// Publishes `event_name` to every subscriber registered under `topic`.
    ///
    /// Returns how many buffers accepted the event. Every matching subscriber
    /// is attempted; if any buffer was full the first failure is returned.
    /// The empty topic is reserved for broadcast-only subscribers and is
    /// rejected with `EmptyTopic`; use `publish_event_to_all` to reach them.
    pub fn publish_event(&self, topic: &str, event_name: &str, note: &str) -> Result<usize> {
        if topic.is_empty() {
            return Err(BrokerError::EmptyTopic);
        }
        let envelope = Envelope::event(note, &EventPayload::new(event_name))?;
        ensure_fits_datagram(&envelope)?;

        let targets = self.registry.matching(topic);
        if targets.is_empty() {
            return Err(BrokerError::NoSubscriber(topic.to_string()));
        }
        self.enqueue(&targets, envelope)
    }

    /// Broadcasts `event_name` with `data` to every subscriber, whatever its topic.
    pub fn publish_event_to_all(&self, event_name: &str, data: Value) -> Result<usize> {
        if data.is_null() {
            return Err(BrokerError::NilPayload);
        }
        let envelope = Envelope::event("", &EventPayload::new(event_name).with_data(data))?;
        ensure_fits_datagram(&envelope)?;

        let targets = self.registry.snapshot();
        if targets.is_empty() {
            return Err(BrokerError::NoSubscriber("*".to_string()));
        }
        self.enqueue(&targets, envelope)
    }

    /// Closes the broker socket. Fails if it is already closed.
    pub fn close_conn(&self) -> Result<()> {
        let socket = self
            .socket
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match socket {
            Some(_) => {
                self.closed.notify_one();
                Ok(())
            }
            None => Err(BrokerError::ConnectionClosed),
        }
    }

    async fn handle_datagram(
        &self,
        socket: &UdpSocket,
        bytes: &[u8],
        addr: SocketAddr,
    ) -> Result<()> {
        let envelope = decode(bytes)?;
        match envelope.command {
            Command::Register => self.handle_register(socket, &envelope, addr).await,
            Command::Unregister => {
                let removed = self.registry.unregister(&subscriber_id(&addr))?;
                info!(subscriber = %removed.id, "subscriber unregistered");
                Ok(())
            }
            Command::Event | Command::Info => {
                debug!(from = %addr, command = ?envelope.command, "ignoring client command");
                Ok(())
            }
            Command::Unknown => Err(BrokerError::UnknownCommand),
        }
    }

    async fn handle_register(
        &self,
        socket: &UdpSocket,
        envelope: &Envelope,
        addr: SocketAddr,
    ) -> Result<()> {
        let topic = envelope.register_payload()?.topic;
        match self.registry.register(&subscriber_id(&addr), addr, &topic) {
            Registration::Created(s) => info!(
                subscriber = %s.id,
                topic = %s.topic,
                registered_at = %s.registered_at,
                "subscriber registered"
            ),
            Registration::Existing(s) => info!(subscriber = %s.id, "subscriber exists"),
        }

        let ack = encode(&Envelope::info(REGISTRATION_SUCCESS))?;
        socket
            .send_to(&ack, addr)
            .await
            .map_err(BrokerError::SendFailure)?;
        Ok(())
    }

    async fn run_dispatch_loop(self: Arc<Self>, subscriber: Arc<Subscriber>, mut stop: StopSignal) {
        loop {
            if signal::is_stopped(&stop) || !subscriber.is_active() {
                break;
            }
            if self.state() != ServerState::Listening || subscriber.buffer.is_empty() {
                if !self.pause(&mut stop).await {
                    break;
                }
                continue;
            }

            // The head stays queued until it is sent, so a failed send keeps
            // it first in line and publishers cannot take its slot meanwhile.
            // Only this loop removes items from the buffer.
            let envelope = match subscriber.buffer.peek_front() {
                Ok(envelope) => envelope,
                Err(BrokerError::BufferEmpty) => continue,
                Err(e) => {
                    error!(subscriber = %subscriber.id, error = %e, "peek fail");
                    if !self.pause(&mut stop).await {
                        break;
                    }
                    continue;
                }
            };

            match self.deliver(&envelope, subscriber.address).await {
                Ok(()) => {
                    if let Err(e) = subscriber.buffer.pop_front() {
                        error!(subscriber = %subscriber.id, error = %e, "pop fail");
                    }
                }
                Err(e) => {
                    warn!(
                        subscriber = %subscriber.id,
                        delivery_id = envelope.delivery_id().unwrap_or_default(),
                        error = %e,
                        "send data fail, retrying"
                    );
                    if !self.pause(&mut stop).await {
                        break;
                    }
                }
            }
        }

        if !subscriber.is_active() {
            let discarded = subscriber.buffer.clear();
            debug!(subscriber = %subscriber.id, discarded, "buffer discarded");
        }
        subscriber.end_dispatch();
        debug!(subscriber = %subscriber.id, "dispatch loop stopped");
    }

    async fn deliver(&self, envelope: &Envelope, addr: SocketAddr) -> Result<()> {
        let bytes = encode(envelope)?;
        let socket = self.socket()?;
        socket
            .send_to(&bytes, addr)
            .await
            .map_err(BrokerError::SendFailure)?;
        debug!(to = %addr, bytes = bytes.len(), "event sent");
        Ok(())
    }

    fn enqueue(&self, targets: &[Arc<Subscriber>], envelope: Envelope) -> Result<usize> {
        let mut accepted = 0;
        let mut first_error = None;
        for subscriber in targets {
            match subscriber.buffer.push_back(envelope.clone()) {
                Ok(()) => accepted += 1,
                Err(e) => {
                    warn!(subscriber = %subscriber.id, error = %e, "unable to push data to buffer");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(accepted),
        }
    }

    /// Sleeps one dispatch interval. Returns false if stopped meanwhile.
    async fn pause(&self, stop: &mut StopSignal) -> bool {
        tokio::select! {
            _ = signal::stopped(stop) => false,
            _ = tokio::time::sleep(self.dispatch_interval) => true,
        }
    }

    fn socket(&self) -> Result<Arc<UdpSocket>> {
        self.socket
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(BrokerError::ConnectionClosed)
    }

    fn begin_listening(&self) -> Result<()> {
        let mut state = self.lock_state();
        if *state != ServerState::Stopped {
            return Err(BrokerError::AlreadyListening);
        }
        *state = ServerState::Listening;
        Ok(())
    }

    fn set_state(&self, next: ServerState) {
        *self.lock_state() = next;
    }

    fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn ensure_fits_datagram(envelope: &Envelope) -> Result<()> {
    let size = encode(envelope)?.len();
    if size > MAX_DATAGRAM_SIZE {
        return Err(BrokerError::PayloadTooLarge {
            size,
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(())
}
