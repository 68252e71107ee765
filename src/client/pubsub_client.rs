use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, error, info, warn};

use crate::client::processor::ProcessorSet;
use crate::config::Settings;
use crate::transport::{Command, Envelope, MAX_DATAGRAM_SIZE, decode, encode};
use crate::utils::signal::{self, StopSignal};
use crate::utils::{BrokerError, Result};

/// Pause after a failed receive before reading again.
const RECV_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Registering,
    Listening,
    Stopped,
}

/// Subscriber side of the broker.
///
/// Owns a UDP socket connected to the broker, so only datagrams coming from
/// the broker are read. Each inbound event is fanned out to every processor
/// whose event set names it.
#[derive(Debug)]
pub struct SubscriberClient {
    server_addr: SocketAddr,
    topic: String,
    processors: ProcessorSet,
    socket: UdpSocket,
    state: Mutex<ClientState>,
}

impl SubscriberClient {
    /// Resolves the broker at `server_host:port` and connects a local socket
    /// to it. Nothing is sent until [`start_listen`](Self::start_listen).
    pub async fn connect(
        server_host: &str,
        port: u16,
        topic: impl Into<String>,
        processors: impl Into<ProcessorSet>,
    ) -> Result<Self> {
        let server_addr = lookup_host((server_host, port)).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("cannot resolve {server_host}:{port}"),
            )
        })?;

        let bind_addr: SocketAddr = if server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server_addr).await?;

        let processors = processors.into();
        if !processors.has_events() {
            warn!("no event processor has any event, inbound events will be rejected");
        }

        Ok(Self {
            server_addr,
            topic: topic.into(),
            processors,
            socket,
            state: Mutex::new(ClientState::Idle),
        })
    }

    pub async fn from_settings(
        settings: &Settings,
        processors: impl Into<ProcessorSet>,
    ) -> Result<Self> {
        Self::connect(
            &settings.server.host,
            settings.server.port,
            settings.client.topic.clone(),
            processors,
        )
        .await
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The address the broker sees this client as.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn state(&self) -> ClientState {
        *self.lock_state()
    }

    /// Registers the topic with the broker, then reads events until `stop`
    /// fires.
    ///
    /// Failing to send the registration ends the session with
    /// `RegistrationFailure`. On stop an unregister is sent best-effort.
    pub async fn start_listen(&self, mut stop: StopSignal) -> Result<()> {
        self.begin_registering()?;
        if let Err(e) = self.register().await {
            error!(server = %self.server_addr, error = %e, "subscribe err");
            self.set_state(ClientState::Stopped);
            return Err(e);
        }
        self.set_state(ClientState::Listening);
        info!(server = %self.server_addr, topic = %self.topic, "client listening");

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            tokio::select! {
                _ = signal::stopped(&mut stop) => break,
                received = self.socket.recv(&mut buf) => match received {
                    Ok(n) => {
                        if let Err(e) = self.handle_datagram(&buf[..n]) {
                            warn!(error = %e, "unable to process datagram");
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "server read error");
                        tokio::select! {
                            _ = signal::stopped(&mut stop) => break,
                            _ = tokio::time::sleep(RECV_RETRY_DELAY) => {}
                        }
                    }
                },
            }
        }

        self.unregister().await;
        self.set_state(ClientState::Stopped);
        info!(server = %self.server_addr, "client stopped");
        Ok(())
    }

    pub(crate) fn handle_datagram(&self, bytes: &[u8]) -> Result<()> {
        let envelope = decode(bytes)?;
        match envelope.command {
            Command::Event => {
                let event = envelope.event_payload()?;
                let invoked =
                    self.processors
                        .dispatch(&self.topic, &event.event, &envelope.payload)?;
                debug!(event = %event.event, delivery_id = %event.uuid, invoked, "event processed");
                Ok(())
            }
            Command::Info => {
                info!(note = %envelope.note, "server says");
                Ok(())
            }
            Command::Register | Command::Unregister => {
                debug!(command = ?envelope.command, "ignoring server command");
                Ok(())
            }
            Command::Unknown => Err(BrokerError::UnknownCommand),
        }
    }

    async fn register(&self) -> Result<()> {
        let bytes = encode(&Envelope::register(self.topic.clone())?)?;
        debug!(topic = %self.topic, "sending registration");
        self.socket
            .send(&bytes)
            .await
            .map_err(BrokerError::RegistrationFailure)?;
        Ok(())
    }

    async fn unregister(&self) {
        let sent = match encode(&Envelope::unregister()) {
            Ok(bytes) => self.socket.send(&bytes).await.map_err(BrokerError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            debug!(error = %e, "unregister not sent");
        }
    }

    fn begin_registering(&self) -> Result<()> {
        let mut state = self.lock_state();
        if *state != ClientState::Idle {
            return Err(BrokerError::AlreadyListening);
        }
        *state = ClientState::Registering;
        Ok(())
    }

    fn set_state(&self, next: ClientState) {
        *self.lock_state() = next;
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
