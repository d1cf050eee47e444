//! Server network layer: UDP transport, dispatch wiring, and the main loop

use crate::presence::DevicePresence;
use crate::registry::SessionRegistry;
use crate::rubrics::RubricStore;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use serde::Serialize;
use shared::{
    procedures, Call, CallRejected, CreateSession, Disconnect, Dispatcher, Heartbeat,
    ProtocolError, RegisterDevice, RubricAccepted, RubricRecord,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

/// Cadence of the server-pushed `on_update_age` call.
pub const AGE_PUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Cadence of the presence timeout sweep.
pub const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerEvent {
    CallReceived {
        call: Call,
        addr: SocketAddr,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the network sender task
#[derive(Debug)]
pub enum Outbound {
    Send { call: Call, addr: SocketAddr },
    Broadcast { call: Call, to: Vec<SocketAddr> },
}

/// Everything the call handlers mutate, owned by the main loop task
///
/// Keeping the registries behind a single owner serializes every mutation
/// without a lock, which is what the uniqueness and write-once invariants
/// rely on.
pub struct ServerState {
    pub presence: DevicePresence,
    pub registry: SessionRegistry,
    pub rubrics: RubricStore,
    /// Address of the peer whose call is currently being dispatched
    pub reply_to: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ServerState {
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            presence: DevicePresence::new(),
            registry: SessionRegistry::new(),
            rubrics: RubricStore::new(),
            reply_to: None,
            outbound,
        }
    }

    /// Queues a reply to the peer whose call is being dispatched.
    pub fn reply<T: Serialize>(&self, procedure: &str, payload: &T) -> Result<(), ProtocolError> {
        let addr = self
            .reply_to
            .ok_or_else(|| ProtocolError::HandlerFailure("no reply address for call".into()))?;
        let call = Call::new(procedure, payload)
            .map_err(|e| ProtocolError::HandlerFailure(e.to_string()))?;
        self.outbound
            .send(Outbound::Send { call, addr })
            .map_err(|_| ProtocolError::HandlerFailure("outbound channel closed".into()))
    }
}

/// Builds the dispatcher for every call a client may invoke on the server.
///
/// Payload decoding and schema validation happen in the dispatcher wrapper,
/// so each handler body starts from a payload whose constraints already
/// hold.
pub fn server_dispatcher() -> Dispatcher<ServerState> {
    let mut dispatcher: Dispatcher<ServerState> = Dispatcher::new();

    dispatcher.register::<RegisterDevice, _>(procedures::REGISTER_DEVICE, |state, request| {
        let device =
            state
                .presence
                .register_device(&request.device_id, &request.device_name, state.reply_to);
        state.reply(procedures::DEVICE_REGISTERED, &device)
    });

    dispatcher.register::<CreateSession, _>(procedures::CREATE_SESSION, |state, request| {
        let device = state
            .presence
            .get(&request.device_id)
            .cloned()
            .ok_or_else(|| ProtocolError::DeviceNotFound(request.device_id.clone()))?;
        let session = state.registry.create_session(&device, &request.device_name)?;
        state.reply(procedures::SESSION_CREATED, &session)
    });

    dispatcher.register::<RubricRecord, _>(procedures::SUBMIT_RUBRIC, |state, record| {
        let record = record.into_inner();
        let id = record.id();
        let replaced = state.rubrics.upsert(record);
        state.reply(procedures::RUBRIC_ACCEPTED, &RubricAccepted { id, replaced })
    });

    dispatcher.register::<Heartbeat, _>(procedures::HEARTBEAT, |state, heartbeat| {
        state.presence.touch(&heartbeat.device_id);
        Ok(())
    });

    dispatcher.register::<Disconnect, _>(procedures::DISCONNECT, |state, disconnect| {
        state.presence.mark_offline(&disconnect.device_id);
        Ok(())
    });

    dispatcher
}

/// Main server coordinating transport and call dispatch
pub struct Server {
    socket: Arc<UdpSocket>,
    state: ServerState,
    dispatcher: Dispatcher<ServerState>,
    device_timeout: Duration,
    started_at: Instant,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerEvent>,
    server_rx: mpsc::UnboundedReceiver<ServerEvent>,
    out_tx: mpsc::UnboundedSender<Outbound>,
    out_rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Server {
    pub async fn new(
        addr: &str,
        device_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            state: ServerState::new(out_tx.clone()),
            dispatcher: server_dispatcher(),
            device_timeout,
            started_at: Instant::now(),
            server_tx,
            server_rx,
            out_tx,
            out_rx,
        })
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 8192];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(call) = deserialize::<Call>(&buffer[0..len]) {
                            if let Err(e) = server_tx.send(ServerEvent::CallReceived { call, addr })
                            {
                                error!("Failed to send call to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to decode datagram from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that drains the outgoing call queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match message {
                    Outbound::Send { call, addr } => {
                        if let Err(e) = Self::send_call(&socket, &call, addr).await {
                            error!("Failed to send `{}` to {}: {}", call.procedure, addr, e);
                        }
                    }
                    Outbound::Broadcast { call, to } => {
                        for addr in to {
                            if let Err(e) = Self::send_call(&socket, &call, addr).await {
                                error!(
                                    "Failed to broadcast `{}` to {}: {}",
                                    call.procedure, addr, e
                                );
                            }
                        }
                    }
                }
            }
        });
    }

    async fn send_call(
        socket: &UdpSocket,
        call: &Call,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(call)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Dispatches one received call and reports any failure to the sender.
    ///
    /// The dispatch runs to completion before the next event is taken from
    /// the channel, so calls from one peer apply in arrival order and each
    /// call's effects are all-or-nothing from the registries' perspective.
    fn handle_call(&mut self, call: Call, addr: SocketAddr) {
        // Any inbound traffic counts as liveness for the sending device
        if let Some(device_id) = self.state.presence.find_by_addr(addr) {
            self.state.presence.touch(&device_id);
        }

        self.state.reply_to = Some(addr);
        if let Err(err) = self.dispatcher.dispatch(&mut self.state, &call) {
            warn!("Rejected `{}` from {}: {}", call.procedure, addr, err);
            let rejected = CallRejected {
                procedure: call.procedure.clone(),
                reason: err.to_string(),
            };
            match Call::new(procedures::CALL_REJECTED, &rejected) {
                Ok(reply) => {
                    let _ = self.out_tx.send(Outbound::Send { call: reply, addr });
                }
                Err(e) => error!("Failed to encode rejection reply: {}", e),
            }
        }
        self.state.reply_to = None;
    }

    /// Pushes the server's age in seconds to every online device.
    fn push_age_update(&mut self) {
        let recipients: Vec<SocketAddr> = self
            .state
            .presence
            .online_addrs()
            .into_iter()
            .map(|(_, addr)| addr)
            .collect();
        if recipients.is_empty() {
            return;
        }

        let age = self.started_at.elapsed().as_secs();
        match Call::new(procedures::ON_UPDATE_AGE, &age) {
            Ok(call) => {
                debug!("Pushing age {} to {} device(s)", age, recipients.len());
                let _ = self.out_tx.send(Outbound::Broadcast {
                    call,
                    to: recipients,
                });
            }
            Err(e) => error!("Failed to encode age update: {}", e),
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut sweep_interval = interval(TIMEOUT_SWEEP_INTERVAL);
        let mut age_interval = interval(AGE_PUSH_INTERVAL);

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.server_rx.recv() => {
                    match event {
                        Some(ServerEvent::CallReceived { call, addr }) => {
                            self.handle_call(call, addr);
                        },
                        Some(ServerEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = sweep_interval.tick() => {
                    for device_id in self.state.presence.check_timeouts(self.device_timeout) {
                        info!("Device {} timed out", device_id);
                    }
                },

                _ = age_interval.tick() => {
                    self.push_age_update();
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{DeviceInfo, SessionInfo};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn dispatch_from(
        dispatcher: &mut Dispatcher<ServerState>,
        state: &mut ServerState,
        addr: SocketAddr,
        call: &Call,
    ) -> Result<(), ProtocolError> {
        state.reply_to = Some(addr);
        let result = dispatcher.dispatch(state, call);
        state.reply_to = None;
        result
    }

    fn expect_reply<T: serde::de::DeserializeOwned>(
        out_rx: &mut mpsc::UnboundedReceiver<Outbound>,
        procedure: &str,
    ) -> T {
        match out_rx.try_recv().expect("expected a queued reply") {
            Outbound::Send { call, .. } => {
                assert_eq!(call.procedure, procedure);
                deserialize(&call.payload).expect("reply payload decodes")
            }
            other => panic!("expected Outbound::Send, got {other:?}"),
        }
    }

    #[test]
    fn test_register_device_replies_with_record() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut state = ServerState::new(out_tx);
        let mut dispatcher = server_dispatcher();

        let request = RegisterDevice {
            device_id: "d1".to_string(),
            device_name: "Judge Phone".to_string(),
        };
        let call = Call::new(procedures::REGISTER_DEVICE, &request).unwrap();
        dispatch_from(&mut dispatcher, &mut state, test_addr(), &call).unwrap();

        let device: DeviceInfo = expect_reply(&mut out_rx, procedures::DEVICE_REGISTERED);
        assert_eq!(device.device_id, "d1");
        assert!(device.is_online);
        assert!(state.presence.is_online("d1"));
    }

    #[test]
    fn test_create_session_requires_known_device() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let mut state = ServerState::new(out_tx);
        let mut dispatcher = server_dispatcher();

        let request = CreateSession {
            device_id: "ghost".to_string(),
            device_name: "Judge Phone".to_string(),
        };
        let call = Call::new(procedures::CREATE_SESSION, &request).unwrap();
        let err = dispatch_from(&mut dispatcher, &mut state, test_addr(), &call).unwrap_err();

        assert_eq!(err, ProtocolError::DeviceNotFound("ghost".to_string()));
        assert!(state.registry.is_empty());
    }

    #[test]
    fn test_register_then_create_session_flow() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut state = ServerState::new(out_tx);
        let mut dispatcher = server_dispatcher();
        let addr = test_addr();

        let register = Call::new(
            procedures::REGISTER_DEVICE,
            &RegisterDevice {
                device_id: "d1".to_string(),
                device_name: "Judge Phone".to_string(),
            },
        )
        .unwrap();
        dispatch_from(&mut dispatcher, &mut state, addr, &register).unwrap();
        let _device: DeviceInfo = expect_reply(&mut out_rx, procedures::DEVICE_REGISTERED);

        let create = Call::new(
            procedures::CREATE_SESSION,
            &CreateSession {
                device_id: "d1".to_string(),
                device_name: "Judge Phone".to_string(),
            },
        )
        .unwrap();
        dispatch_from(&mut dispatcher, &mut state, addr, &create).unwrap();

        let session: SessionInfo = expect_reply(&mut out_rx, procedures::SESSION_CREATED);
        assert_eq!(session.device_id, "d1");
        assert_eq!(session.device_name, "Judge Phone");
        assert_eq!(
            state.registry.get_session(&session.session_id).unwrap(),
            &session
        );
    }

    #[test]
    fn test_disconnect_marks_offline_and_blocks_sessions() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut state = ServerState::new(out_tx);
        let mut dispatcher = server_dispatcher();
        let addr = test_addr();

        let register = Call::new(
            procedures::REGISTER_DEVICE,
            &RegisterDevice {
                device_id: "d1".to_string(),
                device_name: "Judge Phone".to_string(),
            },
        )
        .unwrap();
        dispatch_from(&mut dispatcher, &mut state, addr, &register).unwrap();
        let _device: DeviceInfo = expect_reply(&mut out_rx, procedures::DEVICE_REGISTERED);

        let disconnect = Call::new(
            procedures::DISCONNECT,
            &Disconnect {
                device_id: "d1".to_string(),
            },
        )
        .unwrap();
        dispatch_from(&mut dispatcher, &mut state, addr, &disconnect).unwrap();
        assert!(!state.presence.is_online("d1"));

        let create = Call::new(
            procedures::CREATE_SESSION,
            &CreateSession {
                device_id: "d1".to_string(),
                device_name: "Judge Phone".to_string(),
            },
        )
        .unwrap();
        let err = dispatch_from(&mut dispatcher, &mut state, addr, &create).unwrap_err();
        assert_eq!(err, ProtocolError::DeviceNotFound("d1".to_string()));
    }

    #[test]
    fn test_submit_rubric_rejects_out_of_range_score() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let mut state = ServerState::new(out_tx);
        let mut dispatcher = server_dispatcher();

        let record = RubricRecord::EngineeringNotebook(shared::EngineeringNotebookRubric {
            id: uuid::Uuid::new_v4(),
            team_number: "1234A".to_string(),
            judge_id: uuid::Uuid::new_v4(),
            rubric: vec![2.0, 6.0],
            notes: String::new(),
            innovate_award_notes: String::new(),
        });
        let call = Call::new(procedures::SUBMIT_RUBRIC, &record).unwrap();

        let err = dispatch_from(&mut dispatcher, &mut state, test_addr(), &call).unwrap_err();
        match err {
            ProtocolError::Schema(violation) => assert_eq!(violation.field, "rubric[1]"),
            other => panic!("expected schema violation, got {other:?}"),
        }
        assert!(state.rubrics.is_empty());
    }

    #[test]
    fn test_submit_rubric_replacement_acknowledged() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut state = ServerState::new(out_tx);
        let mut dispatcher = server_dispatcher();
        let addr = test_addr();
        let id = uuid::Uuid::new_v4();

        let record = |scores: Vec<f32>| {
            RubricRecord::TeamInterview(shared::TeamInterviewRubric {
                id,
                team_number: "42".to_string(),
                judge_id: uuid::Uuid::new_v4(),
                rubric: scores,
            })
        };

        let first = Call::new(procedures::SUBMIT_RUBRIC, &record(vec![1.0])).unwrap();
        dispatch_from(&mut dispatcher, &mut state, addr, &first).unwrap();
        let ack: RubricAccepted = expect_reply(&mut out_rx, procedures::RUBRIC_ACCEPTED);
        assert!(!ack.replaced);

        let second = Call::new(procedures::SUBMIT_RUBRIC, &record(vec![2.0])).unwrap();
        dispatch_from(&mut dispatcher, &mut state, addr, &second).unwrap();
        let ack: RubricAccepted = expect_reply(&mut out_rx, procedures::RUBRIC_ACCEPTED);
        assert!(ack.replaced);
        assert_eq!(state.rubrics.len(), 1);
    }

    #[test]
    fn test_unknown_procedure_is_rejected_without_state_change() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let mut state = ServerState::new(out_tx);
        let mut dispatcher = server_dispatcher();

        let call = Call::new("mystery", &0u64).unwrap();
        let err = dispatch_from(&mut dispatcher, &mut state, test_addr(), &call).unwrap_err();

        assert_eq!(err, ProtocolError::UnknownProcedure("mystery".to_string()));
        assert!(state.presence.is_empty());
        assert!(state.registry.is_empty());
    }
}
