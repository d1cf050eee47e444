//! Client network layer: UDP transport, push handlers, and the run loop

use crate::store::{ClientStatePatch, ClientStore};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{
    procedures, Call, CallRejected, CreateSession, DeviceInfo, Disconnect, Dispatcher, Heartbeat,
    RegisterDevice, RubricAccepted, RubricRecord, SessionInfo, Valid,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

/// Keepalive cadence; must stay under the server's device timeout.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Everything the push handlers mutate.
///
/// Owns the reactive store plus the identity records the server has
/// acknowledged for this device.
pub struct ClientCtx {
    pub store: ClientStore,
    pub device: Option<DeviceInfo>,
    pub session: Option<SessionInfo>,
}

impl ClientCtx {
    pub fn new(store: ClientStore) -> Self {
        Self {
            store,
            device: None,
            session: None,
        }
    }
}

/// Builds the dispatcher for every call the server may push to the client.
///
/// Handlers receive payloads already decoded and validated; a push either
/// fully applies or is rejected before any state changes.
pub fn client_dispatcher() -> Dispatcher<ClientCtx> {
    let mut dispatcher: Dispatcher<ClientCtx> = Dispatcher::new();

    dispatcher.register::<u64, _>(procedures::ON_UPDATE_AGE, |ctx, age| {
        let age = age.into_inner();
        let count = ctx.store.get_client_state().server_call_count;
        // Both fields change together in one observable update
        ctx.store.update_client_state(ClientStatePatch {
            server_call_count: Some(count + 1),
            last_update_age: Some(age),
        });
        Ok(())
    });

    dispatcher.register::<DeviceInfo, _>(procedures::DEVICE_REGISTERED, |ctx, device| {
        let device = device.into_inner();
        info!(
            "Registered as device {} (\"{}\")",
            device.device_id, device.device_name
        );
        ctx.device = Some(device);
        Ok(())
    });

    dispatcher.register::<SessionInfo, _>(procedures::SESSION_CREATED, |ctx, session| {
        let session = session.into_inner();
        info!(
            "Session {} opened for device {}",
            session.session_id, session.device_id
        );
        ctx.session = Some(session);
        Ok(())
    });

    dispatcher.register::<RubricAccepted, _>(procedures::RUBRIC_ACCEPTED, |_ctx, ack| {
        info!("Rubric {} accepted (replaced: {})", ack.id, ack.replaced);
        Ok(())
    });

    dispatcher.register::<CallRejected, _>(procedures::CALL_REJECTED, |_ctx, rejected| {
        warn!("Server rejected `{}`: {}", rejected.procedure, rejected.reason);
        Ok(())
    });

    dispatcher
}

/// Client endpoint driving registration, session setup, and push handling
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    device_id: String,
    device_name: String,
    ctx: ClientCtx,
    dispatcher: Dispatcher<ClientCtx>,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        device_id: &str,
        device_name: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            ctx: ClientCtx::new(ClientStore::new()),
            dispatcher: client_dispatcher(),
        })
    }

    /// Handle to the reactive store for UI-layer subscriptions.
    pub fn store(&self) -> ClientStore {
        self.ctx.store.clone()
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.ctx.session.as_ref()
    }

    async fn send_call(&self, call: &Call) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(call)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn register_device(&self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Registering device {}...", self.device_id);
        let request = RegisterDevice {
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
        };
        self.send_call(&Call::new(procedures::REGISTER_DEVICE, &request)?)
            .await
    }

    async fn request_session(&self) -> Result<(), Box<dyn std::error::Error>> {
        let request = CreateSession {
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
        };
        self.send_call(&Call::new(procedures::CREATE_SESSION, &request)?)
            .await
    }

    /// Submits a rubric record as a full-record replacement.
    ///
    /// The record is validated before transmission; a constraint violation
    /// never reaches the wire.
    pub async fn submit_rubric(
        &self,
        record: RubricRecord,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let record = Valid::new(record)?;
        self.send_call(&Call::new(procedures::SUBMIT_RUBRIC, &*record)?)
            .await
    }

    async fn send_heartbeat(&self) -> Result<(), Box<dyn std::error::Error>> {
        let heartbeat = Heartbeat {
            device_id: self.device_id.clone(),
        };
        self.send_call(&Call::new(procedures::HEARTBEAT, &heartbeat)?)
            .await
    }

    fn handle_call(&mut self, call: Call) {
        if let Err(err) = self.dispatcher.dispatch(&mut self.ctx, &call) {
            // A bad push never tears down the channel
            warn!("Dropped push `{}`: {}", call.procedure, err);
        }
    }

    /// Runs the client until Ctrl-C, then disconnects cleanly.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.register_device().await?;
        self.request_session().await?;

        // The UI collaborator surface: observe snapshots, never mutate
        let _state_log = self.ctx.store.subscribe(|state| {
            info!(
                "Client state: {} server call(s) applied, last age {}",
                state.server_call_count, state.last_update_age
            );
        });

        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut buffer = [0u8; 8192];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(call) = deserialize::<Call>(&buffer[0..len]) {
                                self.handle_call(call);
                            } else {
                                warn!("Failed to decode datagram from server");
                            }
                        },
                        Err(e) => error!("Error receiving datagram: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if let Err(e) = self.send_heartbeat().await {
                        error!("Error sending heartbeat: {}", e);
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                },
            }
        }

        let goodbye = Disconnect {
            device_id: self.device_id.clone(),
        };
        if let Ok(call) = Call::new(procedures::DISCONNECT, &goodbye) {
            let _ = self.send_call(&call).await;
        }

        Ok(())
    }
}
