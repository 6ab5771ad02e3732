//! The lobby hub: the one actor that owns all lobby state.
//!
//! Sessions, timers and HTTP handlers only talk to it through its mailbox,
//! so every event is handled to completion before the next one starts.

use std::collections::HashMap;
use std::time::Duration;

use actix::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::domain::{ConnId, LobbyId, LobbySettings, Outbox, TimerCommand, TimerKind};
use crate::errors::DomainError;
use crate::protocol::ServerMsg;
use crate::services::ConnectionRegistry;

/// One outbound message for a session to write to its socket.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct Deliver(pub ServerMsg);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub conn_id: ConnId,
    pub recipient: Recipient<Deliver>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub conn_id: ConnId,
}

/// A text frame received on a session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Inbound {
    pub conn_id: ConnId,
    pub text: String,
}

#[derive(Message)]
#[rtype(result = "Result<LobbyId, DomainError>")]
pub struct CreateLobby;

#[derive(Message)]
#[rtype(result = "HubStats")]
pub struct Stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, MessageResponse)]
pub struct HubStats {
    pub lobbies: usize,
    pub connections: usize,
}

const DEFAULT_UNJOINED_TTL: Duration = Duration::from_secs(600);

pub struct LobbyHub {
    registry: ConnectionRegistry,
    sessions: HashMap<ConnId, Recipient<Deliver>>,
    timers: HashMap<(LobbyId, TimerKind), SpawnHandle>,
    /// One pending reap per created lobby id.
    reapers: HashMap<LobbyId, SpawnHandle>,
    unjoined_ttl: Duration,
    rng: StdRng,
}

impl LobbyHub {
    pub fn new(settings: LobbySettings) -> Self {
        Self::with_rng(settings, StdRng::from_os_rng())
    }

    /// Hub with a caller-provided random source; tests seed it.
    pub fn with_rng(settings: LobbySettings, rng: StdRng) -> Self {
        Self {
            registry: ConnectionRegistry::new(settings),
            sessions: HashMap::new(),
            timers: HashMap::new(),
            reapers: HashMap::new(),
            unjoined_ttl: DEFAULT_UNJOINED_TTL,
            rng,
        }
    }

    /// Sets how long a created lobby may wait for its first player before
    /// its id is released.
    pub fn with_unjoined_ttl(mut self, ttl: Duration) -> Self {
        self.unjoined_ttl = ttl;
        self
    }

    fn arm_reaper(&mut self, lobby_id: LobbyId, ctx: &mut Context<Self>) {
        if let Some(previous) = self.reapers.remove(&lobby_id) {
            ctx.cancel_future(previous);
        }
        let handle = ctx.run_later(self.unjoined_ttl, move |hub, _ctx| {
            hub.reapers.remove(&lobby_id);
            hub.registry.reap_unjoined(lobby_id);
        });
        self.reapers.insert(lobby_id, handle);
    }

    /// Applies the side effects of one event: timer commands first, then
    /// deliveries in emission order.
    fn apply(&mut self, out: Outbox, ctx: &mut Context<Self>) {
        for cmd in out.timers {
            match cmd {
                TimerCommand::Arm {
                    lobby_id,
                    kind,
                    token,
                    after,
                } => {
                    self.cancel_timer(lobby_id, kind, ctx);
                    let handle = ctx.run_later(after, move |hub, ctx| {
                        hub.timers.remove(&(lobby_id, kind));
                        let out = hub
                            .registry
                            .timer_fired(lobby_id, kind, token, &mut hub.rng);
                        hub.apply(out, ctx);
                    });
                    self.timers.insert((lobby_id, kind), handle);
                }
                TimerCommand::Cancel { lobby_id, kind } => {
                    self.cancel_timer(lobby_id, kind, ctx);
                }
            }
        }

        for delivery in out.deliveries {
            match self.sessions.get(&delivery.to) {
                Some(recipient) => recipient.do_send(Deliver(delivery.msg)),
                None => debug!(conn_id = %delivery.to, kind = delivery.msg.kind(), "delivery to closed session dropped"),
            }
        }
    }

    fn cancel_timer(&mut self, lobby_id: LobbyId, kind: TimerKind, ctx: &mut Context<Self>) {
        if let Some(handle) = self.timers.remove(&(lobby_id, kind)) {
            ctx.cancel_future(handle);
        }
    }
}

impl Actor for LobbyHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("lobby hub started");
    }
}

impl Handler<Connect> for LobbyHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        self.sessions.insert(msg.conn_id, msg.recipient);
        debug!(conn_id = %msg.conn_id, sessions = self.sessions.len(), "session registered");
    }
}

impl Handler<Disconnect> for LobbyHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, ctx: &mut Self::Context) -> Self::Result {
        self.sessions.remove(&msg.conn_id);
        let out = self.registry.disconnect(msg.conn_id, &mut self.rng);
        self.apply(out, ctx);
    }
}

impl Handler<Inbound> for LobbyHub {
    type Result = ();

    fn handle(&mut self, msg: Inbound, ctx: &mut Self::Context) -> Self::Result {
        let out = self
            .registry
            .handle_text(msg.conn_id, &msg.text, &mut self.rng);
        self.apply(out, ctx);
    }
}

impl Handler<CreateLobby> for LobbyHub {
    type Result = Result<LobbyId, DomainError>;

    fn handle(&mut self, _msg: CreateLobby, ctx: &mut Self::Context) -> Self::Result {
        let lobby_id = self.registry.create_lobby(&mut self.rng)?;
        self.arm_reaper(lobby_id, ctx);
        Ok(lobby_id)
    }
}

impl Handler<Stats> for LobbyHub {
    type Result = HubStats;

    fn handle(&mut self, _msg: Stats, _ctx: &mut Self::Context) -> Self::Result {
        HubStats {
            lobbies: self.registry.lobby_count(),
            connections: self.sessions.len(),
        }
    }
}
