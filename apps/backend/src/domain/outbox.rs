//! Side effects produced while handling one event.
//!
//! Lobby state is mutated first; deliveries and timer commands are collected
//! here and applied by the hub only after the step completes, so every
//! recipient of a broadcast observes the same, fully applied state.

use std::time::Duration;

use crate::domain::lobby::{ConnId, Lobby, LobbyId, TimerKind, TimerToken};
use crate::errors::DomainError;
use crate::protocol::ServerMsg;

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnId,
    pub msg: ServerMsg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Arm {
        lobby_id: LobbyId,
        kind: TimerKind,
        token: TimerToken,
        after: Duration,
    },
    Cancel {
        lobby_id: LobbyId,
        kind: TimerKind,
    },
}

#[derive(Debug, Default)]
pub struct Outbox {
    pub deliveries: Vec<Delivery>,
    pub timers: Vec<TimerCommand>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty() && self.timers.is_empty()
    }

    pub fn send(&mut self, to: ConnId, msg: ServerMsg) {
        self.deliveries.push(Delivery { to, msg });
    }

    pub fn error(&mut self, to: ConnId, err: &DomainError) {
        self.send(to, ServerMsg::error(err));
    }

    pub fn broadcast(&mut self, lobby: &Lobby, msg: ServerMsg) {
        for player in &lobby.players {
            self.send(player.conn_id, msg.clone());
        }
    }

    pub fn broadcast_player_list(&mut self, lobby: &Lobby) {
        self.broadcast(
            lobby,
            ServerMsg::UpdatePlayerList {
                player_names: lobby.player_names(),
                admin_name: lobby.admin_name.clone().unwrap_or_default(),
            },
        );
    }

    pub fn arm(&mut self, lobby_id: LobbyId, kind: TimerKind, token: TimerToken, after: Duration) {
        self.timers.push(TimerCommand::Arm {
            lobby_id,
            kind,
            token,
            after,
        });
    }

    pub fn cancel(&mut self, lobby_id: LobbyId, kind: TimerKind) {
        self.timers.push(TimerCommand::Cancel { lobby_id, kind });
    }

    /// Messages addressed to one connection, in emission order.
    pub fn messages_for(&self, conn_id: ConnId) -> Vec<&ServerMsg> {
        self.deliveries
            .iter()
            .filter(|d| d.to == conn_id)
            .map(|d| &d.msg)
            .collect()
    }
}
