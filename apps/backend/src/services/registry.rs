//! Connection registry: binds connections to lobbies and routes their
//! messages to the lobby logic.

use std::collections::HashMap;

use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::domain::{
    assign_nickname, scheduler, validate_rename, ConnId, Lobby, LobbyId, LobbySettings, Outbox,
    Player, TimerKind, TimerToken,
};
use crate::errors::DomainError;
use crate::protocol::{ClientMsg, JoinLobby, ServerMsg};
use crate::services::lobby_store::LobbyStore;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    store: LobbyStore,
    bindings: HashMap<ConnId, LobbyId>,
}

impl ConnectionRegistry {
    pub fn new(settings: LobbySettings) -> Self {
        Self {
            store: LobbyStore::new(settings),
            bindings: HashMap::new(),
        }
    }

    pub fn create_lobby<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<LobbyId, DomainError> {
        let id = self.store.create(rng)?;
        info!(lobby_id = %id, "lobby created");
        Ok(id)
    }

    /// Drops `id` if nobody has joined it. Lobbies with players, and ids
    /// that are no longer live, are left alone.
    pub fn reap_unjoined(&mut self, id: LobbyId) -> bool {
        if !self.store.get(id).is_some_and(Lobby::is_empty) {
            return false;
        }
        self.store.remove(id);
        info!(lobby_id = %id, "unjoined lobby reaped");
        true
    }

    pub fn lobby(&self, id: LobbyId) -> Option<&Lobby> {
        self.store.get(id)
    }

    pub fn lobby_count(&self) -> usize {
        self.store.len()
    }

    /// Lobby the connection joined, if any.
    pub fn binding(&self, conn_id: ConnId) -> Option<LobbyId> {
        self.bindings.get(&conn_id).copied()
    }

    /// Handles one inbound text frame. Errors go back to the sender only.
    pub fn handle_text<R: Rng + ?Sized>(&mut self, conn_id: ConnId, text: &str, rng: &mut R) -> Outbox {
        let mut out = Outbox::new();
        let result = match ClientMsg::parse(text) {
            Ok(Some(msg)) => self.dispatch(conn_id, msg, &mut out, rng),
            Ok(None) => {
                debug!(%conn_id, "unknown message type ignored");
                Ok(())
            }
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            debug!(%conn_id, code = %err.code(), error = %err, "message rejected");
            out.error(conn_id, &err);
        }
        out
    }

    fn dispatch<R: Rng + ?Sized>(
        &mut self,
        conn_id: ConnId,
        msg: ClientMsg,
        out: &mut Outbox,
        rng: &mut R,
    ) -> Result<(), DomainError> {
        let Some(lobby_id) = self.binding(conn_id) else {
            return match msg {
                ClientMsg::JoinLobby(join) => self.join(conn_id, join, out, rng),
                other => {
                    debug!(%conn_id, kind = other.kind(), "message from unbound connection ignored");
                    Ok(())
                }
            };
        };

        let Some(lobby) = self.store.get_mut(lobby_id) else {
            return Ok(());
        };
        let Some(player) = lobby.player_by_conn(conn_id).map(|p| p.name.clone()) else {
            return Ok(());
        };

        match msg {
            ClientMsg::JoinLobby(_) => Err(DomainError::not_authorized(
                "this connection has already joined a lobby",
            )),
            ClientMsg::ChangeName(change) => {
                rename(lobby, conn_id, &player, change.new_name, out)
            }
            ClientMsg::StartGame => scheduler::start_game(lobby, &player, out, rng),
            ClientMsg::SubmitCreation(submit) => {
                scheduler::submit_creation(lobby, &player, submit.creation_data_url, out, rng);
                Ok(())
            }
            ClientMsg::NotReady => {
                scheduler::withdraw_creation(lobby, &player);
                Ok(())
            }
            ClientMsg::FinalDecision(decision) => {
                scheduler::final_decision(lobby, &player, decision.decision, out, rng)
            }
            ClientMsg::FinishedNarrating => {
                scheduler::finish_narration(lobby, &player, out, rng);
                Ok(())
            }
            ClientMsg::ConfigureTimers(timers) => scheduler::configure_timers(
                lobby,
                &player,
                timers.creating_time,
                timers.narration_time,
                out,
            ),
            ClientMsg::ChangeGameMode(mode) => {
                scheduler::change_game_mode(lobby, &player, &mode.game_mode, out)
            }
        }
    }

    fn join<R: Rng + ?Sized>(
        &mut self,
        conn_id: ConnId,
        join: JoinLobby,
        out: &mut Outbox,
        rng: &mut R,
    ) -> Result<(), DomainError> {
        let lobby = self
            .store
            .get_mut(join.lobby_id)
            .ok_or(DomainError::LobbyNotFound(join.lobby_id))?;

        let name = assign_nickname(lobby, join.player_name.as_deref(), rng);
        lobby.add_player(Player {
            conn_id,
            name: name.clone(),
        });
        self.bindings.insert(conn_id, lobby.id);

        out.send(
            conn_id,
            ServerMsg::JoinSuccess {
                lobby_id: lobby.id,
                player_names: lobby.player_names(),
                admin_name: lobby.admin_name.clone().unwrap_or_default(),
                player_name: name.clone(),
                game_started: lobby.game_started,
                game_phase: lobby.phase,
                turn_order: lobby.turn_order.clone(),
                creating_time: lobby.creating_time,
                narration_time: lobby.narration_time,
                game_mode: lobby.game_mode,
            },
        );
        out.broadcast_player_list(lobby);

        info!(lobby_id = %lobby.id, player = %name, %conn_id, players = lobby.players.len(), "player joined");
        Ok(())
    }

    /// Connection closed. Removes the player, hands the admin role over and
    /// lets the round recover; drops the lobby once nobody is left.
    pub fn disconnect<R: Rng + ?Sized>(&mut self, conn_id: ConnId, rng: &mut R) -> Outbox {
        let mut out = Outbox::new();
        let Some(lobby_id) = self.bindings.remove(&conn_id) else {
            return out;
        };
        let Some(lobby) = self.store.get_mut(lobby_id) else {
            return out;
        };
        let Some(player) = lobby.remove_player(conn_id) else {
            return out;
        };
        info!(lobby_id = %lobby_id, player = %player.name, %conn_id, remaining = lobby.players.len(), "player left");

        if lobby.is_admin(&player.name) {
            lobby.admin_name = lobby.players.choose(rng).map(|p| p.name.clone());
            if let Some(admin) = &lobby.admin_name {
                info!(lobby_id = %lobby_id, admin = %admin, "admin reassigned");
            }
        }

        if lobby.is_empty() {
            scheduler::cancel_all_timers(lobby, &mut out);
            self.store.remove(lobby_id);
            info!(lobby_id = %lobby_id, "last player left, lobby closed");
            return out;
        }

        out.broadcast_player_list(lobby);
        scheduler::player_left(lobby, &player.name, &mut out, rng);
        out
    }

    /// A hub timer expired. Lobbies that have since closed are ignored.
    pub fn timer_fired<R: Rng + ?Sized>(
        &mut self,
        lobby_id: LobbyId,
        kind: TimerKind,
        token: TimerToken,
        rng: &mut R,
    ) -> Outbox {
        let mut out = Outbox::new();
        match self.store.get_mut(lobby_id) {
            Some(lobby) => {
                scheduler::timer_fired(lobby, kind, token, &mut out, rng);
            }
            None => debug!(lobby_id = %lobby_id, ?kind, "timer for closed lobby ignored"),
        }
        out
    }
}

/// `changeName`: validate, re-key round state, confirm, then broadcast.
fn rename(
    lobby: &mut Lobby,
    conn_id: ConnId,
    current: &str,
    new_name: String,
    out: &mut Outbox,
) -> Result<(), DomainError> {
    validate_rename(lobby, &new_name)?;
    lobby.rename_player(current, &new_name);

    out.send(
        conn_id,
        ServerMsg::NameChangeSuccess {
            player_name: new_name.clone(),
        },
    );
    out.broadcast_player_list(lobby);
    info!(lobby_id = %lobby.id, from = current, to = %new_name, "player renamed");
    Ok(())
}
