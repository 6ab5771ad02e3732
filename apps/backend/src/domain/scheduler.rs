//! Turn scheduler: the per-lobby phase state machine.
//!
//! Every function here runs inside one event step of the hub. State is
//! mutated in place; messages and timer commands go to the [`Outbox`].
//!
//! Phases: `Waiting -> CollectCreations -> Narrate -> Final`, then back to
//! `CollectCreations` (continue) or `Waiting` (end game).

use std::time::Duration;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use tracing::{debug, info};

use crate::domain::lobby::{Creation, GameMode, Lobby, Phase, TimerKind, TimerToken};
use crate::domain::outbox::Outbox;
use crate::errors::DomainError;
use crate::protocol::{Decision, ServerMsg};

/// Admin starts the first round.
pub fn start_game<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    requester: &str,
    out: &mut Outbox,
    rng: &mut R,
) -> Result<(), DomainError> {
    if !lobby.is_admin(requester) {
        return Err(DomainError::not_authorized(
            "only the admin can start the game",
        ));
    }
    if lobby.phase != Phase::Waiting {
        return Err(DomainError::not_authorized("the game is already running"));
    }

    lobby.game_started = true;
    begin_round(lobby, out, rng);
    out.broadcast(
        lobby,
        ServerMsg::GameStarted {
            game_phase: lobby.phase,
            game_mode: lobby.game_mode,
        },
    );
    open_creation_phase(lobby, out);

    info!(lobby_id = %lobby.id, admin = requester, players = lobby.players.len(), "game started");
    Ok(())
}

/// Stores (or replaces) the sender's creation. Completes the phase as soon
/// as every connected player has submitted.
pub fn submit_creation<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    player: &str,
    payload: String,
    out: &mut Outbox,
    rng: &mut R,
) {
    if lobby.phase != Phase::CollectCreations {
        debug!(lobby_id = %lobby.id, player, phase = ?lobby.phase, "creation outside collect phase ignored");
        return;
    }

    lobby.creations.insert(
        player.to_string(),
        Creation {
            owner: player.to_string(),
            payload,
        },
    );
    debug!(lobby_id = %lobby.id, player, submitted = lobby.creations.len(), "creation received");

    if lobby.all_submitted() {
        close_creation_phase(lobby, out, rng);
    }
}

/// Retracts the sender's creation so it can be resubmitted. Idempotent.
pub fn withdraw_creation(lobby: &mut Lobby, player: &str) {
    if lobby.phase != Phase::CollectCreations {
        return;
    }
    if lobby.creations.remove(player).is_some() {
        debug!(lobby_id = %lobby.id, player, "creation withdrawn");
    }
}

/// The narrator is done; move to the next turn. Messages from anyone else
/// are ignored.
pub fn finish_narration<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    player: &str,
    out: &mut Outbox,
    rng: &mut R,
) {
    if lobby.phase != Phase::Narrate || lobby.current_narrator.as_deref() != Some(player) {
        debug!(lobby_id = %lobby.id, player, "finishedNarrating from non-narrator ignored");
        return;
    }
    advance_turn(lobby, out, rng);
}

/// Admin decides what happens after the final phase. Non-admin senders are
/// ignored.
pub fn final_decision<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    player: &str,
    decision: Decision,
    out: &mut Outbox,
    rng: &mut R,
) -> Result<(), DomainError> {
    if !lobby.is_admin(player) {
        debug!(lobby_id = %lobby.id, player, "final decision from non-admin ignored");
        return Ok(());
    }
    if lobby.phase != Phase::Final {
        return Err(DomainError::not_authorized("there is no finished round to decide on"));
    }

    match decision {
        Decision::Continue => {
            begin_round(lobby, out, rng);
            open_creation_phase(lobby, out);
            info!(lobby_id = %lobby.id, "new round started");
        }
        Decision::EndGame => {
            reset_round(lobby, out, rng);
            lobby.phase = Phase::Waiting;
            lobby.game_started = false;
            out.broadcast(
                lobby,
                ServerMsg::ReturnToLobby {
                    game_mode: lobby.game_mode,
                },
            );
            info!(lobby_id = %lobby.id, "game ended, back to lobby");
        }
    }
    Ok(())
}

pub fn configure_timers(
    lobby: &mut Lobby,
    player: &str,
    creating_time: u32,
    narration_time: u32,
    out: &mut Outbox,
) -> Result<(), DomainError> {
    ensure_pre_game_admin(lobby, player, "configure timers")?;
    if creating_time == 0 || narration_time == 0 {
        return Err(DomainError::invalid_message(
            "timer durations must be positive",
        ));
    }

    lobby.creating_time = creating_time;
    lobby.narration_time = narration_time;
    out.broadcast(
        lobby,
        ServerMsg::TimerConfigured {
            creating_time,
            narration_time,
        },
    );
    Ok(())
}

pub fn change_game_mode(
    lobby: &mut Lobby,
    player: &str,
    requested: &str,
    out: &mut Outbox,
) -> Result<(), DomainError> {
    ensure_pre_game_admin(lobby, player, "change the game mode")?;
    let game_mode: GameMode = requested.parse()?;

    lobby.game_mode = game_mode;
    out.broadcast(lobby, ServerMsg::GameModeChange { game_mode });
    info!(lobby_id = %lobby.id, player, %game_mode, "game mode changed");
    Ok(())
}

/// Handles an expired timer. Returns `false` when the token is stale and
/// nothing happened.
pub fn timer_fired<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    kind: TimerKind,
    token: TimerToken,
    out: &mut Outbox,
    rng: &mut R,
) -> bool {
    if lobby.timer(kind) != Some(token) {
        debug!(lobby_id = %lobby.id, ?kind, "stale timer ignored");
        return false;
    }
    lobby.clear_timer(kind);

    match (kind, lobby.phase) {
        (TimerKind::Creating, Phase::CollectCreations) => {
            info!(lobby_id = %lobby.id, submitted = lobby.creations.len(), "creating time is up");
            close_creation_phase(lobby, out, rng);
        }
        (TimerKind::Turn, Phase::Narrate) => {
            debug!(lobby_id = %lobby.id, narrator = ?lobby.current_narrator, "narration time is up");
            advance_turn(lobby, out, rng);
        }
        (kind, phase) => {
            debug!(lobby_id = %lobby.id, ?kind, ?phase, "timer fired outside its phase");
        }
    }
    true
}

/// Round bookkeeping after `player` left the lobby. The caller has already
/// removed the player and reassigned the admin.
pub fn player_left<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    player: &str,
    out: &mut Outbox,
    rng: &mut R,
) {
    match lobby.phase {
        Phase::CollectCreations => {
            lobby.creations.remove(player);
            lobby.pool.retain(|c| c.owner != player);
            if lobby.all_submitted() {
                close_creation_phase(lobby, out, rng);
            }
        }
        // The current turn is abandoned whoever left.
        Phase::Narrate => advance_turn(lobby, out, rng),
        Phase::Waiting | Phase::Final => {}
    }
}

/// Cancels whatever timers the lobby still has pending.
pub fn cancel_all_timers(lobby: &mut Lobby, out: &mut Outbox) {
    cancel_timer(lobby, TimerKind::Creating, out);
    cancel_timer(lobby, TimerKind::Turn, out);
}

fn ensure_pre_game_admin(lobby: &Lobby, player: &str, action: &str) -> Result<(), DomainError> {
    if !lobby.is_admin(player) {
        return Err(DomainError::not_authorized(format!(
            "only the admin can {action}"
        )));
    }
    if lobby.game_started {
        return Err(DomainError::not_authorized(format!(
            "cannot {action} while a game is running"
        )));
    }
    Ok(())
}

fn reset_round<R: Rng + ?Sized>(lobby: &mut Lobby, out: &mut Outbox, rng: &mut R) {
    cancel_all_timers(lobby, out);
    lobby.creations.clear();
    lobby.pool.clear();
    lobby.used_creations.clear();
    lobby.current_turn_index = 0;
    lobby.current_narrator = None;

    let mut order = lobby.player_names();
    order.shuffle(rng);
    lobby.turn_order = order;
}

fn begin_round<R: Rng + ?Sized>(lobby: &mut Lobby, out: &mut Outbox, rng: &mut R) {
    reset_round(lobby, out, rng);
    lobby.phase = Phase::CollectCreations;
}

fn open_creation_phase(lobby: &mut Lobby, out: &mut Outbox) {
    // One second of grace so uploads finishing right at the deadline still count.
    let after = Duration::from_secs(u64::from(lobby.creating_time) + 1);
    arm_timer(lobby, TimerKind::Creating, after, out);
    out.broadcast(
        lobby,
        ServerMsg::StartCreating {
            creating_time: lobby.creating_time,
        },
    );
}

fn close_creation_phase<R: Rng + ?Sized>(lobby: &mut Lobby, out: &mut Outbox, rng: &mut R) {
    cancel_timer(lobby, TimerKind::Creating, out);
    lobby.phase = Phase::Narrate;
    lobby.pool = lobby
        .creations
        .values()
        .filter(|c| !lobby.used_creations.contains(&c.owner))
        .cloned()
        .collect();

    info!(lobby_id = %lobby.id, pool = lobby.pool.len(), "narration phase");
    resolve_turns(lobby, out, rng);
}

fn advance_turn<R: Rng + ?Sized>(lobby: &mut Lobby, out: &mut Outbox, rng: &mut R) {
    cancel_timer(lobby, TimerKind::Turn, out);
    lobby.current_narrator = None;
    lobby.current_turn_index += 1;
    resolve_turns(lobby, out, rng);
}

/// Finds the next narrator with something to narrate and presents the turn,
/// or ends the round. The cursor only moves forward, so this runs at most
/// `turn_order.len()` iterations.
fn resolve_turns<R: Rng + ?Sized>(lobby: &mut Lobby, out: &mut Outbox, rng: &mut R) {
    while lobby.current_turn_index < lobby.turn_order.len() {
        let narrator = lobby.turn_order[lobby.current_turn_index].clone();

        if lobby.has_player(&narrator) {
            let eligible: Vec<usize> = lobby
                .pool
                .iter()
                .enumerate()
                .filter(|(_, c)| c.owner != narrator && !lobby.used_creations.contains(&c.owner))
                .map(|(idx, _)| idx)
                .collect();

            if let Some(&picked) = eligible.choose(rng) {
                let creation = lobby.pool.remove(picked);
                present_turn(lobby, narrator, creation, out);
                return;
            }
        }

        debug!(lobby_id = %lobby.id, narrator, "turn skipped");
        lobby.current_turn_index += 1;
    }

    enter_final(lobby, out);
}

fn present_turn(lobby: &mut Lobby, narrator: String, creation: Creation, out: &mut Outbox) {
    lobby.used_creations.insert(creation.owner.clone());
    lobby.current_narrator = Some(narrator.clone());
    let after = Duration::from_secs(u64::from(lobby.narration_time));
    arm_timer(lobby, TimerKind::Turn, after, out);

    for player in &lobby.players {
        let msg = if player.name == narrator {
            ServerMsg::YourTurn {
                creation: creation.payload.clone(),
                creation_owner: creation.owner.clone(),
                story_time: lobby.narration_time,
                game_mode: lobby.game_mode,
            }
        } else {
            ServerMsg::PlayerNarrating {
                creation: creation.payload.clone(),
                creation_owner: creation.owner.clone(),
                narrating_player: narrator.clone(),
                story_time: lobby.narration_time,
                game_mode: lobby.game_mode,
            }
        };
        out.send(player.conn_id, msg);
    }

    info!(
        lobby_id = %lobby.id,
        narrator,
        owner = creation.owner,
        turn = lobby.current_turn_index,
        "turn started"
    );
}

fn enter_final(lobby: &mut Lobby, out: &mut Outbox) {
    cancel_timer(lobby, TimerKind::Turn, out);
    lobby.phase = Phase::Final;
    lobby.current_narrator = None;
    out.broadcast(lobby, ServerMsg::GameEnded {});
    info!(lobby_id = %lobby.id, "round over");
}

fn arm_timer(lobby: &mut Lobby, kind: TimerKind, after: Duration, out: &mut Outbox) {
    let token = lobby.arm_timer(kind);
    out.arm(lobby.id, kind, token, after);
}

fn cancel_timer(lobby: &mut Lobby, kind: TimerKind, out: &mut Outbox) {
    if lobby.clear_timer(kind).is_some() {
        out.cancel(lobby.id, kind);
    }
}
