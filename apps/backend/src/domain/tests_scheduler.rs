use std::time::Duration;

use crate::domain::lobby::{GameMode, Phase, TimerKind};
use crate::domain::nickname::{assign_nickname, validate_rename};
use crate::domain::outbox::{Outbox, TimerCommand};
use crate::domain::scheduler;
use crate::domain::test_prelude::{conn_of, kinds, last_armed, lobby_with, rng, start_and_submit_all};
use crate::errors::DomainError;
use crate::protocol::{Decision, ServerMsg};

/// Plays the current round to the end, returning `(narrator, owner)` per turn.
fn play_out_round(
    lobby: &mut crate::domain::Lobby,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Vec<(String, String)> {
    let mut turns = Vec::new();
    while lobby.phase == Phase::Narrate {
        let narrator = lobby.current_narrator.clone().expect("narrator during narrate");
        let owner = lobby
            .used_creations
            .iter()
            .find(|o| !turns.iter().any(|(_, seen): &(String, String)| seen == *o))
            .cloned()
            .expect("a freshly used creation");
        turns.push((narrator.clone(), owner));
        let mut out = Outbox::new();
        scheduler::finish_narration(lobby, &narrator, &mut out, rng);
    }
    turns
}

#[test]
fn only_admin_can_start() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut out = Outbox::new();

    let err = scheduler::start_game(&mut lobby, "Bob", &mut out, &mut rng(1)).unwrap_err();

    assert!(matches!(err, DomainError::NotAuthorized(_)));
    assert_eq!(lobby.phase, Phase::Waiting);
    assert!(!lobby.game_started);
    assert!(out.is_empty());
}

#[test]
fn start_game_announces_and_arms_creating_timer() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut out = Outbox::new();

    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng(2)).unwrap();

    assert!(lobby.game_started);
    assert_eq!(lobby.phase, Phase::CollectCreations);
    let mut order = lobby.turn_order.clone();
    order.sort();
    assert_eq!(order, vec!["Ann", "Bob", "Cat"]);

    for name in ["Ann", "Bob", "Cat"] {
        let msgs = out.messages_for(conn_of(&lobby, name));
        assert_eq!(kinds(&msgs), vec!["gameStarted", "startCreating"]);
        assert_eq!(
            msgs[1],
            &ServerMsg::StartCreating { creating_time: 60 }
        );
    }

    assert!(out.timers.iter().any(|cmd| matches!(
        cmd,
        TimerCommand::Arm { kind: TimerKind::Creating, after, .. } if *after == Duration::from_secs(61)
    )));
}

#[test]
fn starting_twice_is_rejected() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut out = Outbox::new();
    let mut rng = rng(3);
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();

    let err = scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap_err();
    assert!(matches!(err, DomainError::NotAuthorized(_)));
}

#[test]
fn all_submissions_start_narration_for_someone_else() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(4);
    let out = start_and_submit_all(&mut lobby, &mut rng);

    assert_eq!(lobby.phase, Phase::Narrate);
    assert_eq!(lobby.timer(TimerKind::Creating), None);
    assert!(out
        .timers
        .iter()
        .any(|cmd| matches!(cmd, TimerCommand::Cancel { kind: TimerKind::Creating, .. })));

    let narrator = lobby.current_narrator.clone().unwrap();
    let mut your_turns = 0;
    for player in &lobby.players {
        let last = *out.messages_for(player.conn_id).last().unwrap();
        match last {
            ServerMsg::YourTurn {
                creation_owner,
                story_time,
                ..
            } => {
                your_turns += 1;
                assert_eq!(player.name, narrator);
                assert_ne!(creation_owner, &narrator);
                assert_eq!(*story_time, 90);
            }
            ServerMsg::PlayerNarrating {
                narrating_player,
                creation_owner,
                ..
            } => {
                assert_eq!(narrating_player, &narrator);
                assert_ne!(creation_owner, narrating_player);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
    assert_eq!(your_turns, 1);
    assert_eq!(last_armed(&out, TimerKind::Turn), lobby.timer(TimerKind::Turn));
}

#[test]
fn full_round_never_repeats_or_self_narrates() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat", "Dan"]);
    let mut rng = rng(5);
    start_and_submit_all(&mut lobby, &mut rng);

    let turns = play_out_round(&mut lobby, &mut rng);

    assert_eq!(lobby.phase, Phase::Final);
    assert_eq!(lobby.current_narrator, None);
    assert!(!turns.is_empty());
    for (narrator, owner) in &turns {
        assert_ne!(narrator, owner);
    }
    let mut owners: Vec<_> = turns.iter().map(|(_, o)| o.clone()).collect();
    owners.sort();
    owners.dedup();
    assert_eq!(owners.len(), turns.len());
}

#[test]
fn two_players_narrate_each_others_creation() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut rng = rng(6);
    start_and_submit_all(&mut lobby, &mut rng);

    let turns = play_out_round(&mut lobby, &mut rng);

    assert_eq!(turns.len(), 2);
    assert_eq!(lobby.phase, Phase::Final);
}

#[test]
fn lone_player_goes_straight_to_final() {
    let mut lobby = lobby_with(&["Ann"]);
    let mut rng = rng(7);
    let out = start_and_submit_all(&mut lobby, &mut rng);

    assert_eq!(lobby.phase, Phase::Final);
    let msgs = out.messages_for(conn_of(&lobby, "Ann"));
    assert_eq!(kinds(&msgs), vec!["gameStarted", "startCreating", "gameEnded"]);
}

#[test]
fn finished_narrating_from_non_narrator_is_ignored() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(8);
    start_and_submit_all(&mut lobby, &mut rng);
    let narrator = lobby.current_narrator.clone().unwrap();
    let bystander = lobby
        .player_names()
        .into_iter()
        .find(|n| *n != narrator)
        .unwrap();
    let index = lobby.current_turn_index;

    let mut out = Outbox::new();
    scheduler::finish_narration(&mut lobby, &bystander, &mut out, &mut rng);

    assert!(out.is_empty());
    assert_eq!(lobby.current_turn_index, index);
    assert_eq!(lobby.current_narrator.as_deref(), Some(narrator.as_str()));
}

#[test]
fn creating_timer_closes_phase_with_partial_submissions() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(9);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    scheduler::submit_creation(&mut lobby, "Ann", "a".into(), &mut out, &mut rng);
    scheduler::submit_creation(&mut lobby, "Bob", "b".into(), &mut out, &mut rng);
    let token = lobby.timer(TimerKind::Creating).unwrap();

    let mut out = Outbox::new();
    assert!(scheduler::timer_fired(&mut lobby, TimerKind::Creating, token, &mut out, &mut rng));

    assert_eq!(lobby.phase, Phase::Narrate);
    let turns = play_out_round(&mut lobby, &mut rng);
    let owners: Vec<_> = turns.iter().map(|(_, o)| o.as_str()).collect();
    assert!(owners.iter().all(|o| *o == "Ann" || *o == "Bob"));
}

#[test]
fn creating_timer_with_no_submissions_ends_round() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut rng = rng(10);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    let token = lobby.timer(TimerKind::Creating).unwrap();

    let mut out = Outbox::new();
    scheduler::timer_fired(&mut lobby, TimerKind::Creating, token, &mut out, &mut rng);

    assert_eq!(lobby.phase, Phase::Final);
    assert_eq!(kinds(&out.messages_for(conn_of(&lobby, "Bob"))), vec!["gameEnded"]);
}

#[test]
fn stale_timer_is_a_no_op() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(11);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    let stale = lobby.timer(TimerKind::Creating).unwrap();
    for name in ["Ann", "Bob", "Cat"] {
        scheduler::submit_creation(&mut lobby, name, name.into(), &mut out, &mut rng);
    }
    let narrator = lobby.current_narrator.clone();
    let index = lobby.current_turn_index;

    let mut out = Outbox::new();
    assert!(!scheduler::timer_fired(&mut lobby, TimerKind::Creating, stale, &mut out, &mut rng));

    assert!(out.is_empty());
    assert_eq!(lobby.phase, Phase::Narrate);
    assert_eq!(lobby.current_narrator, narrator);
    assert_eq!(lobby.current_turn_index, index);
}

#[test]
fn turn_timer_advances_like_finished_narrating() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(12);
    start_and_submit_all(&mut lobby, &mut rng);
    let first = lobby.current_narrator.clone().unwrap();
    let token = lobby.timer(TimerKind::Turn).unwrap();

    let mut out = Outbox::new();
    assert!(scheduler::timer_fired(&mut lobby, TimerKind::Turn, token, &mut out, &mut rng));

    assert_ne!(lobby.current_narrator.as_deref(), Some(first.as_str()));
    assert!(lobby.current_turn_index >= 1);
}

#[test]
fn withdrawn_creation_is_not_narrated() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(13);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    scheduler::submit_creation(&mut lobby, "Ann", "a".into(), &mut out, &mut rng);
    scheduler::submit_creation(&mut lobby, "Bob", "b".into(), &mut out, &mut rng);
    scheduler::withdraw_creation(&mut lobby, "Bob");
    scheduler::withdraw_creation(&mut lobby, "Bob");
    scheduler::submit_creation(&mut lobby, "Cat", "c".into(), &mut out, &mut rng);

    assert_eq!(lobby.phase, Phase::CollectCreations);
    assert!(!lobby.creations.contains_key("Bob"));
}

#[test]
fn resubmission_after_withdrawal_is_the_one_narrated() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut rng = rng(25);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    scheduler::submit_creation(&mut lobby, "Bob", "data:old".into(), &mut out, &mut rng);
    scheduler::withdraw_creation(&mut lobby, "Bob");
    scheduler::submit_creation(&mut lobby, "Bob", "data:new".into(), &mut out, &mut rng);
    assert_eq!(lobby.phase, Phase::CollectCreations);
    scheduler::submit_creation(&mut lobby, "Ann", "data:ann".into(), &mut out, &mut rng);

    while lobby.phase == Phase::Narrate {
        let narrator = lobby.current_narrator.clone().unwrap();
        scheduler::finish_narration(&mut lobby, &narrator, &mut out, &mut rng);
    }

    let narrated: Vec<&str> = out
        .messages_for(conn_of(&lobby, "Ann"))
        .into_iter()
        .filter_map(|msg| match msg {
            ServerMsg::YourTurn {
                creation,
                creation_owner,
                ..
            } if creation_owner == "Bob" => Some(creation.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(narrated, vec!["data:new"]);
}

#[test]
fn resubmission_replaces_previous_creation() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut rng = rng(14);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    scheduler::submit_creation(&mut lobby, "Ann", "first".into(), &mut out, &mut rng);
    scheduler::submit_creation(&mut lobby, "Ann", "second".into(), &mut out, &mut rng);

    assert_eq!(lobby.creations.len(), 1);
    assert_eq!(lobby.creations["Ann"].payload, "second");
}

#[test]
fn submission_outside_collect_phase_is_ignored() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut out = Outbox::new();
    scheduler::submit_creation(&mut lobby, "Ann", "a".into(), &mut out, &mut rng(15));
    assert!(lobby.creations.is_empty());
    assert!(out.is_empty());
}

#[test]
fn final_decision_rules() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut rng = rng(16);
    start_and_submit_all(&mut lobby, &mut rng);

    let mut out = Outbox::new();
    let err = scheduler::final_decision(&mut lobby, "Ann", Decision::Continue, &mut out, &mut rng)
        .unwrap_err();
    assert!(matches!(err, DomainError::NotAuthorized(_)));

    play_out_round(&mut lobby, &mut rng);
    assert_eq!(lobby.phase, Phase::Final);

    let mut out = Outbox::new();
    scheduler::final_decision(&mut lobby, "Bob", Decision::EndGame, &mut out, &mut rng).unwrap();
    assert!(out.is_empty());
    assert_eq!(lobby.phase, Phase::Final);

    scheduler::final_decision(&mut lobby, "Ann", Decision::Continue, &mut out, &mut rng).unwrap();
    assert_eq!(lobby.phase, Phase::CollectCreations);
    assert!(lobby.creations.is_empty());
    assert!(lobby.used_creations.is_empty());
    assert_eq!(lobby.current_turn_index, 0);
    assert_eq!(
        kinds(&out.messages_for(conn_of(&lobby, "Bob"))),
        vec!["startCreating"]
    );
}

#[test]
fn end_game_returns_everyone_to_lobby() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    lobby.game_mode = GameMode::Pictures;
    let mut rng = rng(17);
    start_and_submit_all(&mut lobby, &mut rng);
    play_out_round(&mut lobby, &mut rng);

    let mut out = Outbox::new();
    scheduler::final_decision(&mut lobby, "Ann", Decision::EndGame, &mut out, &mut rng).unwrap();

    assert_eq!(lobby.phase, Phase::Waiting);
    assert!(!lobby.game_started);
    assert_eq!(lobby.timer(TimerKind::Creating), None);
    assert_eq!(lobby.timer(TimerKind::Turn), None);
    assert_eq!(
        out.messages_for(conn_of(&lobby, "Bob")),
        vec![&ServerMsg::ReturnToLobby {
            game_mode: GameMode::Pictures
        }]
    );

    // A fresh game can start again.
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
}

#[test]
fn configure_timers_pre_game_only() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut out = Outbox::new();

    scheduler::configure_timers(&mut lobby, "Ann", 30, 45, &mut out).unwrap();
    assert_eq!((lobby.creating_time, lobby.narration_time), (30, 45));
    assert_eq!(
        out.messages_for(conn_of(&lobby, "Bob")),
        vec![&ServerMsg::TimerConfigured {
            creating_time: 30,
            narration_time: 45
        }]
    );

    let err = scheduler::configure_timers(&mut lobby, "Bob", 10, 10, &mut out).unwrap_err();
    assert!(matches!(err, DomainError::NotAuthorized(_)));

    let err = scheduler::configure_timers(&mut lobby, "Ann", 0, 10, &mut out).unwrap_err();
    assert!(matches!(err, DomainError::InvalidMessage(_)));

    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng(18)).unwrap();
    let err = scheduler::configure_timers(&mut lobby, "Ann", 10, 10, &mut out).unwrap_err();
    assert!(matches!(err, DomainError::NotAuthorized(_)));
    assert_eq!((lobby.creating_time, lobby.narration_time), (30, 45));
}

#[test]
fn configured_times_drive_timer_durations() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut rng = rng(19);
    let mut out = Outbox::new();
    scheduler::configure_timers(&mut lobby, "Ann", 5, 7, &mut out).unwrap();

    let out = start_and_submit_all(&mut lobby, &mut rng);

    let durations: Vec<_> = out
        .timers
        .iter()
        .filter_map(|cmd| match cmd {
            TimerCommand::Arm { kind, after, .. } => Some((*kind, *after)),
            TimerCommand::Cancel { .. } => None,
        })
        .collect();
    assert_eq!(
        durations,
        vec![
            (TimerKind::Creating, Duration::from_secs(6)),
            (TimerKind::Turn, Duration::from_secs(7)),
        ]
    );
}

#[test]
fn change_game_mode_validates_name_and_sender() {
    let mut lobby = lobby_with(&["Ann", "Bob"]);
    let mut out = Outbox::new();

    scheduler::change_game_mode(&mut lobby, "Ann", "AI", &mut out).unwrap();
    assert_eq!(lobby.game_mode, GameMode::Ai);
    assert_eq!(
        out.messages_for(conn_of(&lobby, "Bob")),
        vec![&ServerMsg::GameModeChange {
            game_mode: GameMode::Ai
        }]
    );

    let err = scheduler::change_game_mode(&mut lobby, "Ann", "Poems", &mut out).unwrap_err();
    assert_eq!(err, DomainError::InvalidGameMode("Poems".to_string()));

    let err = scheduler::change_game_mode(&mut lobby, "Bob", "Drawings", &mut out).unwrap_err();
    assert!(matches!(err, DomainError::NotAuthorized(_)));
    assert_eq!(lobby.game_mode, GameMode::Ai);
}

#[test]
fn departure_during_collection_can_complete_the_phase() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(20);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    scheduler::submit_creation(&mut lobby, "Ann", "a".into(), &mut out, &mut rng);
    scheduler::submit_creation(&mut lobby, "Bob", "b".into(), &mut out, &mut rng);

    let cat = conn_of(&lobby, "Cat");
    lobby.remove_player(cat);
    let mut out = Outbox::new();
    scheduler::player_left(&mut lobby, "Cat", &mut out, &mut rng);

    assert_eq!(lobby.phase, Phase::Narrate);
    assert!(lobby.pool.iter().all(|c| c.owner != "Cat"));
}

#[test]
fn departed_players_creation_is_dropped() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(21);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    scheduler::submit_creation(&mut lobby, "Cat", "c".into(), &mut out, &mut rng);

    let cat = conn_of(&lobby, "Cat");
    lobby.remove_player(cat);
    scheduler::player_left(&mut lobby, "Cat", &mut out, &mut rng);

    assert_eq!(lobby.phase, Phase::CollectCreations);
    assert!(lobby.creations.is_empty());
}

#[test]
fn narrator_leaving_moves_to_next_turn() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat", "Dan"]);
    let mut rng = rng(22);
    start_and_submit_all(&mut lobby, &mut rng);
    let narrator = lobby.current_narrator.clone().unwrap();
    let index = lobby.current_turn_index;

    let conn = conn_of(&lobby, &narrator);
    lobby.remove_player(conn);
    let mut out = Outbox::new();
    scheduler::player_left(&mut lobby, &narrator, &mut out, &mut rng);

    assert!(lobby.current_turn_index > index);
    assert_ne!(lobby.current_narrator.as_deref(), Some(narrator.as_str()));
    assert!(out.messages_for(conn).is_empty());
}

#[test]
fn rename_mid_round_keeps_creation_attached() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
    let mut rng = rng(23);
    let mut out = Outbox::new();
    scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
    scheduler::submit_creation(&mut lobby, "Bob", "b".into(), &mut out, &mut rng);

    lobby.rename_player("Bob", "Bobby");
    scheduler::submit_creation(&mut lobby, "Ann", "a".into(), &mut out, &mut rng);
    scheduler::submit_creation(&mut lobby, "Cat", "c".into(), &mut out, &mut rng);

    assert_eq!(lobby.phase, Phase::Narrate);
    assert!(lobby.turn_order.contains(&"Bobby".to_string()));
    let turns = play_out_round(&mut lobby, &mut rng);
    assert!(turns.iter().all(|(n, o)| n != o));
    assert!(turns.iter().all(|(_, o)| o != "Bob"));
}

#[test]
fn departed_players_name_stays_reserved_until_game_ends() {
    let mut lobby = lobby_with(&["Ann", "Bob", "Cat", "Dan"]);
    let mut rng = rng(24);
    start_and_submit_all(&mut lobby, &mut rng);
    let owner = lobby
        .used_creations
        .iter()
        .next()
        .cloned()
        .expect("first turn uses a creation");

    let conn = conn_of(&lobby, &owner);
    lobby.remove_player(conn);
    let mut out = Outbox::new();
    scheduler::player_left(&mut lobby, &owner, &mut out, &mut rng);
    if lobby.is_admin(&owner) {
        lobby.admin_name = lobby.players.first().map(|p| p.name.clone());
    }

    assert_eq!(
        validate_rename(&lobby, &owner),
        Err(DomainError::NameTaken(owner.clone()))
    );
    assert_ne!(assign_nickname(&lobby, Some(owner.as_str()), &mut rng), owner);

    while lobby.phase == Phase::Narrate {
        assert!(lobby
            .pool
            .iter()
            .all(|c| !lobby.used_creations.contains(&c.owner)));
        let narrator = lobby.current_narrator.clone().unwrap();
        scheduler::finish_narration(&mut lobby, &narrator, &mut out, &mut rng);
    }
    let admin = lobby.admin_name.clone().unwrap();
    scheduler::final_decision(&mut lobby, &admin, Decision::EndGame, &mut out, &mut rng).unwrap();

    assert_eq!(validate_rename(&lobby, &owner), Ok(()));
}
