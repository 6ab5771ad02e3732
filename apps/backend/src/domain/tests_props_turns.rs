//! Property tests for round scheduling (pure domain).
//!
//! Properties tested:
//! - Nobody is ever handed their own creation
//! - A creation is narrated at most once per round
//! - Every round reaches `Final` within one turn per turn-order entry
//! - Only submitted creations are narrated
//! - The pool never holds a creation that was already narrated

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::domain::lobby::{Lobby, Phase, TimerKind};
use crate::domain::outbox::Outbox;
use crate::domain::scheduler;
use crate::domain::test_prelude::{self, lobby_with, rng};
use crate::protocol::ServerMsg;

const NAMES: [&str; 8] = ["Ann", "Bob", "Cat", "Dan", "Eve", "Fay", "Gus", "Hal"];

fn pool_excludes_used(lobby: &Lobby) -> bool {
    lobby
        .pool
        .iter()
        .all(|c| !lobby.used_creations.contains(&c.owner))
}

proptest! {
    #![proptest_config(test_prelude::proptest_config())]

    #[test]
    fn prop_round_is_fair_and_terminates(
        players in 1usize..=8,
        submitted in proptest::collection::vec(any::<bool>(), 8),
        use_timer in proptest::collection::vec(any::<bool>(), 8),
        seed in any::<u64>(),
    ) {
        let mut lobby = lobby_with(&NAMES[..players]);
        let mut rng = rng(seed);
        let mut out = Outbox::new();
        scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();

        let mut expected_owners = BTreeSet::new();
        for (idx, name) in NAMES[..players].iter().enumerate() {
            if submitted[idx] {
                expected_owners.insert((*name).to_string());
                scheduler::submit_creation(&mut lobby, name, format!("img-{name}"), &mut out, &mut rng);
                prop_assert!(pool_excludes_used(&lobby));
            }
        }
        if lobby.phase == Phase::CollectCreations {
            let token = lobby.timer(TimerKind::Creating).unwrap();
            scheduler::timer_fired(&mut lobby, TimerKind::Creating, token, &mut out, &mut rng);
        }
        prop_assert!(pool_excludes_used(&lobby));

        let mut narrated = Vec::new();
        let mut steps = 0;
        while lobby.phase == Phase::Narrate {
            prop_assert!(steps < players, "more turns than players");
            let narrator = lobby.current_narrator.clone().unwrap();
            let conn = test_prelude::conn_of(&lobby, &narrator);
            let Some(ServerMsg::YourTurn { creation_owner, .. }) = out.messages_for(conn).last().copied() else {
                panic!("narrator did not receive yourTurn");
            };
            prop_assert_ne!(creation_owner, &narrator);
            narrated.push(creation_owner.clone());

            out = Outbox::new();
            if use_timer[steps] {
                let token = lobby.timer(TimerKind::Turn).unwrap();
                scheduler::timer_fired(&mut lobby, TimerKind::Turn, token, &mut out, &mut rng);
            } else {
                scheduler::finish_narration(&mut lobby, &narrator, &mut out, &mut rng);
            }
            prop_assert!(pool_excludes_used(&lobby));
            steps += 1;
        }

        prop_assert_eq!(lobby.phase, Phase::Final);
        let unique: BTreeSet<_> = narrated.iter().cloned().collect();
        prop_assert_eq!(unique.len(), narrated.len());
        prop_assert!(unique.is_subset(&expected_owners));
        prop_assert_eq!(lobby.timer(TimerKind::Turn), None);
        prop_assert_eq!(lobby.timer(TimerKind::Creating), None);
    }
}

#[test]
fn turn_order_is_shuffled_uniformly() {
    let mut firsts = [0u32; 3];
    let mut rng = rng(99);
    for _ in 0..900 {
        let mut lobby = lobby_with(&["Ann", "Bob", "Cat"]);
        let mut out = Outbox::new();
        scheduler::start_game(&mut lobby, "Ann", &mut out, &mut rng).unwrap();
        let idx = ["Ann", "Bob", "Cat"]
            .iter()
            .position(|n| *n == lobby.turn_order[0])
            .unwrap();
        firsts[idx] += 1;
    }
    for count in firsts {
        assert!((200..400).contains(&count), "skewed first-turn counts: {firsts:?}");
    }
}
