//! Display-name allocation for joining players.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::domain::lobby::Lobby;
use crate::errors::DomainError;

pub const NICKNAME_POOL: [&str; 20] = [
    "SkyWalker",
    "IronClad",
    "MysticMage",
    "ShadowHunter",
    "ThunderBolt",
    "SilentAssassin",
    "LoneWolf",
    "SilverArrow",
    "NightCrawler",
    "CrimsonKnight",
    "GoldenEagle",
    "FrostDragon",
    "EmeraldWizard",
    "DarkPhoenix",
    "CyberNinja",
    "BlazeRider",
    "StealthSniper",
    "ElectricWolf",
    "PhantomRogue",
    "StormBringer",
];

/// Picks the name a joining player will use.
///
/// A non-blank `requested` name that nobody in the lobby uses is returned
/// verbatim. Otherwise an unused pool name is drawn uniformly. Once all twenty
/// pool names are taken, a random pool name gets the smallest numeric suffix
/// (starting at 2) that makes it unique.
pub fn assign_nickname<R: Rng + ?Sized>(
    lobby: &Lobby,
    requested: Option<&str>,
    rng: &mut R,
) -> String {
    if let Some(name) = requested.filter(|n| !n.trim().is_empty()) {
        if !lobby.name_in_use(name) {
            return name.to_string();
        }
    }

    let available: Vec<&str> = NICKNAME_POOL
        .iter()
        .copied()
        .filter(|name| !lobby.name_in_use(name))
        .collect();
    if let Some(name) = available.choose(rng) {
        return (*name).to_string();
    }

    let base = NICKNAME_POOL[rng.random_range(0..NICKNAME_POOL.len())];
    let mut suffix = 2u32;
    loop {
        let candidate = format!("{base}{suffix}");
        if !lobby.name_in_use(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Checks a `changeName` request against the lobby's current names.
pub fn validate_rename(lobby: &Lobby, new_name: &str) -> Result<(), DomainError> {
    if new_name.trim().is_empty() {
        return Err(DomainError::invalid_message("name must not be blank"));
    }
    if lobby.name_in_use(new_name) {
        return Err(DomainError::NameTaken(new_name.to_string()));
    }
    Ok(())
}
