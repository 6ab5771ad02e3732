//! Wire protocol spoken over the lobby WebSocket.

pub mod messages;

pub use messages::{
    ChangeGameMode, ChangeName, ClientMsg, ConfigureTimers, Decision, FinalDecision, JoinLobby,
    ServerMsg, SubmitCreation,
};
