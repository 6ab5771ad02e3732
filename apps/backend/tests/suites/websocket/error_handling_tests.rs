use std::time::Duration;

use backend_test_support::WebSocketClient;
use serde_json::json;
use storyteller_backend::domain::LobbySettings;

use crate::common::RECV_TIMEOUT;
use crate::support::server::TestServer;

#[actix_web::test]
async fn unknown_lobby_keeps_connection_usable() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LobbySettings::default()).await?;
    let lobby_id = server.create_lobby().await?;
    let missing = if lobby_id == 9999 { 1000 } else { 9999 };

    let mut client = WebSocketClient::connect_retry(&server.ws_url("/"), Duration::from_secs(2)).await?;
    client
        .send_json(&json!({"type": "joinLobby", "payload": {"lobbyId": missing}}))
        .await?;
    let err = client.recv_json_timeout(RECV_TIMEOUT).await?.unwrap();
    assert_eq!(err["type"], "error");
    assert_eq!(err["payload"]["code"], "LOBBY_NOT_FOUND");

    client
        .send_json(&json!({"type": "joinLobby", "payload": {"lobbyId": lobby_id}}))
        .await?;
    client.recv_type("joinSuccess", RECV_TIMEOUT).await?;

    server.stop().await;
    Ok(())
}

#[actix_web::test]
async fn malformed_frames_get_invalid_message() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LobbySettings::default()).await?;
    let lobby_id = server.create_lobby().await?;
    let (mut ann, _) = server.join(lobby_id, Some("Ann")).await?;
    let (mut bob, _) = server.join(lobby_id, Some("Bob")).await?;
    ann.recv_type("updatePlayerList", RECV_TIMEOUT).await?;

    ann.send_text("{definitely not json").await?;
    let err = ann.recv_json_timeout(RECV_TIMEOUT).await?.unwrap();
    assert_eq!(err["payload"]["code"], "INVALID_MESSAGE");

    ann.send_binary(vec![1, 2, 3]).await?;
    let err = ann.recv_json_timeout(RECV_TIMEOUT).await?.unwrap();
    assert_eq!(err["payload"]["code"], "INVALID_MESSAGE");

    // Errors are private to the sender.
    bob.expect_silence(Duration::from_millis(200)).await?;

    server.stop().await;
    Ok(())
}

#[actix_web::test]
async fn unknown_types_and_unbound_messages_are_silent() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LobbySettings::default()).await?;
    let lobby_id = server.create_lobby().await?;
    let (mut ann, _) = server.join(lobby_id, Some("Ann")).await?;

    ann.send_json(&json!({"type": "doABarrelRoll", "payload": {}})).await?;
    ann.expect_silence(Duration::from_millis(200)).await?;

    let mut stranger = WebSocketClient::connect_retry(&server.ws_url("/"), Duration::from_secs(2)).await?;
    stranger.send_json(&json!({"type": "startGame"})).await?;
    stranger.expect_silence(Duration::from_millis(200)).await?;
    ann.expect_silence(Duration::from_millis(100)).await?;

    server.stop().await;
    Ok(())
}

#[actix_web::test]
async fn non_admin_start_is_not_authorized() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LobbySettings::default()).await?;
    let lobby_id = server.create_lobby().await?;
    let (_ann, _) = server.join(lobby_id, Some("Ann")).await?;
    let (mut bob, _) = server.join(lobby_id, Some("Bob")).await?;

    bob.send_json(&json!({"type": "startGame", "payload": {}})).await?;
    let err = bob.recv_type("error", RECV_TIMEOUT).await?;
    assert_eq!(err["payload"]["code"], "NOT_AUTHORIZED");

    server.stop().await;
    Ok(())
}
