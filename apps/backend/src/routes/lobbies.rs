use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::domain::LobbyId;
use crate::error::AppError;
use crate::state::app_state::AppState;
use crate::ws::hub::CreateLobby;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLobbyResponse {
    lobby_id: LobbyId,
}

async fn create_lobby(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let lobby_id = app_state
        .hub
        .send(CreateLobby)
        .await
        .map_err(|err| AppError::internal(format!("lobby hub unavailable: {err}")))??;

    Ok(HttpResponse::Ok().json(CreateLobbyResponse { lobby_id }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/create-lobby", web::get().to(create_lobby));
}
