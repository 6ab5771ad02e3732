use actix::Actor;
use actix_web::{web, App, HttpServer};
use storyteller_backend::{
    cors_middleware, routes, telemetry, AppState, LobbyHub, RequestTrace, ServerConfig,
    StructuredLogger,
};
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    info!(
        host = %config.host,
        port = config.port,
        creating_time = config.lobby.creating_time,
        narration_time = config.lobby.narration_time,
        "starting storyteller backend"
    );

    let hub = LobbyHub::new(config.lobby)
        .with_unjoined_ttl(config.unjoined_lobby_ttl)
        .start();
    let data = web::Data::new(AppState::new(hub));
    let origins = config.cors_origins.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(cors_middleware(&origins))
            .wrap(StructuredLogger)
            .wrap(RequestTrace)
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
