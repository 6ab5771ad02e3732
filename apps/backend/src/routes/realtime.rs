use actix_web::{guard, web};

use crate::routes::health;
use crate::ws::session;

/// `/` doubles as the WebSocket endpoint for clients that connect to the bare
/// host; plain GETs get the liveness text.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(
                web::get()
                    .guard(guard::Header("upgrade", "websocket"))
                    .to(session::upgrade),
            )
            .route(web::get().to(health::root)),
    );
    cfg.route("/ws", web::get().to(session::upgrade));
}
