use actix_web::web;

pub mod health;
pub mod lobbies;
pub mod realtime;

/// Registers every HTTP route. Shared by `main.rs` and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(realtime::configure_routes)
        .configure(lobbies::configure_routes)
        .configure(health::configure_routes);
}
