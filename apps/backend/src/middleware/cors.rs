use actix_cors::Cors;
use actix_web::http::header;

/// CORS for the lobby API and WebSocket handshake.
///
/// With no configured origins any origin is accepted, since the game client
/// is usually served from a different host than the backend. Only `http(s)`
/// entries are honoured.
pub fn cors_middleware(origins: &[String]) -> Cors {
    let allowed: Vec<&str> = origins
        .iter()
        .map(|s| s.trim())
        .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
        .collect();

    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers(vec![header::HeaderName::from_static("x-request-id")])
        .max_age(3600);

    if allowed.is_empty() {
        cors = cors.allow_any_origin();
    } else {
        for origin in allowed {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}
