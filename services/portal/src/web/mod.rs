pub mod admin;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use middleware::require_admin;
pub use rest::{get_sign_handler, list_signs_handler};
pub use ws_handler::ws_handler;
