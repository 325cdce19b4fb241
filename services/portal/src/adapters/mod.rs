pub mod auth;
pub mod store;

pub use auth::PgAuthGateway;
pub use store::PgStore;
