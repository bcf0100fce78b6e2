pub mod access_logs;
pub mod auth;
pub mod deliveries;
pub mod extract;
pub mod guest_codes;
pub mod health;
pub mod notifications;
pub mod residents;
pub mod response;
pub mod routes;
pub mod users;
pub mod visits;
pub mod ws;

pub use routes::{create_router, AppState};
