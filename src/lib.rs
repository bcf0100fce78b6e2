// AccessGuard: residential community access control

pub mod api;
pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod realtime;
pub mod services;
pub mod store;

pub use config::Config;
pub use errors::{AppError, Result};
