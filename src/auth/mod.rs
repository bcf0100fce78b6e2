pub mod jwt;
pub mod password;
pub mod principal;

pub use jwt::JwtManager;
pub use principal::{authenticate, bearer_token, Principal};
