pub mod auth;
pub mod nonce;
