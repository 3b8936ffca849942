pub mod auth;
pub mod csrf;
pub mod password;
pub mod token;
