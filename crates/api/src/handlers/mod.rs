pub mod admin;
pub mod auth;
pub mod devices;
pub mod oauth;
