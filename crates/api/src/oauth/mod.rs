//! Google and Apple sign-in.
//!
//! - [`providers`] -- endpoints, issuers and authorization URL builders.
//! - [`gateway`] -- the [`OAuthGateway`] trait and its HTTP implementation.
//! - [`jwks`] -- cached provider signing keys.
//! - [`identity`] -- mapping a verified identity onto a local account.

pub mod gateway;
pub mod identity;
pub mod jwks;
pub mod providers;

pub use gateway::{HttpOAuthGateway, OAuthError, OAuthGateway, VerifiedIdentity};
