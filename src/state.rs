use tower_cookies::Key;

use crate::config;
use crate::store::Collection;

/// Shared application state: one store-collection handle per resource plus
/// the session cookie signing key. Handles are cloned into each resource
/// router at construction; nothing reaches for collections ambiently.
#[derive(Clone)]
pub struct AppState {
    pub users: Collection,
    pub companies: Collection,
    pub messages: Collection,
    pub sessions: Collection,
    pub memberships: Collection,
    pub signing_key: Key,
}

impl AppState {
    /// Fresh collections, signing key derived from the configured secret.
    pub fn new() -> Self {
        Self::with_secret(&config::config().security.cookie_secret)
    }

    /// Panics if the secret is shorter than 32 bytes (key derivation
    /// requirement); `main` checks this up front.
    pub fn with_secret(secret: &str) -> Self {
        Self {
            users: Collection::new("users"),
            companies: Collection::new("companies"),
            messages: Collection::new("messages"),
            sessions: Collection::new("sessions"),
            memberships: Collection::new("memberships"),
            signing_key: Key::derive_from(secret.as_bytes()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
