//! Auth collaborator interface: opaque bearer tokens resolved to user ids.
//!
//! Credential checks and token issuance policy live outside the core; this
//! registry only maps tokens to identities for requests and live-connection
//! handshakes.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::helpers::new_id;

#[derive(Default)]
pub struct TokenRegistry {
    tokens: Mutex<HashMap<String, String>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        TokenRegistry::default()
    }

    pub fn issue(&self, user_id: &str) -> String {
        let token = new_id();
        self.tokens
            .lock()
            .expect("token registry lock poisoned")
            .insert(token.clone(), user_id.to_string());
        token
    }

    pub fn resolve(&self, token: &str) -> Option<String> {
        self.tokens
            .lock()
            .expect("token registry lock poisoned")
            .get(token)
            .cloned()
    }

    /// Invalidates every token held by `user_id`; called when the account
    /// is deleted.
    pub fn revoke_user(&self, user_id: &str) {
        self.tokens
            .lock()
            .expect("token registry lock poisoned")
            .retain(|_, uid| uid != user_id);
    }
}
