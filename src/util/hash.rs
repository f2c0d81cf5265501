use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

use crate::core::types::{SessionId, SessionKey};

/// Derives store keys from session cookies so stored rows cannot be replayed
/// as cookies.
#[derive(Clone)]
pub struct SessionHasher {
    secret_key: String,
}

impl SessionHasher {
    pub fn with_secret_key(secret_key: String) -> Self {
        Self { secret_key }
    }

    pub fn key(&self, session: &SessionId) -> SessionKey {
        let mut hasher = Sha256::new();
        hasher.update(self.secret_key.as_bytes());
        hasher.update([0u8]);
        hasher.update(session.as_ref().as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize()).into()
    }
}

impl fmt::Debug for SessionHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionHasher {{ ... }}")
    }
}
