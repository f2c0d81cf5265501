use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

use crate::core::types::{CsrfState, SessionId};

pub trait FromRandom {
    fn from_random() -> Self;
}

impl FromRandom for CsrfState {
    fn from_random() -> Self {
        CsrfState(random_string(32))
    }
}

impl FromRandom for SessionId {
    fn from_random() -> Self {
        SessionId(random_string(32))
    }
}

/// `size` random bytes, base64url-encoded without padding.
fn random_string(size: usize) -> String {
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
