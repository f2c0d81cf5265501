//! Proof Key for Code Exchange (RFC 7636), S256 only.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Length of generated verifiers. RFC 7636 allows 43..=128.
pub const VERIFIER_LEN: usize = 64;

const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Transformation {
    S256,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Challenge {
    #[serde(rename = "code_challenge")]
    pub code: String,
    #[serde(rename = "code_challenge_method")]
    pub method: Transformation,
}

impl Challenge {
    pub fn from_verifier(verifier: &Verifier) -> Self {
        let digest = Sha256::digest(verifier.value.as_bytes());
        Self {
            code: URL_SAFE_NO_PAD.encode(digest),
            method: Transformation::S256,
        }
    }
}

/// Client-held secret; only ever sent in the final token exchange.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Verifier {
    #[serde(rename = "code_verifier")]
    value: String,
}

impl Verifier {
    pub fn new(value: String) -> Self {
        Self { value }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    /// Draws [`VERIFIER_LEN`] characters uniformly from the unreserved URI set.
    pub fn generate() -> Result<Self, rand::Error> {
        // largest multiple of the alphabet size that fits in a byte
        let limit = (256 / UNRESERVED.len() * UNRESERVED.len()) as u8;

        let mut value = String::with_capacity(VERIFIER_LEN);
        let mut buf = [0u8; VERIFIER_LEN];
        while value.len() < VERIFIER_LEN {
            OsRng.try_fill_bytes(&mut buf)?;
            value.extend(
                buf.iter()
                    .filter(|b| **b < limit)
                    .map(|b| UNRESERVED[*b as usize % UNRESERVED.len()] as char)
                    .take(VERIFIER_LEN - value.len()),
            );
        }
        Ok(Self { value })
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Verifier(..)")
    }
}

/// Generates a fresh verifier and the challenge derived from it.
pub fn generate() -> Result<(Verifier, Challenge), rand::Error> {
    let verifier = Verifier::generate()?;
    let challenge = Challenge::from_verifier(&verifier);
    Ok((verifier, challenge))
}
