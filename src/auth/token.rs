//! Session token formatting and parsing.
//!
//! Format: `sf_v1_{session uuid, simple}.{64 hex chars of secret}`. Only the
//! SHA-256 of the secret is persisted; presented secrets are compared against
//! it in constant time.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

pub const TOKEN_PREFIX: &str = "sf";
pub const TOKEN_VERSION: &str = "v1";

/// Number of secret bytes encoded in a token.
pub const SECRET_BYTES: usize = 32;

const SECRET_HEX_CHARS: usize = SECRET_BYTES * 2;

#[derive(Clone)]
pub struct TokenSecret {
    bytes: [u8; SECRET_BYTES],
}

impl TokenSecret {
    pub const fn from_bytes(bytes: [u8; SECRET_BYTES]) -> Self {
        Self { bytes }
    }

    pub fn generate() -> Self {
        let mut bytes = [0_u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn hash(&self) -> Vec<u8> {
        Sha256::digest(self.bytes).to_vec()
    }

    /// Constant-time check against a stored SHA-256 digest.
    pub fn matches(&self, stored_hash: &[u8]) -> bool {
        self.hash().ct_eq(stored_hash).into()
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecret(**redacted**)")
    }
}

#[derive(Debug, Clone)]
pub struct ParsedToken {
    pub session_id: Uuid,
    pub secret: TokenSecret,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("session token format is invalid")]
    InvalidFormat,

    #[error("session token uses an unsupported version")]
    UnsupportedVersion,

    #[error("session token secret encoding is invalid")]
    InvalidSecretEncoding,
}

pub fn format_token(session_id: Uuid, secret: &TokenSecret) -> String {
    format!("{TOKEN_PREFIX}_{TOKEN_VERSION}_{}.{}", session_id.simple(), encode_hex(&secret.bytes))
}

pub fn parse_token(token: &str) -> Result<ParsedToken, TokenError> {
    let (prefix_and_id, secret_hex) = token.split_once('.').ok_or(TokenError::InvalidFormat)?;

    let mut id_parts = prefix_and_id.splitn(3, '_');
    let prefix = id_parts.next().ok_or(TokenError::InvalidFormat)?;
    let version = id_parts.next().ok_or(TokenError::InvalidFormat)?;
    let session_segment = id_parts.next().ok_or(TokenError::InvalidFormat)?;

    if prefix != TOKEN_PREFIX {
        return Err(TokenError::InvalidFormat);
    }
    if version != TOKEN_VERSION {
        return Err(TokenError::UnsupportedVersion);
    }

    let session_id = Uuid::try_parse(session_segment).map_err(|_| TokenError::InvalidFormat)?;
    let bytes = decode_hex(secret_hex).ok_or(TokenError::InvalidSecretEncoding)?;

    Ok(ParsedToken { session_id, secret: TokenSecret::from_bytes(bytes) })
}

fn encode_hex(bytes: &[u8; SECRET_BYTES]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let mut encoded = String::with_capacity(SECRET_HEX_CHARS);
    for byte in bytes {
        encoded.push(HEX[(byte >> 4) as usize] as char);
        encoded.push(HEX[(byte & 0x0f) as usize] as char);
    }
    encoded
}

fn decode_hex(hex: &str) -> Option<[u8; SECRET_BYTES]> {
    if hex.len() != SECRET_HEX_CHARS {
        return None;
    }

    let mut bytes = [0_u8; SECRET_BYTES];
    let chars = hex.as_bytes();
    for (index, byte) in bytes.iter_mut().enumerate() {
        let hi = decode_nibble(chars[index * 2])?;
        let lo = decode_nibble(chars[index * 2 + 1])?;
        *byte = (hi << 4) | lo;
    }
    Some(bytes)
}

fn decode_nibble(value: u8) -> Option<u8> {
    match value {
        b'0'..=b'9' => Some(value - b'0'),
        b'a'..=b'f' => Some(value - b'a' + 10),
        b'A'..=b'F' => Some(value - b'A' + 10),
        _ => None,
    }
}
