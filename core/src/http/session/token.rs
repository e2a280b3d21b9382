//! Opaque session token generation.
//!
//! A token encodes a format version byte, the owning account id as a
//! varint, and 20 bytes of cryptographically random nonce, base64-encoded
//! with the URL-safe alphabet and no padding so it travels cleanly in
//! cookies and query parameters.
//!
//! The embedded account id is advisory only: authority always comes from a
//! successful store lookup, never from decoding the token. Decoding is
//! therefore not exposed outside this module.

use std::fmt;

use base64::prelude::*;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::http::auth::accounts::AccountId;

const TOKEN_VERSION: u8 = 0x01;
const NONCE_LEN: usize = 20;

/// Opaque session token. Two keys are equal iff their encoded strings are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    /// Wraps an encoded token received from a cookie or query parameter.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        SessionKey(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates session tokens and secondary secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCodec;

impl TokenCodec {
    pub fn new() -> Self {
        TokenCodec
    }

    /// Generates a fresh token for the given account. Two calls with the
    /// same account id produce different tokens.
    pub fn new_token(&self, account: AccountId) -> SessionKey {
        let mut buf = Vec::with_capacity(1 + 10 + NONCE_LEN);
        buf.push(TOKEN_VERSION);
        write_varint(&mut buf, account.get());

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        buf.extend_from_slice(&nonce);

        SessionKey(BASE64_URL_SAFE_NO_PAD.encode(&buf))
    }

    /// Generates a standalone random secret, used for session ids and CSRF
    /// auth secrets. Independent of any session key.
    pub fn new_secret(&self) -> String {
        let mut bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut bytes);
        BASE64_URL_SAFE_NO_PAD.encode(bytes)
    }
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}
