// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fixed-width identifier used for session, bid and model ids.

use ethers::types::H256;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::RouterError;

pub const HASH_LENGTH: usize = 32;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(H256);

impl Hash {
    pub const fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(H256(bytes))
    }

    pub fn zero() -> Self {
        Self(H256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        self.0.as_fixed_bytes()
    }

    pub fn to_fixed_bytes(self) -> [u8; HASH_LENGTH] {
        self.0.to_fixed_bytes()
    }

    pub fn as_h256(&self) -> H256 {
        self.0
    }

    /// Decodes hex with or without a `0x` prefix. Odd-length input is left-padded
    /// with a single zero nibble; the decoded value must be exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, RouterError> {
        let trimmed = s.trim();
        let digits = strip_0x(trimmed);

        let padded;
        let digits = if digits.len() % 2 == 1 {
            padded = format!("0{}", digits);
            padded.as_str()
        } else {
            digits
        };

        let bytes = hex::decode(digits)
            .map_err(|e| RouterError::InvalidIdentifier(format!("{}: {}", trimmed, e)))?;

        if bytes.len() != HASH_LENGTH {
            return Err(RouterError::InvalidIdentifier(format!(
                "expected {} bytes, got {}",
                HASH_LENGTH,
                bytes.len()
            )));
        }

        Ok(Self(H256::from_slice(&bytes)))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_bytes()))
    }
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

impl FromStr for Hash {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl From<[u8; HASH_LENGTH]> for Hash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Self::new(bytes)
    }
}

impl From<H256> for Hash {
    fn from(value: H256) -> Self {
        Self(value)
    }
}

impl From<Hash> for [u8; HASH_LENGTH] {
    fn from(value: Hash) -> Self {
        value.to_fixed_bytes()
    }
}

impl From<Hash> for H256 {
    fn from(value: Hash) -> Self {
        value.0
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
