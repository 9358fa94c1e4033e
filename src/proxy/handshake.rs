// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Connection preamble: one line carrying the hex session id.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::errors::{RouterError, RouterResult};
use crate::utils::hash::Hash;

pub const MAX_HANDSHAKE_LEN: u64 = 128;

/// Reads the handshake line and parses the session id. Bytes after the
/// newline stay buffered in `reader`.
pub async fn read_session_id<R>(reader: &mut R) -> RouterResult<Hash>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(80);
    let read = reader
        .take(MAX_HANDSHAKE_LEN)
        .read_until(b'\n', &mut line)
        .await?;

    if read == 0 {
        return Err(RouterError::InvalidArgument(
            "connection closed before handshake".to_string(),
        ));
    }
    if line.last() != Some(&b'\n') {
        return Err(RouterError::InvalidArgument(format!(
            "handshake line missing or longer than {} bytes",
            MAX_HANDSHAKE_LEN
        )));
    }

    let text = std::str::from_utf8(&line)
        .map_err(|_| RouterError::InvalidIdentifier("handshake is not utf-8".to_string()))?;

    Hash::from_hex(text.trim_end_matches(['\n', '\r']))
}

pub fn encode_handshake(session_id: &Hash) -> Vec<u8> {
    format!("{}\n", session_id).into_bytes()
}
