// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::errors::{RouterError, RouterResult};

/// Receives provider output chunk by chunk, as soon as each arrives.
#[async_trait]
pub trait ChunkSink: Send {
    async fn send_chunk(&mut self, chunk: Bytes) -> RouterResult<()>;
}

#[async_trait]
impl ChunkSink for mpsc::Sender<Bytes> {
    async fn send_chunk(&mut self, chunk: Bytes) -> RouterResult<()> {
        self.send(chunk)
            .await
            .map_err(|_| RouterError::Io(std::io::ErrorKind::BrokenPipe.into()))
    }
}

#[async_trait]
impl ChunkSink for Vec<Bytes> {
    async fn send_chunk(&mut self, chunk: Bytes) -> RouterResult<()> {
        self.push(chunk);
        Ok(())
    }
}
