//! Datagram relay listener.
//!
//! Receives forwarded form submissions on a local UDP socket and applies
//! them to the store, one datagram at a time. A datagram is fully processed
//! (decoded, parsed, merged, written to disk) before the next receive, so
//! the loop is the serialization point for concurrent submissions. Bad
//! input never stops the loop: it is logged and dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::form;
use crate::store::JsonStore;

/// Long-lived listener applying relayed submissions to the store.
#[derive(Debug)]
pub struct RelayListener {
    socket: UdpSocket,
    store: Arc<JsonStore>,
    max_datagram_bytes: usize,
}

impl RelayListener {
    /// Bind the relay socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        store: Arc<JsonStore>,
        max_datagram_bytes: usize,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| Error::bind(addr, source))?;

        Ok(Self {
            socket,
            store,
            max_datagram_bytes,
        })
    }

    /// The address the socket is actually bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be retrieved.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive and process datagrams until the task is cancelled.
    ///
    /// Datagrams longer than the configured maximum are truncated by the
    /// receive; whatever decodes from the truncated bytes is processed.
    ///
    /// # Errors
    ///
    /// Returns an error only if receiving itself fails; submission-level
    /// failures are logged and swallowed.
    pub async fn run(self) -> Result<()> {
        info!("Relay listener bound to {}", self.socket.local_addr()?);

        let mut buf = vec![0u8; self.max_datagram_bytes];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            debug!("Received {len} byte(s) from {peer}");

            match apply_datagram(&self.store, &buf[..len]).await {
                Ok(key) => info!("Stored submission from {peer} under {key:?}"),
                Err(err) => error!("Dropped submission from {peer}: {err}"),
            }
        }
    }
}

/// Decode one datagram as a URL-encoded form body and upsert it.
///
/// Returns the store key the submission was recorded under.
///
/// # Errors
///
/// Returns an error if the datagram is not UTF-8, a form segment is
/// malformed, or the store cannot be rewritten.
pub async fn apply_datagram(store: &JsonStore, datagram: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(datagram)?;
    let fields = form::parse_body(text)?;
    store.upsert(fields).await
}
