//! UDP shims for the inbound packet channels.
//!
//! The network collaborator owns addressing, framing and packet content;
//! these tasks only move datagrams into the process.

use tokio::{net::UdpSocket, sync::mpsc};
use tracing::{info, warn};

/// Largest datagram the collaborator sends.
const MAX_DATAGRAM: usize = 1024;

pub(crate) async fn task(socket: UdpSocket, tx: mpsc::Sender<Vec<u8>>) {
    match socket.local_addr() {
        Ok(addr) => info!("Listening on {addr}"),
        Err(e) => warn!("Listening on unknown address: {e}"),
    }

    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, _peer)) => {
                if tx.send(buf[..len].to_vec()).await.is_err() {
                    // The receiving loop is gone; nothing left to feed.
                    return;
                }
            }
            Err(e) => warn!("UDP receive failed: {e}"),
        }
    }
}
