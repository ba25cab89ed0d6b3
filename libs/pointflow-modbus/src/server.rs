//! Modbus TCP server loop
//!
//! Each accepted connection runs in its own task, framed by
//! [`ServerCodec`]. Requests are processed one at a time per connection and
//! the bank lock is held only while a request executes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::bank::RegisterBank;
use crate::codec::ServerCodec;
use crate::error::Result;
use crate::frame::FrameMode;
use crate::processor::RequestProcessor;

/// Register bank shared between connections
pub type SharedBank = Arc<Mutex<RegisterBank>>;

/// Accept connections until the listener fails
pub async fn serve(
    listener: TcpListener,
    bank: SharedBank,
    processor: RequestProcessor,
) -> Result<()> {
    serve_until(listener, bank, processor, std::future::pending()).await
}

/// Accept connections until `shutdown` resolves or the listener fails
///
/// The listener is dropped on shutdown; connections already accepted keep
/// running until their peers hang up.
pub async fn serve_until<F>(
    listener: TcpListener,
    bank: SharedBank,
    processor: RequestProcessor,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let local = listener.local_addr()?;
    info!(
        "Modbus server listening on {} for unit {}",
        local,
        processor.unit_id()
    );
    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut shutdown => {
                info!("Modbus server on {} stopped accepting connections", local);
                return Ok(());
            },
        };
        debug!("Connection accepted from {}", peer);
        let bank = Arc::clone(&bank);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, bank, processor).await {
                warn!("Connection {} closed: {}", peer, e);
            }
        });
    }
}

/// Serve one connection until the peer hangs up or sends a malformed frame
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    bank: SharedBank,
    processor: RequestProcessor,
) -> Result<()> {
    let mut framed = Framed::new(stream, ServerCodec::new(FrameMode::Tcp));
    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let response = {
            let mut bank = bank.lock();
            processor.process(&frame, &mut bank)
        };
        if let Some(response) = response {
            framed.send(response).await?;
        }
    }
    debug!("Connection {} closed by peer", peer);
    Ok(())
}
