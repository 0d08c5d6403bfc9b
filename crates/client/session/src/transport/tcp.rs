//! Newline-delimited JSON over TCP.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{Connector, FrameSink, Inbound, Link, TransportError};

/// Connects over plain TCP, one JSON frame per line.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str) -> Result<Link, TransportError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| TransportError::Connect {
                address: address.to_owned(),
                source,
            })?;
        let _ = stream.set_nodelay(true);
        let (read_half, mut write_half) = stream.into_split();

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            let reason = loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        if inbound_tx.send(Inbound::Message(line)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => break None,
                    Err(error) => break Some(error.to_string()),
                }
            };
            let _ = inbound_tx.send(Inbound::Closed { reason });
        });

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(mut frame) = outbound_rx.recv().await {
                frame.push('\n');
                if let Err(error) = write_half.write_all(frame.as_bytes()).await {
                    debug!(target: "session::transport", %error, "tcp write failed");
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        });

        debug!(target: "session::transport", address, "tcp link open");
        Ok(Link {
            sink: Box::new(TcpSink {
                outbound: Some(outbound_tx),
                reader,
                writer,
            }),
            inbound: inbound_rx,
        })
    }
}

struct TcpSink {
    outbound: Option<mpsc::UnboundedSender<String>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl FrameSink for TcpSink {
    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        if self.writer.is_finished() {
            return Err(TransportError::Closed);
        }
        outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        // Dropping the sender lets the writer flush and shut down.
        self.outbound = None;
        self.reader.abort();
    }
}

impl Drop for TcpSink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
