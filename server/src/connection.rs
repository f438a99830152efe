//! One client connection: writer task, reader loop, message routing.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use dth_types::{ErrorPayload, Message, UNBOUND_CONTEXT_ID, message_types};

use crate::codec::{FrameReader, FrameWriter};
use crate::protocol::ProtocolManager;
use crate::registry::ContextRegistry;

/// Sending side of one connection, shared with every context that needs
/// to reach this client.
///
/// [`transmit`](Self::transmit) stamps the host id and enqueues the
/// frame for the writer task. A `false` return means the transport is
/// gone; callers treat that as a lost client, never as a fatal error.
#[derive(Debug)]
pub struct ConnectionHandle {
    host_name: String,
    outbound: mpsc::UnboundedSender<Message>,
}

impl ConnectionHandle {
    #[must_use]
    pub fn new(host_name: String) -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                host_name,
                outbound,
            }),
            rx,
        )
    }

    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn transmit(&self, mut message: Message) -> bool {
        message.host_id = Some(self.host_name.clone());
        let accepted = self.outbound.send(message).is_ok();
        if !accepted {
            tracing::debug!(host = %self.host_name, "dropping message for closed connection");
        }
        accepted
    }
}

/// Serve one client until it disconnects.
///
/// Spawns a writer task draining the outbound channel, then reads frames
/// and routes each one: context enumeration is answered inline, protocol
/// negotiation goes to the [`ProtocolManager`], everything else lands in
/// the project context named by the message's context id.
pub async fn run<S>(
    stream: S,
    host_name: String,
    registry: Arc<ContextRegistry>,
    protocol: Arc<ProtocolManager>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (handle, mut outbound_rx) = ConnectionHandle::new(host_name);

    tokio::spawn(async move {
        let mut writer = FrameWriter::new(write_half);
        while let Some(message) = outbound_rx.recv().await {
            if let Err(error) = writer.write_message(&message).await {
                tracing::warn!(error = %error, "write failed, closing outbound side");
                break;
            }
        }
    });

    let mut reader = FrameReader::new(read_half);
    loop {
        match reader.read_message().await {
            Ok(Some(message)) => {
                tracing::debug!(
                    message_type = %message.message_type,
                    context = message.context_id,
                    "received message"
                );
                if let Err(error) = dispatch(message, &handle, &registry, &protocol) {
                    tracing::error!(error = %error, "failed to handle message");
                    let payload = ErrorPayload {
                        message: Some(error.to_string()),
                        ..ErrorPayload::default()
                    };
                    if let Ok(value) = serde_json::to_value(&payload) {
                        handle.transmit(Message::from_payload(
                            message_types::ERROR,
                            UNBOUND_CONTEXT_ID,
                            value,
                        ));
                    }
                }
            }
            Ok(None) => {
                tracing::info!(host = handle.host_name(), "client disconnected");
                return Ok(());
            }
            Err(error) => {
                return Err(error).context("reading client frame");
            }
        }
    }
}

fn dispatch(
    message: Message,
    handle: &Arc<ConnectionHandle>,
    registry: &Arc<ContextRegistry>,
    protocol: &ProtocolManager,
) -> Result<()> {
    if message.message_type == message_types::ENUMERATE_PROJECT_CONTEXTS {
        let payload = registry.project_contexts();
        let value = serde_json::to_value(&payload).context("composing context enumeration")?;
        handle.transmit(Message::from_payload(
            message_types::PROJECT_CONTEXTS,
            UNBOUND_CONTEXT_ID,
            value,
        ));
        return Ok(());
    }

    if ProtocolManager::is_negotiation(&message) {
        protocol.negotiate(&message, handle);
        return Ok(());
    }

    let context = registry.get_or_create(message.context_id);
    context.on_receive(message, Arc::clone(handle));
    Ok(())
}
