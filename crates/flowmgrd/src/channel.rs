//! The southbound OpenFlow channel.
//!
//! Accepts switch TCP connections, runs the version handshake, answers
//! echo keepalives, and turns PACKET_IN messages into flow-manager events.
//! Outbound messages for a switch are queued onto its connection's writer
//! task, so installs issued from any event stream serialize onto the
//! socket in order.

use crate::controller::{FlowManager, SwitchEvent};
use crate::error::{FlowmgrError, FlowmgrResult};
use crate::southbound::Southbound;
use async_trait::async_trait;
use ofctl_codec::{
    echo_reply, features_request, flow_mod, hello, packet_out, FeaturesReply, Header, MsgType,
    PacketInMsg,
};
use ofctl_types::{BufferId, DatapathId, FlowAction, FlowRule, PortNo};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

/// Maps connected datapaths to their connection's outbound queue and
/// hands out transaction ids.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    senders: RwLock<HashMap<DatapathId, mpsc::UnboundedSender<Vec<u8>>>>,
    next_xid: AtomicU32,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ConnectionRegistry::default()
    }

    /// Returns a fresh transaction id.
    fn next_xid(&self) -> u32 {
        self.next_xid.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    fn register(&self, dpid: DatapathId, sender: mpsc::UnboundedSender<Vec<u8>>) {
        self.senders.write().insert(dpid, sender);
    }

    fn deregister(&self, dpid: DatapathId) {
        self.senders.write().remove(&dpid);
    }

    /// Queues an encoded message for the switch's writer.
    fn send(&self, dpid: DatapathId, message: Vec<u8>) -> FlowmgrResult<()> {
        let senders = self.senders.read();
        let sender = senders
            .get(&dpid)
            .ok_or(FlowmgrError::SwitchNotConnected { dpid })?;
        sender
            .send(message)
            .map_err(|_| FlowmgrError::transport(dpid, "connection writer closed"))
    }
}

/// [`Southbound`] implementation that encodes messages and queues them on
/// the target switch's connection.
pub struct OpenFlowSink {
    registry: Arc<ConnectionRegistry>,
}

impl OpenFlowSink {
    /// Creates a sink over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        OpenFlowSink { registry }
    }
}

#[async_trait]
impl Southbound for OpenFlowSink {
    async fn install_rule(
        &self,
        dpid: DatapathId,
        rule: &FlowRule,
        buffer: Option<BufferId>,
    ) -> FlowmgrResult<()> {
        let message = flow_mod(self.registry.next_xid(), rule, buffer);
        self.registry.send(dpid, message)
    }

    async fn send_packet(
        &self,
        dpid: DatapathId,
        in_port: PortNo,
        buffer: Option<BufferId>,
        actions: &[FlowAction],
        frame: &[u8],
    ) -> FlowmgrResult<()> {
        let message = packet_out(self.registry.next_xid(), in_port, buffer, actions, frame);
        self.registry.send(dpid, message)
    }
}

/// The OpenFlow listener: accepts switch connections and drives one
/// connection task per switch.
pub struct OpenFlowChannel {
    manager: Arc<FlowManager>,
    registry: Arc<ConnectionRegistry>,
}

impl OpenFlowChannel {
    /// Creates a channel serving the given flow manager.
    pub fn new(manager: Arc<FlowManager>, registry: Arc<ConnectionRegistry>) -> Self {
        OpenFlowChannel { manager, registry }
    }

    /// Accepts connections until the listener fails or the future is
    /// dropped (the daemon selects this against its shutdown signal).
    pub async fn serve(&self, listener: TcpListener) -> FlowmgrResult<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(peer = %peer, "switch transport connected");
            let manager = self.manager.clone();
            let registry = self.registry.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(manager, registry, stream).await {
                    warn!(peer = %peer, error = %e, "switch connection ended with error");
                }
            });
        }
    }
}

/// Runs one switch connection to completion.
#[instrument(skip_all)]
async fn handle_connection(
    manager: Arc<FlowManager>,
    registry: Arc<ConnectionRegistry>,
    stream: TcpStream,
) -> FlowmgrResult<()> {
    let (mut reader, mut writer) = stream.into_split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<Vec<u8>>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if writer.write_all(&message).await.is_err() {
                break;
            }
        }
    });

    // Open with our hello; the features request follows the peer's hello.
    let _ = sender.send(hello(registry.next_xid()));

    let mut dpid = None;
    let result = connection_loop(&manager, &registry, &mut reader, &sender, &mut dpid).await;

    if let Some(dpid) = dpid {
        registry.deregister(dpid);
        manager.remove_switch(dpid);
        info!(dpid = %dpid, "switch disconnected");
    }
    drop(sender);
    let _ = writer_task.await;
    result
}

async fn connection_loop(
    manager: &FlowManager,
    registry: &ConnectionRegistry,
    reader: &mut OwnedReadHalf,
    sender: &mpsc::UnboundedSender<Vec<u8>>,
    dpid: &mut Option<DatapathId>,
) -> FlowmgrResult<()> {
    let mut header_buf = [0u8; Header::SIZE];
    loop {
        match reader.read_exact(&mut header_buf).await {
            Ok(_) => {}
            // Clean teardown between messages.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let header = Header::parse(&header_buf)?;
        let mut body = vec![0u8; header.body_len()];
        reader.read_exact(&mut body).await?;

        match MsgType::from_u8(header.msg_type) {
            Some(MsgType::Hello) => {
                debug!(version = header.version, "received hello");
                let _ = sender.send(features_request(registry.next_xid()));
            }
            Some(MsgType::EchoRequest) => {
                let _ = sender.send(echo_reply(header.xid, &body));
            }
            Some(MsgType::FeaturesReply) => {
                if dpid.is_some() {
                    debug!("duplicate features reply, ignoring");
                    continue;
                }
                let reply = FeaturesReply::parse(&body)?;
                *dpid = Some(reply.datapath_id);
                registry.register(reply.datapath_id, sender.clone());
                info!(
                    dpid = %reply.datapath_id,
                    n_buffers = reply.n_buffers,
                    n_tables = reply.n_tables,
                    "switch connected"
                );
                let event = SwitchEvent::Connected {
                    dpid: reply.datapath_id,
                };
                if let Err(e) = manager.handle_event(event).await {
                    warn!(dpid = %reply.datapath_id, error = %e, "connect handling failed");
                }
            }
            Some(MsgType::PacketIn) => {
                let Some(dpid) = *dpid else {
                    debug!("packet-in before features reply, ignoring");
                    continue;
                };
                match PacketInMsg::parse(&body) {
                    Ok(message) => {
                        let event = SwitchEvent::PacketIn {
                            dpid,
                            in_port: message.in_port,
                            buffer_id: message.buffer_id,
                            total_len: message.total_len,
                            frame: message.data,
                        };
                        if let Err(e) = manager.handle_event(event).await {
                            warn!(dpid = %dpid, error = %e, "packet-in handling failed");
                        }
                    }
                    Err(e) => warn!(dpid = %dpid, error = %e, "dropping malformed packet-in"),
                }
            }
            Some(MsgType::Error) => {
                warn!(xid = header.xid, "switch reported a protocol error");
            }
            _ => {
                trace!(msg_type = header.msg_type, len = header.length, "ignoring message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_send_to_unknown_switch() {
        let registry = ConnectionRegistry::new();
        let err = registry.send(DatapathId::new(7), vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, FlowmgrError::SwitchNotConnected { .. }));
    }

    #[test]
    fn test_registry_register_and_send() {
        let registry = ConnectionRegistry::new();
        let (sender, mut outbound) = mpsc::unbounded_channel();
        registry.register(DatapathId::new(7), sender);

        registry.send(DatapathId::new(7), vec![1, 2, 3]).unwrap();
        assert_eq!(outbound.try_recv().unwrap(), vec![1, 2, 3]);

        registry.deregister(DatapathId::new(7));
        assert!(registry.send(DatapathId::new(7), vec![4]).is_err());
    }

    #[test]
    fn test_xids_are_distinct() {
        let registry = ConnectionRegistry::new();
        let a = registry.next_xid();
        let b = registry.next_xid();
        assert_ne!(a, b);
    }
}
