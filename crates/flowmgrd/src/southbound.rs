//! The southbound installation boundary.
//!
//! The flow manager emits rule installations and one-shot packet forwards
//! through the [`Southbound`] trait; the OpenFlow TCP channel provides the
//! production implementation and tests substitute a recording sink.

use crate::error::FlowmgrResult;
use async_trait::async_trait;
use ofctl_types::{BufferId, DatapathId, FlowAction, FlowRule, PortNo};
use parking_lot::Mutex;

/// Sink for rule installations and packet forwards toward switches.
///
/// Sends are fire-and-forget: implementations report transport failures to
/// the caller but never wait for switch acknowledgment, and the caller
/// neither retries nor rolls back previously sent rules.
#[async_trait]
pub trait Southbound: Send + Sync {
    /// Installs `rule` on the given switch.
    ///
    /// When `buffer` references a packet queued at the switch, the
    /// installation also replays that packet through the new rule, so no
    /// separate forward is needed for it.
    async fn install_rule(
        &self,
        dpid: DatapathId,
        rule: &FlowRule,
        buffer: Option<BufferId>,
    ) -> FlowmgrResult<()>;

    /// Forwards a single packet through `actions` without installing state.
    async fn send_packet(
        &self,
        dpid: DatapathId,
        in_port: PortNo,
        buffer: Option<BufferId>,
        actions: &[FlowAction],
        frame: &[u8],
    ) -> FlowmgrResult<()>;
}

/// One recorded rule installation.
#[derive(Debug, Clone)]
pub struct InstalledRule {
    /// Target switch.
    pub dpid: DatapathId,
    /// The installed rule.
    pub rule: FlowRule,
    /// Buffer reference passed with the installation, if any.
    pub buffer: Option<BufferId>,
}

/// One recorded one-shot packet forward.
#[derive(Debug, Clone)]
pub struct SentPacket {
    /// Target switch.
    pub dpid: DatapathId,
    /// Ingress port of the original packet.
    pub in_port: PortNo,
    /// Buffer reference, if the switch held the packet.
    pub buffer: Option<BufferId>,
    /// Actions the packet is pushed through.
    pub actions: Vec<FlowAction>,
    /// The frame bytes.
    pub frame: Vec<u8>,
}

/// A [`Southbound`] implementation that records everything it is asked to
/// send, in order. Used by tests to assert on the exact rules the flow
/// manager emits.
#[derive(Debug, Default)]
pub struct RecordingSink {
    rules: Mutex<Vec<InstalledRule>>,
    packets: Mutex<Vec<SentPacket>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        RecordingSink::default()
    }

    /// All rule installations recorded so far, in order.
    pub fn rules(&self) -> Vec<InstalledRule> {
        self.rules.lock().clone()
    }

    /// All packet forwards recorded so far, in order.
    pub fn packets(&self) -> Vec<SentPacket> {
        self.packets.lock().clone()
    }
}

#[async_trait]
impl Southbound for RecordingSink {
    async fn install_rule(
        &self,
        dpid: DatapathId,
        rule: &FlowRule,
        buffer: Option<BufferId>,
    ) -> FlowmgrResult<()> {
        self.rules.lock().push(InstalledRule {
            dpid,
            rule: rule.clone(),
            buffer,
        });
        Ok(())
    }

    async fn send_packet(
        &self,
        dpid: DatapathId,
        in_port: PortNo,
        buffer: Option<BufferId>,
        actions: &[FlowAction],
        frame: &[u8],
    ) -> FlowmgrResult<()> {
        self.packets.lock().push(SentPacket {
            dpid,
            in_port,
            buffer,
            actions: actions.to_vec(),
            frame: frame.to_vec(),
        });
        Ok(())
    }
}
