//! The flow manager: the event/decision engine of the controller.
//!
//! Dispatches switch-connect and packet-in events over the shared state
//! (per-switch learning tables, the round-robin backend cursor) and emits
//! flow-rule installations and one-shot packet forwards through the
//! southbound sink.

use crate::balancer::LoadBalancer;
use crate::config::ServiceConfig;
use crate::error::FlowmgrResult;
use crate::learning::MacLearningTable;
use crate::southbound::Southbound;
use ofctl_codec::{classify, Classification};
use ofctl_types::{
    priority, BufferId, DatapathId, EtherType, FlowAction, FlowMatch, FlowRule, IpProto,
    MacAddress, PortNo,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// An event delivered by the southbound channel.
#[derive(Debug, Clone)]
pub enum SwitchEvent {
    /// A switch completed its handshake.
    Connected {
        /// The switch's datapath id.
        dpid: DatapathId,
    },
    /// A packet reached the controller via the table-miss rule.
    PacketIn {
        /// The switch that sent the packet up.
        dpid: DatapathId,
        /// Port the packet arrived on.
        in_port: PortNo,
        /// Reference to the packet buffered at the switch, if it was not
        /// sent in full.
        buffer_id: Option<BufferId>,
        /// Frame length as seen by the switch.
        total_len: u16,
        /// Captured frame bytes (possibly fewer than `total_len`).
        frame: Vec<u8>,
    },
}

/// Per-switch state, created on connect (or lazily on a switch's first
/// packet) and dropped on disconnect.
#[derive(Debug, Default)]
struct SwitchState {
    mac_table: MacLearningTable,
}

/// Event counters, updated from any event stream.
#[derive(Debug, Default)]
struct FlowStats {
    packets_in: AtomicU64,
    discovery_ignored: AtomicU64,
    parse_errors: AtomicU64,
    rules_installed: AtomicU64,
    packet_outs: AtomicU64,
    service_flows: AtomicU64,
}

/// A point-in-time copy of the event counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStatsSnapshot {
    /// Packet-in events received.
    pub packets_in: u64,
    /// Discovery (LLDP) frames silently ignored.
    pub discovery_ignored: u64,
    /// Events dropped because the frame could not be parsed.
    pub parse_errors: u64,
    /// Flow rules installed (all priorities).
    pub rules_installed: u64,
    /// One-shot packet forwards emitted.
    pub packet_outs: u64,
    /// Virtual-service connections assigned to a backend.
    pub service_flows: u64,
}

/// The controller's decision engine.
///
/// One instance serves every connected switch. Events from different
/// switches may be handled concurrently; each switch's own events arrive
/// in connection order from its channel task.
pub struct FlowManager {
    sink: Arc<dyn Southbound>,
    service: ServiceConfig,
    balancer: LoadBalancer,
    switches: RwLock<HashMap<DatapathId, SwitchState>>,
    stats: FlowStats,
}

impl FlowManager {
    /// Creates a flow manager over a validated service configuration.
    pub fn new(sink: Arc<dyn Southbound>, service: ServiceConfig) -> Self {
        let balancer = LoadBalancer::new(service.backends.clone());
        FlowManager {
            sink,
            service,
            balancer,
            switches: RwLock::new(HashMap::new()),
            stats: FlowStats::default(),
        }
    }

    /// Dispatches one event.
    ///
    /// Parse failures are consumed here (logged, event dropped); transport
    /// failures surface to the caller.
    pub async fn handle_event(&self, event: SwitchEvent) -> FlowmgrResult<()> {
        match event {
            SwitchEvent::Connected { dpid } => self.on_connected(dpid).await,
            SwitchEvent::PacketIn {
                dpid,
                in_port,
                buffer_id,
                total_len,
                frame,
            } => {
                self.on_packet_in(dpid, in_port, buffer_id, total_len, &frame)
                    .await
            }
        }
    }

    /// Drops all state for a switch whose connection went away.
    pub fn remove_switch(&self, dpid: DatapathId) {
        if self.switches.write().remove(&dpid).is_some() {
            info!(dpid = %dpid, "dropped switch state");
        }
    }

    /// Returns the port a host was learned on, if any.
    pub fn learned_port(&self, dpid: DatapathId, mac: &MacAddress) -> Option<PortNo> {
        self.switches.read().get(&dpid)?.mac_table.lookup(mac)
    }

    /// Returns a snapshot of the event counters.
    pub fn stats(&self) -> FlowStatsSnapshot {
        FlowStatsSnapshot {
            packets_in: self.stats.packets_in.load(Ordering::Relaxed),
            discovery_ignored: self.stats.discovery_ignored.load(Ordering::Relaxed),
            parse_errors: self.stats.parse_errors.load(Ordering::Relaxed),
            rules_installed: self.stats.rules_installed.load(Ordering::Relaxed),
            packet_outs: self.stats.packet_outs.load(Ordering::Relaxed),
            service_flows: self.stats.service_flows.load(Ordering::Relaxed),
        }
    }

    #[instrument(skip(self))]
    async fn on_connected(&self, dpid: DatapathId) -> FlowmgrResult<()> {
        {
            let mut switches = self.switches.write();
            if switches.insert(dpid, SwitchState::default()).is_some() {
                warn!(dpid = %dpid, "switch reconnected, previous state dropped");
            }
        }

        // Route everything unmatched to the controller, untruncated.
        self.install(dpid, &FlowRule::table_miss(), None).await?;
        info!(dpid = %dpid, "installed table-miss rule");
        Ok(())
    }

    #[instrument(skip(self, frame), fields(frame_len = frame.len()))]
    async fn on_packet_in(
        &self,
        dpid: DatapathId,
        in_port: PortNo,
        buffer_id: Option<BufferId>,
        total_len: u16,
        frame: &[u8],
    ) -> FlowmgrResult<()> {
        self.stats.packets_in.fetch_add(1, Ordering::Relaxed);

        if frame.len() < total_len as usize {
            debug!(
                dpid = %dpid,
                captured = frame.len(),
                total_len,
                "packet truncated, proceeding with captured bytes"
            );
        }

        let packet = match classify(frame) {
            Ok(Classification::Frame(packet)) => packet,
            Ok(Classification::Discovery) => {
                self.stats.discovery_ignored.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(e) => {
                self.stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                warn!(dpid = %dpid, error = %e, "dropping unparseable frame");
                return Ok(());
            }
        };

        // Learn the source and resolve the destination in one critical
        // section; the lock is released before any send.
        let out_port = {
            let mut switches = self.switches.write();
            let state = switches.entry(dpid).or_default();
            state.mac_table.record(packet.eth_src, in_port);
            state
                .mac_table
                .lookup(&packet.eth_dst)
                .unwrap_or(PortNo::FLOOD)
        };

        debug!(
            dpid = %dpid,
            src = %packet.eth_src,
            dst = %packet.eth_dst,
            in_port = %in_port,
            out_port = %out_port,
            "packet in"
        );

        if !out_port.is_flood() {
            let rule = FlowRule::new(
                priority::LEARNED,
                FlowMatch::any()
                    .with_in_port(in_port)
                    .with_eth_src(packet.eth_src)
                    .with_eth_dst(packet.eth_dst),
                vec![FlowAction::Output(out_port)],
            );
            if buffer_id.is_some() {
                // The install replays the buffered packet through the new
                // rule; handling for this event ends here.
                self.install(dpid, &rule, buffer_id).await?;
                return Ok(());
            }
            self.install(dpid, &rule, None).await?;
        }

        self.sink
            .send_packet(
                dpid,
                in_port,
                buffer_id,
                &[FlowAction::Output(out_port)],
                frame,
            )
            .await?;
        self.stats.packet_outs.fetch_add(1, Ordering::Relaxed);

        // Virtual-service check. Runs only when the packet was not consumed
        // by a buffered rule install above, so a flow whose destination was
        // already learned and buffered is plain-forwarded; its rewrite pair
        // is installed when a later packet arrives without a usable rule.
        if let Some((ipv4, tcp_dst)) = packet.tcp_segment() {
            if ipv4.dst == self.service.virtual_ip && tcp_dst == self.service.service_port {
                self.install_service_flows(dpid, in_port, packet.eth_src)
                    .await?;
            }
        }

        Ok(())
    }

    /// Assigns a new virtual-service connection to a backend and installs
    /// the symmetric rewrite pair on the receiving switch.
    async fn install_service_flows(
        &self,
        dpid: DatapathId,
        client_port: PortNo,
        client_mac: MacAddress,
    ) -> FlowmgrResult<()> {
        let backend = self.balancer.select();

        let forward = FlowRule::new(
            priority::LOAD_BALANCER,
            FlowMatch::any()
                .with_in_port(client_port)
                .with_eth_type(EtherType::IPV4)
                .with_ip_proto(IpProto::TCP)
                .with_ipv4_dst(self.service.virtual_ip)
                .with_tcp_dst(self.service.service_port),
            vec![
                FlowAction::SetIpv4Dst(backend.ip),
                FlowAction::Output(backend.port),
            ],
        );

        // The reverse direction matches the client by MAC, not by a full
        // 5-tuple: two clients sharing a MAC behind the same port collide.
        let reverse = FlowRule::new(
            priority::LOAD_BALANCER,
            FlowMatch::any()
                .with_in_port(backend.port)
                .with_eth_type(EtherType::IPV4)
                .with_ip_proto(IpProto::TCP)
                .with_ipv4_src(backend.ip)
                .with_eth_dst(client_mac),
            vec![
                FlowAction::SetIpv4Src(self.service.virtual_ip),
                FlowAction::Output(client_port),
            ],
        );

        self.install(dpid, &forward, None).await?;
        self.install(dpid, &reverse, None).await?;
        self.stats.service_flows.fetch_add(1, Ordering::Relaxed);

        info!(
            dpid = %dpid,
            backend = %backend.ip,
            backend_port = %backend.port,
            client_port = %client_port,
            "installed virtual-service rewrite pair"
        );
        Ok(())
    }

    async fn install(
        &self,
        dpid: DatapathId,
        rule: &FlowRule,
        buffer: Option<BufferId>,
    ) -> FlowmgrResult<()> {
        self.sink.install_rule(dpid, rule, buffer).await?;
        self.stats.rules_installed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::southbound::RecordingSink;

    fn manager() -> (Arc<FlowManager>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let manager = Arc::new(FlowManager::new(sink.clone(), ServiceConfig::default()));
        (manager, sink)
    }

    fn arp_frame(src: [u8; 6], dst: [u8; 6]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&dst);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&0x0806u16.to_be_bytes());
        frame.extend_from_slice(&[0; 28]);
        frame
    }

    fn packet_in(dpid: u64, in_port: u32, frame: Vec<u8>) -> SwitchEvent {
        SwitchEvent::PacketIn {
            dpid: DatapathId::new(dpid),
            in_port: PortNo::new(in_port),
            buffer_id: None,
            total_len: frame.len() as u16,
            frame,
        }
    }

    #[tokio::test]
    async fn test_connect_installs_one_table_miss() {
        let (manager, sink) = manager();
        manager
            .handle_event(SwitchEvent::Connected {
                dpid: DatapathId::new(1),
            })
            .await
            .unwrap();

        let rules = sink.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule.priority, priority::TABLE_MISS);
        assert!(rules[0].rule.matches.is_any());
        assert_eq!(
            rules[0].rule.actions,
            vec![FlowAction::Output(PortNo::CONTROLLER)]
        );
    }

    #[tokio::test]
    async fn test_unknown_destination_floods_without_rule() {
        let (manager, sink) = manager();
        let src = [0, 0, 0, 0, 0, 0x0a];
        manager
            .handle_event(packet_in(1, 3, arp_frame(src, [0, 0, 0, 0, 0, 0x0b])))
            .await
            .unwrap();

        assert!(sink.rules().is_empty());
        let packets = sink.packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].actions, vec![FlowAction::Output(PortNo::FLOOD)]);
        assert_eq!(
            manager.learned_port(DatapathId::new(1), &MacAddress::new(src)),
            Some(PortNo::new(3))
        );
    }

    #[tokio::test]
    async fn test_learning_is_scoped_per_switch() {
        let (manager, _sink) = manager();
        let src = [0, 0, 0, 0, 0, 0x0a];
        manager
            .handle_event(packet_in(1, 3, arp_frame(src, [0xff; 6])))
            .await
            .unwrap();

        let mac = MacAddress::new(src);
        assert_eq!(
            manager.learned_port(DatapathId::new(1), &mac),
            Some(PortNo::new(3))
        );
        assert_eq!(manager.learned_port(DatapathId::new(2), &mac), None);
    }

    #[tokio::test]
    async fn test_remove_switch_drops_learning_state() {
        let (manager, _sink) = manager();
        let src = [0, 0, 0, 0, 0, 0x0a];
        manager
            .handle_event(packet_in(1, 3, arp_frame(src, [0xff; 6])))
            .await
            .unwrap();

        manager.remove_switch(DatapathId::new(1));
        assert_eq!(
            manager.learned_port(DatapathId::new(1), &MacAddress::new(src)),
            None
        );
    }

    #[tokio::test]
    async fn test_discovery_frame_is_ignored() {
        let (manager, sink) = manager();
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x01, 0x80, 0xc2, 0, 0, 0x0e]);
        frame.extend_from_slice(&[0, 0, 0, 0, 0, 0x0a]);
        frame.extend_from_slice(&0x88ccu16.to_be_bytes());
        frame.extend_from_slice(&[0; 8]);

        manager.handle_event(packet_in(1, 3, frame)).await.unwrap();

        assert!(sink.rules().is_empty());
        assert!(sink.packets().is_empty());
        assert_eq!(manager.stats().discovery_ignored, 1);
        // The source of a discovery frame is not learned.
        assert_eq!(
            manager.learned_port(DatapathId::new(1), &MacAddress::new([0, 0, 0, 0, 0, 0x0a])),
            None
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped_not_fatal() {
        let (manager, sink) = manager();
        manager
            .handle_event(packet_in(1, 3, vec![0xde, 0xad]))
            .await
            .unwrap();

        assert!(sink.rules().is_empty());
        assert!(sink.packets().is_empty());
        assert_eq!(manager.stats().parse_errors, 1);
    }
}
