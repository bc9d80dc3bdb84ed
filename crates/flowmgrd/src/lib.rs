//! flowmgrd - OpenFlow flow-management daemon.
//!
//! Reacts to switch-connect and packet-in events from OpenFlow 1.3
//! switches, maintains per-switch MAC learning state, programs learned
//! unicast forwarding rules, and transparently load-balances TCP
//! connections addressed to a virtual service IP across a configured
//! backend pool by installing symmetric rewrite rules.

pub mod balancer;
pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod learning;
pub mod southbound;

pub use balancer::{Backend, LoadBalancer};
pub use channel::{ConnectionRegistry, OpenFlowChannel, OpenFlowSink};
pub use config::{ControllerConfig, ListenerConfig, ServiceConfig};
pub use controller::{FlowManager, FlowStatsSnapshot, SwitchEvent};
pub use error::{FlowmgrError, FlowmgrResult};
pub use learning::MacLearningTable;
pub use southbound::{InstalledRule, RecordingSink, SentPacket, Southbound};
