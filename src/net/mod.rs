// Network layer module
// UDP listeners for agent telemetry and parameter requests

pub mod udp;
pub mod param_udp;

pub use udp::UdpServer;
pub use param_udp::ParamServer;
