//! Live web dashboard: serves an embedded single-page UI and fans the
//! pipeline's metrics/anomaly stream out to every connected WebSocket client.

mod server;

pub use server::DashboardServer;
