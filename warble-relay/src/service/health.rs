use async_trait::async_trait;
use warble::{HealthCheck, HealthStatus};

use crate::server::RelayServer;

/// 中继健康检查 / Relay health check
#[async_trait]
impl HealthCheck for RelayServer {
    async fn check_health(&self) -> HealthStatus {
        let connections = self.connections.len();
        // 连接数超过阈值视为过载 / Over the threshold counts as overloaded
        let healthy = connections < 10_000;

        HealthStatus {
            component: "relay_server".to_string(),
            healthy,
            message: Some(format!(
                "connections={} online_users={} rooms={}",
                connections,
                self.presence.online_users(),
                self.rooms.len()
            )),
            timestamp: chrono::Utc::now(),
        }
    }
}
