use crate::RelayServer;
use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use std::sync::Arc;
use warble::response::respond_any;
use warble::HealthCheck;

pub const ROUTE_PATH: &str = "/health/detailed";

// 路由注册入口（GET）
// Route registration entry (GET)
pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(health_detailed_handle)));
}

// 详细健康检查
// Detailed health check
pub async fn health_detailed_handle(server: web::Data<Arc<RelayServer>>) -> impl Responder {
    let status = server.check_health().await;
    let (websocket_port, http_port) = match warble::get_global_config_manager() {
        Ok(cm) => (
            cm.get_or("server.ws_port", 8000_u16),
            cm.get_or("server.http_port", 8080_u16),
        ),
        Err(_) => (8000, 8080),
    };
    let uptime = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let payload = serde_json::json!({
        "status": status,
        "service": "warble-relay",
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "details": {
            "connections": server.connections.len(),
            "online_users": server.presence.online_users(),
            "rooms": server.rooms.len(),
            "websocket_port": websocket_port,
            "http_port": http_port,
            "uptime_seconds": uptime,
            "version": "0.1.0"
        }
    });
    respond_any(StatusCode::OK, payload)
}
