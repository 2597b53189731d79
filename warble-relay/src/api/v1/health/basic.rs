use crate::RelayServer;
use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use std::sync::Arc;
use warble::response::respond_any;
use warble::HealthCheck;

pub const ROUTE_PATH: &str = "/health";

// 路由注册入口（GET）
// Route registration entry (GET)
pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(health_basic_handle)));
}

// 基础健康检查
// Basic health check
pub async fn health_basic_handle(server: web::Data<Arc<RelayServer>>) -> impl Responder {
    let status = server.check_health().await;
    respond_any(StatusCode::OK, status)
}
