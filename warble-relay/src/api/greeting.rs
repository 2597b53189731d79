use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use warble::response::respond_any;

pub const ROUTE_PATH: &str = "/";

// 路由注册入口（GET）
// Route registration entry (GET)
pub fn register(cfg: &mut actix_web::web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(greeting_handle)));
}

// 根路径问候，便于确认服务存活
// Root path greeting, a quick liveness probe
pub async fn greeting_handle() -> impl Responder {
    respond_any(
        StatusCode::OK,
        serde_json::json!({ "message": "Hello from the warble chat relay" }),
    )
}
