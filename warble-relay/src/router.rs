use actix_web::web;

/// 路由配置包装 / Route configuration wrapper
pub fn configure(cfg: &mut web::ServiceConfig) {
    crate::api::greeting::register(cfg, "/");
    crate::api::v1::health::basic::register(cfg, "/v1/health");
    crate::api::v1::health::detailed::register(cfg, "/v1/health/detailed");
}
