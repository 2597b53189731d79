use anyhow::Result;

#[derive(Clone)]
pub struct ServerConfig { pub host: String, pub ws_port: u16, pub http_port: u16, pub timeout_ms: u64 }

/// 历史分页配置 / History paging configuration
#[derive(Clone)]
pub struct HistoryConfig { pub default_limit: usize }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { default_limit: 50 }
    }
}

#[derive(Clone)]
pub struct AuthConfigLite { pub enabled: bool, pub shared_secret: Option<String> }

pub fn load() -> Result<(ServerConfig, HistoryConfig, AuthConfigLite)> {
    let cm = warble::get_global_config_manager()?;
    Ok((
        ServerConfig { host: cm.get_or("server.host", "127.0.0.1".to_string()), ws_port: cm.get_or("server.ws_port", 8000_i64) as u16, http_port: cm.get_or("server.http_port", 8080_i64) as u16, timeout_ms: cm.get_or("server.timeout_ms", 20000_i64) as u64 },
        HistoryConfig { default_limit: cm.get_or("history.default_limit", 50_i64).max(1) as usize },
        AuthConfigLite { enabled: cm.get_or("auth.enabled", false), shared_secret: cm.get::<String>("auth.shared_secret").ok() },
    ))
}
