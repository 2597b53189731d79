use dashmap::{DashMap, DashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use crate::auth::{AuthVerifier, PermissiveVerifier};
use crate::config::HistoryConfig;
use crate::directory::{GroupDirectory, MemoryGroupDirectory, MemoryUserDirectory, UserDirectory};
use crate::presence::PresenceRegistry;
use crate::storage::memory::MemoryMessageStore;
use crate::storage::MessageStore;

/// 客户端连接信息 / Client connection information
#[derive(Clone)]
pub struct Connection {
    #[allow(dead_code)]
    pub connection_id: String, // 连接唯一ID（当前未读取）/ Unique connection ID (currently not read)
    pub uid: Option<String>,   // 注册后的用户ID / User ID once registered
    pub addr: SocketAddr,      // 客户端地址 / Client address
    pub sender: mpsc::UnboundedSender<Message>, // 消息发送器 / Message sender
    pub last_heartbeat: Arc<std::sync::Mutex<Instant>>, // 最后心跳时间 / Last heartbeat time
}

/// 中继全局状态 / Relay global state
#[derive(Clone)]
pub struct RelayServer {
    pub connections: Arc<DashMap<String, Connection>>, // 客户端连接 / Client connections
    pub presence: Arc<PresenceRegistry>,               // 在线注册表 / Presence registry
    pub rooms: Arc<DashMap<String, DashSet<String>>>,  // 房间到连接集合 / Room -> connection ids
    pub store: Arc<dyn MessageStore>,                  // 消息存储 / Message store
    pub groups: Arc<dyn GroupDirectory>,               // 群组目录 / Group directory
    pub users: Arc<dyn UserDirectory>,                 // 用户目录 / User directory
    pub auth: Arc<dyn AuthVerifier>,                   // 注册校验 / Registration verifier
    pub history: HistoryConfig,                        // 历史分页配置 / History paging config
}

impl RelayServer {
    /// 构建默认中继实例 / Build default relay instance
    pub fn new() -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            presence: Arc::new(PresenceRegistry::new()),
            rooms: Arc::new(DashMap::new()),
            store: Arc::new(MemoryMessageStore::new()),
            groups: Arc::new(MemoryGroupDirectory::new()),
            users: Arc::new(MemoryUserDirectory::new()),
            auth: Arc::new(PermissiveVerifier),
            history: HistoryConfig::default(),
        }
    }

    /// 配置消息存储 / Configure message store
    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = store;
        self
    }

    /// 配置群组目录 / Configure group directory
    pub fn with_groups(mut self, groups: Arc<dyn GroupDirectory>) -> Self {
        self.groups = groups;
        self
    }

    /// 配置用户目录 / Configure user directory
    pub fn with_users(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = users;
        self
    }

    /// 配置注册校验器 / Configure registration verifier
    pub fn with_auth(mut self, auth: Arc<dyn AuthVerifier>) -> Self {
        self.auth = auth;
        self
    }

    /// 配置历史分页 / Configure history paging
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// 更新连接心跳 / Update connection heartbeat
    pub async fn update_heartbeat(&self, connection_id: &str) {
        if let Some(connection) = self.connections.get(connection_id) {
            if let Ok(mut last_heartbeat) = connection.last_heartbeat.lock() {
                *last_heartbeat = Instant::now();
                debug!("💓 Updated heartbeat for connection {}", connection_id);
            }
        }
    }

    /// 清理超时连接 / Clean up timeout connections
    ///
    /// 超时的连接同时退出在线表和所有房间，立刻停止接收路由消息。
    /// A timed-out connection also leaves presence and all rooms so
    /// routing stops immediately.
    pub async fn cleanup_timeout_connections(&self, timeout_ms: u64) {
        let mut expired = Vec::new();

        for entry in self.connections.iter() {
            let connection_id = entry.key().clone();
            let connection = entry.value();

            if let Ok(last_heartbeat) = connection.last_heartbeat.lock() {
                if last_heartbeat.elapsed().as_millis() > timeout_ms as u128 {
                    expired.push(connection_id);
                }
            }
        }

        for connection_id in expired {
            // 主动发送关闭消息 / Send close message proactively
            if let Err(e) = self.send_close_message(&connection_id).await {
                error!("Failed to send close message to {}: {}", connection_id, e);
            }

            self.connections.remove(&connection_id);
            self.presence.unregister(&connection_id);
            self.leave_all_rooms(&connection_id);
            info!("🧹 Cleaned up timeout connection: {}", connection_id);
        }
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}
