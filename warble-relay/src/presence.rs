use dashmap::{DashMap, DashSet};

/// 在线注册表 / Presence registry
///
/// 一个用户可以同时持有多个连接（多端登录），
/// 用户在线当且仅当至少有一个连接存活。
/// One user may hold several connections at once (multiple devices),
/// a user is online iff at least one connection is alive.
#[derive(Default)]
pub struct PresenceRegistry {
    entries: DashMap<String, DashSet<String>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定连接到用户 / Bind a connection to a user
    pub fn register(&self, user_id: &str, connection_id: &str) {
        self.entries
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// 注销一个连接 / Unregister one connection
    ///
    /// 连接可能绑定到任意用户，逐个清理并删掉清空的条目。
    /// The connection may belong to any user, sweep every entry and drop emptied ones.
    pub fn unregister(&self, connection_id: &str) {
        let mut emptied = Vec::new();
        for entry in self.entries.iter() {
            entry.value().remove(connection_id);
            if entry.value().is_empty() {
                emptied.push(entry.key().clone());
            }
        }
        for user_id in emptied {
            self.entries
                .remove_if(&user_id, |_, connections| connections.is_empty());
        }
    }

    /// 用户当前的连接快照 / Snapshot of the user's current connections
    pub fn lookup(&self, user_id: &str) -> Vec<String> {
        match self.entries.get(user_id) {
            Some(connections) => connections.iter().map(|handle| handle.key().clone()).collect(),
            None => Vec::new(),
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries
            .get(user_id)
            .map(|connections| !connections.is_empty())
            .unwrap_or(false)
    }

    /// 在线用户数 / Number of online users
    pub fn online_users(&self) -> usize {
        self.entries.len()
    }
}
