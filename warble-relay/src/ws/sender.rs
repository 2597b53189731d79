use anyhow::Result;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::domain::message::EventEnvelope;
use crate::server::RelayServer;

/// 面向连接的发送原语 / Connection-facing send primitives
impl RelayServer {
    /// 向指定连接发送消息 / Send message to a specific connection
    pub async fn send_to_connection(&self, connection_id: &str, message: Message) -> Result<()> {
        if let Some(connection) = self.connections.get(connection_id) {
            connection
                .sender
                .send(message)
                .map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;
            debug!("📤 Sent message to connection {}", connection_id);
            Ok(())
        } else {
            warn!("⚠️  Connection {} not found for message delivery", connection_id);
            Err(anyhow::anyhow!("Connection {} not found", connection_id))
        }
    }

    /// 发送关闭消息 / Send close message
    pub async fn send_close_message(&self, connection_id: &str) -> Result<()> {
        if let Some(connection) = self.connections.get(connection_id) {
            connection
                .sender
                .send(Message::Close(Some(
                    tokio_tungstenite::tungstenite::protocol::CloseFrame {
                        code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Normal,
                        reason: std::borrow::Cow::Borrowed("Connection timeout"),
                    },
                )))
                .map_err(|e| anyhow::anyhow!("Failed to send close message: {}", e))?;
            debug!("🔒 Sent close message to connection {}", connection_id);
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Connection {} not found for close message",
                connection_id
            ))
        }
    }

    /// 推送到用户的全部连接 / Push to every connection of a user
    ///
    /// exclude 指定不回推的连接（通常是事件来源），返回送达的连接数。
    /// exclude names a connection that must not receive the push
    /// (usually the event origin), returns the number delivered.
    pub async fn push_to_user(
        &self,
        user_id: &str,
        message: &Message,
        exclude: Option<&str>,
    ) -> usize {
        let mut delivered = 0;
        for connection_id in self.presence.lookup(user_id) {
            if exclude == Some(connection_id.as_str()) {
                continue;
            }
            if self
                .send_to_connection(&connection_id, message.clone())
                .await
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// 广播到房间 / Broadcast to a room
    pub async fn broadcast_to_room(
        &self,
        group_id: &str,
        message: &Message,
        exclude: Option<&str>,
    ) -> usize {
        // 先取成员快照，避免持锁跨await / Snapshot members first, no lock held across await
        let members: Vec<String> = match self.rooms.get(group_id) {
            Some(room) => room.iter().map(|member| member.key().clone()).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for connection_id in members {
            if exclude == Some(connection_id.as_str()) {
                continue;
            }
            if self
                .send_to_connection(&connection_id, message.clone())
                .await
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// 连接加入房间 / Connection joins a room
    pub fn join_room(&self, group_id: &str, connection_id: &str) {
        self.rooms
            .entry(group_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// 连接退出所有房间 / Connection leaves every room
    pub fn leave_all_rooms(&self, connection_id: &str) {
        let mut emptied = Vec::new();
        for room in self.rooms.iter() {
            room.value().remove(connection_id);
            if room.value().is_empty() {
                emptied.push(room.key().clone());
            }
        }
        for group_id in emptied {
            self.rooms.remove_if(&group_id, |_, members| members.is_empty());
        }
    }

    /// 向连接发出事件 / Emit an event to a connection
    ///
    /// 序列化失败记日志，发送失败由调用方决定是否关心。
    /// Serialization failures are logged, delivery failures are the
    /// caller's concern only when they ask.
    pub async fn emit_event(&self, connection_id: &str, event: &str, data: Value) {
        let envelope = EventEnvelope::new(event, data);
        match envelope.to_text() {
            Ok(text) => {
                let _ = self.send_to_connection(connection_id, Message::Text(text)).await;
            }
            Err(e) => {
                warn!("Failed to serialize {} event for {}: {}", event, connection_id, e);
            }
        }
    }

    /// 向连接发出错误事件 / Emit an error event to a connection
    ///
    /// 错误事件的data是纯字符串，与客户端约定一致。
    /// Error event data is a plain string per client contract.
    pub async fn emit_error(&self, connection_id: &str, description: &str) {
        self.emit_event(connection_id, "error", Value::String(description.to_string()))
            .await;
    }
}
