use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::domain::message::{ChatMessage, EventEnvelope, TypingPayload};
use crate::server::RelayServer;

/// 事件编好帧再路由 / Encode the event once, then route the frame
fn event_frame(event: &str, data: Value) -> Option<Message> {
    let envelope = EventEnvelope::new(event, data);
    match envelope.to_text() {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event, e);
            None
        }
    }
}

/// 投递路由 / Delivery routing
///
/// 路由从不回推事件来源连接，给来源的回执由会话处理统一补发，
/// 这样多端登录的发送方每端最多收到一份。
/// Routing never pushes back to the origin connection, the session
/// handler sends the origin its single copy, so a multi-device sender
/// sees at most one copy per device.
impl RelayServer {
    /// 路由新消息 / Route a new message
    pub async fn route_new_message(&self, message: &ChatMessage, origin: &str) -> usize {
        let frame = match event_frame("message", json!(message)) {
            Some(frame) => frame,
            None => return 0,
        };

        // 群聊地址优先于私聊 / Group addressing wins over direct
        if let Some(group_id) = message.group_id.as_deref() {
            let delivered = self.broadcast_to_room(group_id, &frame, Some(origin)).await;
            info!(
                "💬 Message {} broadcast to {} connections in room {}",
                message.id, delivered, group_id
            );
            return delivered;
        }
        if let Some(receiver_id) = message.receiver_id.as_deref() {
            let delivered = self.push_to_user(receiver_id, &frame, Some(origin)).await;
            if delivered == 0 {
                debug!("No active connection for user {}", receiver_id);
            }
            return delivered;
        }
        0
    }

    /// 路由打字提示 / Route a typing hint
    ///
    /// 不落盘，只带身份和状态转发。
    /// Never persisted, forwarded with identity and state only.
    pub async fn route_typing(&self, payload: &TypingPayload, origin: &str) -> usize {
        let data = json!({"userId": payload.user_id, "isTyping": payload.is_typing});
        let frame = match event_frame("typing", data) {
            Some(frame) => frame,
            None => return 0,
        };

        match payload
            .group_id
            .as_deref()
            .filter(|group| !group.trim().is_empty())
        {
            Some(group_id) => self.broadcast_to_room(group_id, &frame, Some(origin)).await,
            None => self.push_to_user(&payload.user_id, &frame, Some(origin)).await,
        }
    }

    /// 路由已读回执 / Route a read receipt
    ///
    /// 读者自己不收回执，群聊按成员目录寻址。
    /// The reader gets no receipt, group receipts address the member
    /// directory.
    pub async fn route_read_receipt(
        &self,
        message: &ChatMessage,
        acting_user: &str,
        origin: &str,
    ) -> usize {
        let frame = match event_frame("messageUpdated", json!(message)) {
            Some(frame) => frame,
            None => return 0,
        };

        if let Some(group_id) = message.group_id.as_deref() {
            let members = match self.groups.members(group_id).await {
                Ok(members) => members,
                Err(e) => {
                    warn!("Failed to resolve members of group {}: {}", group_id, e);
                    return 0;
                }
            };
            let mut delivered = 0;
            for member in members {
                if member == acting_user {
                    continue;
                }
                delivered += self.push_to_user(&member, &frame, Some(origin)).await;
            }
            return delivered;
        }

        if message.sender_id != acting_user {
            return self.push_to_user(&message.sender_id, &frame, Some(origin)).await;
        }
        0
    }

    /// 路由消息编辑 / Route a message edit
    pub async fn route_message_updated(&self, message: &ChatMessage, origin: &str) -> usize {
        let frame = match event_frame("messageUpdated", json!(message)) {
            Some(frame) => frame,
            None => return 0,
        };

        if let Some(group_id) = message.group_id.as_deref() {
            return self.broadcast_to_room(group_id, &frame, Some(origin)).await;
        }
        if let Some(receiver_id) = message.receiver_id.as_deref() {
            return self.push_to_user(receiver_id, &frame, Some(origin)).await;
        }
        0
    }

    /// 路由消息删除 / Route a message deletion
    ///
    /// 删除事件只带消息ID / The deletion event carries only the message id
    pub async fn route_message_deleted(&self, message: &ChatMessage, origin: &str) -> usize {
        let frame = match event_frame("messageDeleted", Value::String(message.id.clone())) {
            Some(frame) => frame,
            None => return 0,
        };

        if let Some(group_id) = message.group_id.as_deref() {
            return self.broadcast_to_room(group_id, &frame, Some(origin)).await;
        }
        if let Some(receiver_id) = message.receiver_id.as_deref() {
            return self.push_to_user(receiver_id, &frame, Some(origin)).await;
        }
        0
    }
}
