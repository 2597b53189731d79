use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 事件信封 / Event envelope
///
/// 所有WebSocket文本帧都是这个形状：`{"type": "...", "data": ...}`。
/// Every WebSocket text frame has this shape: `{"type": "...", "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// 事件类型 / Event type
    #[serde(rename = "type")]
    pub event: String,
    /// 事件数据 / Event data
    #[serde(default)]
    pub data: Value,
}

impl EventEnvelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// 序列化为文本帧内容 / Serialize to text frame content
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 聊天消息 / Chat message
///
/// 持久化与下发共用同一形状，字段名与客户端约定保持camelCase。
/// Stored and pushed in the same shape, camelCase field names per client contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub sender_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub is_read: bool,
    pub is_update: bool,
    pub read_by: Vec<ReadEntry>,
    /// 创建时间（毫秒时间戳）/ Creation time (millisecond timestamp)
    pub created_at: i64,
    /// 更新时间（毫秒时间戳）/ Update time (millisecond timestamp)
    pub updated_at: i64,
}

/// 已读回执条目 / Read receipt entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEntry {
    pub user_id: String,
    pub read_at: i64,
}

/// register 事件载荷 / register event payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub user_id: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// joinRoom 事件载荷 / joinRoom event payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub group_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// typing 事件载荷 / typing event payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: String,
    pub is_typing: bool,
    #[serde(default)]
    pub group_id: Option<String>,
}

/// fetchMessages 事件载荷 / fetchMessages event payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMessagesPayload {
    pub group_id: Option<String>,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// newMessage 事件载荷 / newMessage event payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub sender_id: Option<String>,
    pub content: Option<String>,
    pub receiver_id: Option<String>,
    pub group_id: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
}

/// messageRead 事件载荷 / messageRead event payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub message_id: Option<String>,
    pub user_id: Option<String>,
}

/// editMessage 事件载荷 / editMessage event payload
///
/// newContent 保留原始JSON值，空字符串是合法的编辑结果。
/// newContent keeps the raw JSON value, an empty string is a valid edit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessagePayload {
    pub message_id: Option<String>,
    pub new_content: Option<Value>,
    pub user_id: Option<String>,
}

/// deleteMessage 事件载荷 / deleteMessage event payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    pub message_id: Option<String>,
    pub user_id: Option<String>,
}

/// getUserDataWithMessages 事件载荷 / getUserDataWithMessages event payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataPayload {
    pub user_id: Option<String>,
}

/// 用户概要 / User summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// 用户及会话摘要 / User with conversation summary
///
/// lastMessage 为最近一条对方发来的消息，没有时是字符串"empty"。
/// lastMessage is the latest message from that user, the string "empty" when none.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithMessages {
    #[serde(flatten)]
    pub user: UserSummary,
    pub last_message: Value,
    pub unread_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_round_trip() {
        let envelope = EventEnvelope::new("register", json!({"userId": "u1"}));
        let text = envelope.to_text().unwrap();
        assert!(text.contains("\"type\":\"register\""));

        let parsed: EventEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.event, "register");
        assert_eq!(parsed.data["userId"], "u1");
    }

    #[test]
    fn test_envelope_missing_data_defaults_to_null() {
        let parsed: EventEnvelope = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(parsed.event, "ping");
        assert!(parsed.data.is_null());
    }

    #[test]
    fn test_chat_message_camel_case_wire_shape() {
        let message = ChatMessage {
            id: "m1".to_string(),
            content: Some("hello".to_string()),
            sender_id: "alice".to_string(),
            receiver_id: Some("bob".to_string()),
            group_id: None,
            file_url: None,
            file_type: None,
            is_read: false,
            is_update: false,
            read_by: vec![ReadEntry {
                user_id: "bob".to_string(),
                read_at: 1_700_000_000_000,
            }],
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["senderId"], "alice");
        assert_eq!(value["receiverId"], "bob");
        assert_eq!(value["isRead"], false);
        assert_eq!(value["readBy"][0]["userId"], "bob");
        // 空字段不上线 / Absent optionals stay off the wire
        assert!(value.get("groupId").is_none());
        assert!(value.get("fileUrl").is_none());
    }

    #[test]
    fn test_payloads_tolerate_partial_data() {
        let payload: NewMessagePayload =
            serde_json::from_value(json!({"senderId": "alice", "content": "hi"})).unwrap();
        assert_eq!(payload.sender_id.as_deref(), Some("alice"));
        assert!(payload.receiver_id.is_none());
        assert!(payload.group_id.is_none());

        let edit: EditMessagePayload =
            serde_json::from_value(json!({"messageId": "m1", "newContent": ""})).unwrap();
        assert_eq!(edit.new_content.as_ref().and_then(|v| v.as_str()), Some(""));
    }
}
