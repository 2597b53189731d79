use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::domain::message::{
    DeleteMessagePayload, EditMessagePayload, EventEnvelope, FetchMessagesPayload, JoinRoomPayload,
    MessageReadPayload, NewMessagePayload, ReadEntry, RegisterPayload, TypingPayload,
    UserDataPayload,
};
use crate::server::RelayServer;
use crate::storage::{FindOptions, MessageFilter, MessagePatch, NewMessage, SortOrder};

/// 空字符串按缺失处理 / Empty strings count as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|candidate| !candidate.is_empty())
}

/// 会话事件处理 / Session event handling
impl RelayServer {
    pub async fn handle_incoming_message(
        &self,
        message: Message,
        connection_id: &str,
    ) -> Result<()> {
        // 任何入站帧都刷新心跳 / Every inbound frame refreshes the heartbeat
        self.update_heartbeat(connection_id).await;

        match message {
            Message::Text(text) => {
                debug!("📨 Received text from {}: {}", connection_id, text);

                match serde_json::from_str::<EventEnvelope>(&text) {
                    Ok(envelope) => {
                        self.dispatch_event(envelope, connection_id).await?;
                    }
                    Err(e) => {
                        warn!("⚠️  Invalid JSON from {}: {}", connection_id, e);
                        self.emit_error(connection_id, "Invalid JSON format").await;
                    }
                }
            }
            Message::Binary(data) => {
                debug!(
                    "📦 Received binary data from {}: {} bytes",
                    connection_id,
                    data.len()
                );
            }
            Message::Ping(_data) => {
                debug!("🏓 Received ping from {}", connection_id);
                // pong由tokio-tungstenite自动应答 / tokio-tungstenite answers these itself
            }
            Message::Pong(_) => {
                debug!("🏸 Received pong from {}", connection_id);
            }
            Message::Close(frame) => {
                info!("🔒 Connection {} requested close: {:?}", connection_id, frame);
            }
            _ => {
                debug!("❓ Received other message type from {}", connection_id);
            }
        }

        Ok(())
    }

    async fn dispatch_event(&self, envelope: EventEnvelope, connection_id: &str) -> Result<()> {
        let EventEnvelope { event, data } = envelope;
        match event.as_str() {
            "register" => self.on_register(data, connection_id).await,
            "joinRoom" => self.on_join_room(data, connection_id).await,
            "typing" => self.on_typing(data, connection_id).await,
            "fetchMessages" => self.on_fetch_messages(data, connection_id).await,
            "newMessage" => self.on_new_message(data, connection_id).await,
            "messageRead" => self.on_message_read(data, connection_id).await,
            "editMessage" => self.on_edit_message(data, connection_id).await,
            "deleteMessage" => self.on_delete_message(data, connection_id).await,
            "getUserDataWithMessages" => self.on_get_user_data(data, connection_id).await,
            "ping" => {
                debug!("🏓 Ping from {}", connection_id);
                self.emit_event(
                    connection_id,
                    "pong",
                    json!({
                        "timestamp": Utc::now().timestamp_millis(),
                        "connectionId": connection_id
                    }),
                )
                .await;
                Ok(())
            }
            "disconnect" => {
                info!("👋 Connection {} asked to disconnect", connection_id);
                let _ = self.send_close_message(connection_id).await;
                Ok(())
            }
            unknown => {
                warn!("⚠️  Unknown event type from {}: {}", connection_id, unknown);
                self.emit_error(connection_id, &format!("Unknown event type: {}", unknown))
                    .await;
                Ok(())
            }
        }
    }

    /// 连接当前绑定的用户 / User currently bound to the connection
    fn bound_uid(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get(connection_id)
            .and_then(|connection| connection.uid.clone())
    }

    /// 历史查询分页 / History query paging
    ///
    /// 非法页码回退到第一页，非法limit回退到配置默认值。
    /// Invalid pages fall back to the first page, invalid limits to the
    /// configured default.
    fn history_page(&self, page: Option<i64>, limit: Option<i64>, sort: SortOrder) -> FindOptions {
        let limit = limit
            .filter(|candidate| *candidate > 0)
            .map(|candidate| candidate as usize)
            .unwrap_or(self.history.default_limit);
        let page = page.unwrap_or(1).max(1) as usize;
        FindOptions::page(sort, (page - 1) * limit, limit)
    }

    async fn on_register(&self, data: Value, connection_id: &str) -> Result<()> {
        let payload: RegisterPayload = match serde_json::from_value(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("⚠️  Bad register payload from {}: {}", connection_id, e);
                self.emit_error(connection_id, "register requires userId").await;
                return Ok(());
            }
        };
        if payload.user_id.is_empty() {
            self.emit_error(connection_id, "register requires userId").await;
            return Ok(());
        }

        // 连接注册后身份不可改 / Identity is immutable once registered
        if let Some(bound) = self.bound_uid(connection_id) {
            if bound != payload.user_id {
                self.emit_error(connection_id, "Connection already registered to another user.")
                    .await;
                return Ok(());
            }
        }

        let accepted = self
            .auth
            .verify(&payload.user_id, payload.token.as_deref())
            .await
            .unwrap_or(false);
        if !accepted {
            warn!(
                "🔒 Registration rejected for user {} on connection {}",
                payload.user_id, connection_id
            );
            self.emit_error(connection_id, "Registration rejected.").await;
            return Ok(());
        }

        if let Some(mut connection) = self.connections.get_mut(connection_id) {
            connection.uid = Some(payload.user_id.clone());
        }
        self.presence.register(&payload.user_id, connection_id);
        info!(
            "🔗 User {} registered on connection {}",
            payload.user_id, connection_id
        );
        self.emit_event(connection_id, "registered", json!({"userId": payload.user_id}))
            .await;
        Ok(())
    }

    async fn on_join_room(&self, data: Value, connection_id: &str) -> Result<()> {
        let payload: JoinRoomPayload = serde_json::from_value(data).unwrap_or_default();
        let group_id = match non_empty(payload.group_id) {
            Some(group_id) => group_id,
            None => {
                self.emit_error(connection_id, "Missing or invalid groupId.").await;
                return Ok(());
            }
        };

        // 先入房再拉历史，拉取期间的新消息不会漏 / Join before fetching history so
        // messages arriving meanwhile are not missed
        self.join_room(&group_id, connection_id);
        info!("🚪 Connection {} joined room {}", connection_id, group_id);

        let options = self.history_page(payload.page, payload.limit, SortOrder::CreatedDesc);
        match self
            .store
            .find_many(MessageFilter::group(group_id.as_str()), options)
            .await
        {
            Ok(mut batch) => {
                // 倒序取页，正序下发 / Page newest-first, deliver oldest-first
                batch.reverse();
                let count = batch.len();
                self.emit_event(connection_id, "historicalMessages", json!(batch))
                    .await;
                self.emit_event(
                    connection_id,
                    "joinedRoom",
                    json!({"groupId": group_id, "messageCount": count}),
                )
                .await;
            }
            Err(e) => {
                warn!("💥 History fetch failed for room {}: {}", group_id, e);
                self.emit_error(
                    connection_id,
                    &format!("Could not fetch historical messages for room {}.", group_id),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn on_typing(&self, data: Value, connection_id: &str) -> Result<()> {
        // 打字提示是尽力而为，坏载荷静默丢弃 / Typing hints are best-effort,
        // malformed payloads are dropped silently
        let payload: TypingPayload = match serde_json::from_value(data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Ignoring malformed typing payload from {}: {}", connection_id, e);
                return Ok(());
            }
        };
        if payload.user_id.is_empty() {
            return Ok(());
        }

        let delivered = self.route_typing(&payload, connection_id).await;
        debug!(
            "⌨️  Typing from {} delivered to {} connections",
            payload.user_id, delivered
        );
        Ok(())
    }

    async fn on_fetch_messages(&self, data: Value, connection_id: &str) -> Result<()> {
        let payload: FetchMessagesPayload = serde_json::from_value(data).unwrap_or_default();

        let filter = if let Some(group_id) = non_empty(payload.group_id) {
            MessageFilter::group(group_id)
        } else {
            match (non_empty(payload.sender_id), non_empty(payload.receiver_id)) {
                (Some(sender), Some(receiver)) => MessageFilter::between(sender, receiver),
                // 没有条件时返回整个消息流 / No criteria means the whole stream
                _ => MessageFilter::default(),
            }
        };

        let options = self.history_page(payload.page, payload.limit, SortOrder::CreatedAsc);
        match self.store.find_many(filter, options).await {
            Ok(batch) => {
                self.emit_event(connection_id, "messages", json!(batch)).await;
            }
            Err(e) => {
                warn!("💥 Message fetch failed for {}: {}", connection_id, e);
                self.emit_error(connection_id, "Could not fetch messages").await;
            }
        }
        Ok(())
    }

    async fn on_new_message(&self, data: Value, connection_id: &str) -> Result<()> {
        let payload: NewMessagePayload = serde_json::from_value(data).unwrap_or_default();

        let receiver_id = non_empty(payload.receiver_id);
        let group_id = non_empty(payload.group_id);
        let file_url = non_empty(payload.file_url);
        let has_content = payload
            .content
            .as_deref()
            .map(|content| !content.trim().is_empty())
            .unwrap_or(false);

        let sender_id = match non_empty(payload.sender_id) {
            Some(sender_id) => sender_id,
            None => {
                self.emit_error(connection_id, "Missing required message fields.").await;
                return Ok(());
            }
        };
        if (!has_content && file_url.is_none()) || (receiver_id.is_none() && group_id.is_none()) {
            self.emit_error(connection_id, "Missing required message fields.").await;
            return Ok(());
        }

        // 已注册连接只能以绑定身份发言 / A registered connection speaks only as its bound user
        if let Some(bound) = self.bound_uid(connection_id) {
            if bound != sender_id {
                self.emit_error(connection_id, "Sender identity does not match this connection.")
                    .await;
                return Ok(());
            }
        }

        let new = NewMessage {
            content: payload.content,
            sender_id,
            receiver_id,
            group_id,
            file_url,
            file_type: non_empty(payload.file_type),
        };
        let saved = match self.store.create(new).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("💥 Message save failed for {}: {}", connection_id, e);
                self.emit_error(connection_id, "Error saving message.").await;
                return Ok(());
            }
        };

        info!("💬 Message {} from {} saved", saved.id, saved.sender_id);
        let delivered = self.route_new_message(&saved, connection_id).await;
        debug!("📨 Message {} routed to {} connections", saved.id, delivered);

        // 发送方连接恰好收到一份保存结果 / Origin connection gets exactly one copy
        self.emit_event(connection_id, "message", json!(saved)).await;
        Ok(())
    }

    async fn on_message_read(&self, data: Value, connection_id: &str) -> Result<()> {
        let payload: MessageReadPayload = serde_json::from_value(data).unwrap_or_default();
        let (message_id, user_id) =
            match (non_empty(payload.message_id), non_empty(payload.user_id)) {
                (Some(message_id), Some(user_id)) => (message_id, user_id),
                _ => {
                    self.emit_error(connection_id, "Missing messageId or userId.").await;
                    return Ok(());
                }
            };
        if let Some(bound) = self.bound_uid(connection_id) {
            if bound != user_id {
                self.emit_error(connection_id, "User identity does not match this connection.")
                    .await;
                return Ok(());
            }
        }

        let message = match self.store.find_by_id(&message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.emit_error(connection_id, "Message not found or could not be updated")
                    .await;
                return Ok(());
            }
            Err(e) => {
                warn!("💥 Read receipt lookup failed for {}: {}", message_id, e);
                self.emit_error(connection_id, "Error updating message read status").await;
                return Ok(());
            }
        };

        // 读自己发的消息不翻已读位 / Reading your own message does not flip isRead
        let patch = MessagePatch {
            mark_read: if message.sender_id != user_id {
                Some(true)
            } else {
                None
            },
            add_read_entry: Some(ReadEntry {
                user_id: user_id.clone(),
                read_at: Utc::now().timestamp_millis(),
            }),
            ..Default::default()
        };
        let updated = match self.store.update_by_id(&message_id, patch).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                self.emit_error(connection_id, "Message not found or could not be updated")
                    .await;
                return Ok(());
            }
            Err(e) => {
                warn!("💥 Read receipt update failed for {}: {}", message_id, e);
                self.emit_error(connection_id, "Error updating message read status").await;
                return Ok(());
            }
        };

        debug!("📖 Message {} read by {}", updated.id, user_id);
        self.route_read_receipt(&updated, &user_id, connection_id).await;
        Ok(())
    }

    async fn on_edit_message(&self, data: Value, connection_id: &str) -> Result<()> {
        let payload: EditMessagePayload = serde_json::from_value(data).unwrap_or_default();
        let new_content = payload
            .new_content
            .as_ref()
            .and_then(|value| value.as_str())
            .map(|content| content.to_string());
        let (message_id, new_content) = match (non_empty(payload.message_id), new_content) {
            (Some(message_id), Some(new_content)) => (message_id, new_content),
            _ => {
                self.emit_error(connection_id, "Invalid message ID or content.").await;
                return Ok(());
            }
        };

        let bound = self.bound_uid(connection_id);
        let claimed = non_empty(payload.user_id);
        if let (Some(bound), Some(claimed)) = (&bound, &claimed) {
            if bound != claimed {
                self.emit_error(
                    connection_id,
                    "User does not have permission to edit this message.",
                )
                .await;
                return Ok(());
            }
        }
        let actor = bound.or(claimed);

        let message = match self.store.find_by_id(&message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.emit_error(connection_id, "Message not found.").await;
                return Ok(());
            }
            Err(e) => {
                warn!("💥 Edit lookup failed for {}: {}", message_id, e);
                self.emit_error(connection_id, "Error updating message").await;
                return Ok(());
            }
        };

        // 只有发送者本人能编辑 / Only the sender may edit
        if actor.as_deref() != Some(message.sender_id.as_str()) {
            self.emit_error(
                connection_id,
                "User does not have permission to edit this message.",
            )
            .await;
            return Ok(());
        }

        let patch = MessagePatch {
            content: Some(new_content),
            mark_updated: Some(true),
            ..Default::default()
        };
        let updated = match self.store.update_by_id(&message_id, patch).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                self.emit_error(connection_id, "Message not found.").await;
                return Ok(());
            }
            Err(e) => {
                warn!("💥 Edit failed for {}: {}", message_id, e);
                self.emit_error(connection_id, "Error updating message").await;
                return Ok(());
            }
        };

        info!("✏️  Message {} edited by {}", updated.id, updated.sender_id);
        self.route_message_updated(&updated, connection_id).await;
        self.emit_event(connection_id, "messageUpdated", json!(updated)).await;
        Ok(())
    }

    async fn on_delete_message(&self, data: Value, connection_id: &str) -> Result<()> {
        let payload: DeleteMessagePayload = serde_json::from_value(data).unwrap_or_default();
        let message_id = match non_empty(payload.message_id) {
            Some(message_id) => message_id,
            None => {
                self.emit_error(connection_id, "Invalid request: missing messageId or userId.")
                    .await;
                return Ok(());
            }
        };

        let bound = self.bound_uid(connection_id);
        let claimed = non_empty(payload.user_id);
        if let (Some(bound), Some(claimed)) = (&bound, &claimed) {
            if bound != claimed {
                self.emit_error(
                    connection_id,
                    "User does not have permission to delete this message.",
                )
                .await;
                return Ok(());
            }
        }
        let actor = match bound.or(claimed) {
            Some(actor) => actor,
            None => {
                self.emit_error(connection_id, "Invalid request: missing messageId or userId.")
                    .await;
                return Ok(());
            }
        };

        let message = match self.store.find_by_id(&message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.emit_error(connection_id, "Message not found.").await;
                return Ok(());
            }
            Err(e) => {
                warn!("💥 Delete lookup failed for {}: {}", message_id, e);
                self.emit_error(connection_id, "Error deleting message").await;
                return Ok(());
            }
        };

        // 只有发送者本人能删除 / Only the sender may delete
        if actor != message.sender_id {
            self.emit_error(
                connection_id,
                "User does not have permission to delete this message.",
            )
            .await;
            return Ok(());
        }

        let deleted = match self.store.delete_by_id(&message_id).await {
            Ok(Some(deleted)) => deleted,
            Ok(None) => {
                self.emit_error(connection_id, "Message not found.").await;
                return Ok(());
            }
            Err(e) => {
                warn!("💥 Delete failed for {}: {}", message_id, e);
                self.emit_error(connection_id, "Error deleting message").await;
                return Ok(());
            }
        };

        info!("🧹 Message {} deleted by {}", deleted.id, deleted.sender_id);
        self.route_message_deleted(&deleted, connection_id).await;
        self.emit_event(connection_id, "messageDeleted", Value::String(deleted.id.clone()))
            .await;
        Ok(())
    }

    async fn on_get_user_data(&self, data: Value, connection_id: &str) -> Result<()> {
        let payload: UserDataPayload = serde_json::from_value(data).unwrap_or_default();
        let requester = match non_empty(payload.user_id) {
            Some(requester) => requester,
            None => {
                self.emit_error(connection_id, "getUserDataWithMessages requires userId")
                    .await;
                return Ok(());
            }
        };
        if let Some(bound) = self.bound_uid(connection_id) {
            if bound != requester {
                self.emit_error(connection_id, "User identity does not match this connection.")
                    .await;
                return Ok(());
            }
        }

        match self.collect_user_data(&requester).await {
            Ok(roster) => {
                self.emit_event(connection_id, "userDataWithMessages", json!(roster))
                    .await;
            }
            Err(e) => {
                warn!("💥 Roster build failed for {}: {}", requester, e);
                self.emit_error(connection_id, "Could not fetch user data with messages")
                    .await;
            }
        }
        Ok(())
    }
}
