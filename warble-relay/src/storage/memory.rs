use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Reverse;
use uuid::Uuid;

use crate::domain::message::ChatMessage;
use crate::storage::{FindOptions, MessageFilter, MessagePatch, MessageStore, NewMessage, SortOrder};

/// 内存消息存储 / In-memory message store
///
/// 插入顺序作为同毫秒消息的次级排序键。
/// Insertion order breaks ties between messages created in the same millisecond.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<ChatMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create(&self, new: NewMessage) -> Result<ChatMessage> {
        let now = chrono::Utc::now().timestamp_millis();
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            content: new.content,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            group_id: new.group_id,
            file_url: new.file_url,
            file_type: new.file_type,
            is_read: false,
            is_update: false,
            read_by: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.messages.write().push(message.clone());
        Ok(message)
    }

    async fn find_many(
        &self,
        filter: MessageFilter,
        options: FindOptions,
    ) -> Result<Vec<ChatMessage>> {
        let guard = self.messages.read();
        let mut rows: Vec<(usize, &ChatMessage)> = guard
            .iter()
            .enumerate()
            .filter(|(_, message)| filter.matches(message))
            .collect();
        match options.sort {
            SortOrder::CreatedAsc => rows.sort_by_key(|(index, message)| (message.created_at, *index)),
            SortOrder::CreatedDesc => {
                rows.sort_by_key(|(index, message)| (Reverse(message.created_at), Reverse(*index)))
            }
        }
        Ok(rows
            .into_iter()
            .skip(options.skip)
            .take(options.limit)
            .map(|(_, message)| message.clone())
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ChatMessage>> {
        let guard = self.messages.read();
        Ok(guard.iter().find(|message| message.id == id).cloned())
    }

    async fn update_by_id(&self, id: &str, patch: MessagePatch) -> Result<Option<ChatMessage>> {
        let mut guard = self.messages.write();
        let message = match guard.iter_mut().find(|message| message.id == id) {
            Some(message) => message,
            None => return Ok(None),
        };
        if let Some(content) = patch.content {
            message.content = Some(content);
        }
        if let Some(flag) = patch.mark_updated {
            message.is_update = flag;
        }
        if let Some(flag) = patch.mark_read {
            message.is_read = flag;
        }
        if let Some(entry) = patch.add_read_entry {
            // 同一用户只记一次回执 / One receipt per user
            if !message
                .read_by
                .iter()
                .any(|existing| existing.user_id == entry.user_id)
            {
                message.read_by.push(entry);
            }
        }
        message.updated_at = chrono::Utc::now().timestamp_millis();
        Ok(Some(message.clone()))
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<ChatMessage>> {
        let mut guard = self.messages.write();
        let position = guard.iter().position(|message| message.id == id);
        Ok(position.map(|index| guard.remove(index)))
    }
}
