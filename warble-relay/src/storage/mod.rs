use anyhow::Result;
use async_trait::async_trait;

use crate::domain::message::{ChatMessage, ReadEntry};

pub mod memory;

/// 待保存的消息 / Message awaiting persistence
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: Option<String>,
    pub sender_id: String,
    pub receiver_id: Option<String>,
    pub group_id: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
}

/// 查询过滤条件 / Query filter
///
/// 默认匹配全部消息 / The default matches every message.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub group_id: Option<String>,
    /// 双向的私聊会话 / Direct conversation in both directions
    pub direct_pair: Option<(String, String)>,
}

impl MessageFilter {
    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            direct_pair: None,
        }
    }

    pub fn between(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            group_id: None,
            direct_pair: Some((a.into(), b.into())),
        }
    }

    pub fn matches(&self, message: &ChatMessage) -> bool {
        if let Some(group_id) = &self.group_id {
            return message.group_id.as_deref() == Some(group_id.as_str());
        }
        if let Some((a, b)) = &self.direct_pair {
            let sender = message.sender_id.as_str();
            let receiver = message.receiver_id.as_deref().unwrap_or("");
            return (sender == a && receiver == b) || (sender == b && receiver == a);
        }
        true
    }
}

/// 排序方向 / Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    CreatedAsc,
    CreatedDesc,
}

/// 查询分页选项 / Query pagination options
#[derive(Debug, Clone, Copy)]
pub struct FindOptions {
    pub sort: SortOrder,
    pub skip: usize,
    pub limit: usize,
}

impl FindOptions {
    pub fn page(sort: SortOrder, skip: usize, limit: usize) -> Self {
        Self { sort, skip, limit }
    }

    pub fn unpaged(sort: SortOrder) -> Self {
        Self {
            sort,
            skip: 0,
            limit: usize::MAX,
        }
    }
}

/// 消息更新补丁 / Message update patch
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub mark_updated: Option<bool>,
    pub mark_read: Option<bool>,
    pub add_read_entry: Option<ReadEntry>,
}

/// 消息存储 / Message store
///
/// 中继只依赖这个抽象，内存实现用于单机与测试，
/// 生产部署可以换成任意数据库后端。
/// The relay only depends on this abstraction. The in-memory
/// implementation serves single-node runs and tests, production
/// deployments can plug in any database backend.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, new: NewMessage) -> Result<ChatMessage>;
    async fn find_many(&self, filter: MessageFilter, options: FindOptions)
        -> Result<Vec<ChatMessage>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<ChatMessage>>;
    async fn update_by_id(&self, id: &str, patch: MessagePatch) -> Result<Option<ChatMessage>>;
    async fn delete_by_id(&self, id: &str) -> Result<Option<ChatMessage>>;
}
