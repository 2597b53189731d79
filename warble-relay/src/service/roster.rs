use anyhow::Result;
use serde_json::{json, Value};

use crate::domain::message::UserWithMessages;
use crate::server::RelayServer;
use crate::storage::{FindOptions, MessageFilter, SortOrder};

/// 会话摘要汇总 / Conversation summary aggregation
impl RelayServer {
    /// 汇总用户列表与会话摘要 / Aggregate the user list with conversation summaries
    ///
    /// 每个用户条目带上对方发给请求者的最近一条消息（没有时是字符串
    /// "empty"）和未读数。请求者自己不出现在结果里。
    /// Each entry carries the latest message that user sent the
    /// requester (the string "empty" when none) and the unread count.
    /// The requester is not part of the result.
    pub async fn collect_user_data(&self, requester_id: &str) -> Result<Vec<UserWithMessages>> {
        let users = self.users.list_users().await?;
        let mut roster = Vec::new();

        for user in users {
            if user.id == requester_id {
                continue;
            }

            let conversation = self
                .store
                .find_many(
                    MessageFilter::between(user.id.clone(), requester_id.to_string()),
                    FindOptions::unpaged(SortOrder::CreatedAsc),
                )
                .await?;

            let last_message = conversation
                .iter()
                .rev()
                .find(|message| message.sender_id == user.id)
                .map(|message| json!(message))
                .unwrap_or_else(|| Value::String("empty".to_string()));
            let unread_count = conversation
                .iter()
                .filter(|message| message.sender_id == user.id && !message.is_read)
                .count();

            roster.push(UserWithMessages {
                user,
                last_message,
                unread_count,
            });
        }

        Ok(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryUserDirectory;
    use crate::domain::message::UserSummary;
    use crate::storage::{MessagePatch, NewMessage};
    use std::sync::Arc;

    fn user(id: &str, username: &str) -> UserSummary {
        UserSummary {
            id: id.to_string(),
            username: username.to_string(),
            avatar_url: None,
        }
    }

    fn direct(sender: &str, receiver: &str, content: &str) -> NewMessage {
        NewMessage {
            content: Some(content.to_string()),
            sender_id: sender.to_string(),
            receiver_id: Some(receiver.to_string()),
            group_id: None,
            file_url: None,
            file_type: None,
        }
    }

    #[tokio::test]
    async fn test_roster_carries_last_message_and_unread_count() {
        let users = Arc::new(MemoryUserDirectory::new());
        users.add_user(user("alice", "Alice"));
        users.add_user(user("bob", "Bob"));
        users.add_user(user("carol", "Carol"));
        let server = RelayServer::new().with_users(users);

        let first = server
            .store
            .create(direct("bob", "alice", "earlier"))
            .await
            .unwrap();
        server
            .store
            .create(direct("bob", "alice", "latest"))
            .await
            .unwrap();
        // 回去方向的消息不计入未读 / Messages in the other direction are not unread
        server
            .store
            .create(direct("alice", "bob", "reply"))
            .await
            .unwrap();
        server
            .store
            .update_by_id(
                &first.id,
                MessagePatch {
                    mark_read: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let roster = server.collect_user_data("alice").await.unwrap();
        assert_eq!(roster.len(), 2);
        // 请求者不在列表里 / The requester is excluded
        assert!(roster.iter().all(|entry| entry.user.id != "alice"));

        let bob = roster.iter().find(|entry| entry.user.id == "bob").unwrap();
        assert_eq!(bob.last_message["content"], "latest");
        assert_eq!(bob.unread_count, 1);

        let carol = roster.iter().find(|entry| entry.user.id == "carol").unwrap();
        assert_eq!(carol.last_message, Value::String("empty".to_string()));
        assert_eq!(carol.unread_count, 0);
    }

    #[tokio::test]
    async fn test_roster_serializes_flat_user_fields() {
        let users = Arc::new(MemoryUserDirectory::new());
        users.add_user(user("alice", "Alice"));
        users.add_user(user("bob", "Bob"));
        let server = RelayServer::new().with_users(users);

        let roster = server.collect_user_data("alice").await.unwrap();
        let value = serde_json::to_value(&roster).unwrap();
        // 用户字段平铺在条目上 / User fields sit flat on the entry
        assert_eq!(value[0]["id"], "bob");
        assert_eq!(value[0]["username"], "Bob");
        assert_eq!(value[0]["lastMessage"], "empty");
        assert_eq!(value[0]["unreadCount"], 0);
    }
}
