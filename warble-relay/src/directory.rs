use anyhow::Result;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;

use crate::domain::message::UserSummary;

/// 群组目录 / Group directory
///
/// 已读回执需要知道群里有谁，成员关系由外部系统维护。
/// Read receipts need to know who is in a group, membership is owned
/// by an external system.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn members(&self, group_id: &str) -> Result<Vec<String>>;
}

/// 用户目录 / User directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserSummary>>;
}

/// 内存群组目录 / In-memory group directory
#[derive(Default)]
pub struct MemoryGroupDirectory {
    groups: DashMap<String, DashSet<String>>,
}

impl MemoryGroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, group_id: &str, user_id: &str) {
        self.groups
            .entry(group_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }
}

#[async_trait]
impl GroupDirectory for MemoryGroupDirectory {
    async fn members(&self, group_id: &str) -> Result<Vec<String>> {
        match self.groups.get(group_id) {
            Some(members) => Ok(members.iter().map(|member| member.key().clone()).collect()),
            None => Ok(Vec::new()),
        }
    }
}

/// 内存用户目录 / In-memory user directory
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<UserSummary>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: UserSummary) {
        self.users.write().push(user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn list_users(&self) -> Result<Vec<UserSummary>> {
        Ok(self.users.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_group_membership() {
        let directory = MemoryGroupDirectory::new();
        directory.add_member("g1", "alice");
        directory.add_member("g1", "bob");
        directory.add_member("g1", "bob");

        let mut members = directory.members("g1").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);
        assert!(directory.members("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_listing() {
        let directory = MemoryUserDirectory::new();
        directory.add_user(UserSummary {
            id: "alice".to_string(),
            username: "Alice".to_string(),
            avatar_url: None,
        });

        let users = directory.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "alice");
    }
}
