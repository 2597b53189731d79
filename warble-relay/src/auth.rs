use anyhow::Result;
use async_trait::async_trait;

/// 注册校验器 / Registration verifier
///
/// register 事件绑定用户身份前先过这里，
/// 返回 false 时连接保持匿名。
/// Consulted before the register event binds an identity,
/// the connection stays anonymous when this returns false.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, user_id: &str, token: Option<&str>) -> Result<bool>;
}

/// 放行校验器 / Permissive verifier
///
/// 默认实现，接受任何注册请求。
/// The default, accepts every registration.
#[derive(Default)]
pub struct PermissiveVerifier;

#[async_trait]
impl AuthVerifier for PermissiveVerifier {
    async fn verify(&self, _user_id: &str, _token: Option<&str>) -> Result<bool> {
        Ok(true)
    }
}

/// 令牌校验器 / Token verifier
///
/// 要求非空令牌，配置了共享密钥时还要求完全一致。
/// Requires a non-empty token, and an exact match when a shared
/// secret is configured.
pub struct RequireTokenVerifier {
    secret: Option<String>,
}

impl RequireTokenVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl AuthVerifier for RequireTokenVerifier {
    async fn verify(&self, _user_id: &str, token: Option<&str>) -> Result<bool> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(false),
        };
        match &self.secret {
            Some(secret) => Ok(token == secret),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permissive_accepts_everything() {
        let verifier = PermissiveVerifier;
        assert!(verifier.verify("alice", None).await.unwrap());
        assert!(verifier.verify("alice", Some("anything")).await.unwrap());
    }

    #[tokio::test]
    async fn test_require_token_without_secret() {
        let verifier = RequireTokenVerifier::new(None);
        assert!(!verifier.verify("alice", None).await.unwrap());
        assert!(!verifier.verify("alice", Some("")).await.unwrap());
        assert!(verifier.verify("alice", Some("any-token")).await.unwrap());
    }

    #[tokio::test]
    async fn test_require_token_with_secret() {
        let verifier = RequireTokenVerifier::new(Some("s3cret".to_string()));
        assert!(verifier.verify("alice", Some("s3cret")).await.unwrap());
        assert!(!verifier.verify("alice", Some("wrong")).await.unwrap());
    }
}
