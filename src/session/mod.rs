/// 세션 검증 계층
/// 인증 자체(비밀번호/JWT 발급)는 별도 인증 서비스 몫이고,
/// 여기서는 토큰 -> {user_id, role} 해석을 TTL 키-값 저장소 캐퍼빌리티로 추상화한다.
// region:    --- Imports
use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// endregion: --- Imports

// region:    --- Session Store
/// 인증된 세션
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub role: String,
}

/// TTL 키-값 세션 저장소 트레이트
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 세션 저장(ttl 경과 후 자동 만료)
    async fn put(&self, token: &str, session: Session, ttl: Duration);
    /// 세션 조회(만료된 항목은 miss)
    async fn get(&self, token: &str) -> Option<Session>;
    /// 세션 폐기
    async fn revoke(&self, token: &str);
}

/// 인메모리 구현체
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, (Session, Instant)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, token: &str, session: Session, ttl: Duration) {
        let deadline = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(token.to_string(), (session, deadline));
    }

    async fn get(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(token) {
                Some((session, deadline)) if *deadline > now => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // 만료된 항목은 지연 정리
        self.entries.write().await.remove(token);
        None
    }

    async fn revoke(&self, token: &str) {
        self.entries.write().await.remove(token);
    }
}
// endregion: --- Session Store

// region:    --- Extractors
/// 인증된 사용자 추출기 (Authorization: Bearer <token>)
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<dyn SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = Arc::<dyn SessionStore>::from_ref(state);

        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let session = store.get(token).await.ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser {
            user_id: session.user_id,
            role: session.role,
        })
    }
}

/// 관리자 추출기
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<dyn SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != "admin" {
            return Err(ApiError::Forbidden("관리자 권한이 필요합니다.".into()));
        }
        Ok(AdminUser(user))
    }
}
// endregion: --- Extractors

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: i64) -> Session {
        Session {
            user_id,
            role: "user".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemorySessionStore::new();
        store
            .put("tok-1", session(7), Duration::from_secs(60))
            .await;
        let got = store.get("tok-1").await.unwrap();
        assert_eq!(got.user_id, 7);
        assert_eq!(got.role, "user");
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let store = InMemorySessionStore::new();
        store
            .put("tok-2", session(1), Duration::from_millis(10))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get("tok-2").await.is_none());
        // 만료 후 재조회도 miss
        assert!(store.get("tok-2").await.is_none());
    }

    #[tokio::test]
    async fn revoke_removes_entry() {
        let store = InMemorySessionStore::new();
        store
            .put("tok-3", session(2), Duration::from_secs(60))
            .await;
        store.revoke("tok-3").await;
        assert!(store.get("tok-3").await.is_none());
    }
}
// endregion: --- Tests
