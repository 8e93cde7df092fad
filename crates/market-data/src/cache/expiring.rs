//! 만료 시간이 있는 키/값 캐시.
//!
//! 엔드포인트 파라미터별 응답(예: `"52week:highs:20"`, `"sectors:history:1mo"`)처럼
//! 키가 동적으로 생기는 결과를 짧은 TTL로 보관합니다.
//!
//! - 만료는 조회 시점에만 판단합니다 (별도 정리 작업 없음).
//! - 용량 제한이나 LRU 축출이 없습니다. 메모리는 짧은 TTL로만 제한됩니다.
//! - 시각은 `tokio::time::Instant` 기준이므로 테스트에서 `tokio::time::pause`로 제어할 수 있습니다.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::CacheError;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// `expires_at` 시점부터 무효.
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 프로세스 전역에서 공유되는 TTL 캐시.
///
/// 애플리케이션 상태에서 한 번 생성해 주입합니다.
pub struct ExpiringCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> Default for ExpiringCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // 값은 통째로 교체되므로 poison 이후에도 맵 상태는 일관적
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 값을 조회합니다. 만료된 항목은 제거하고 `None`을 반환합니다.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let now = Instant::now();

        match entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
        }

        entries.remove(key);
        trace!(key, "만료된 캐시 항목 제거");
        None
    }

    /// 값을 저장합니다. 기존 항목은 무조건 덮어씁니다.
    ///
    /// # Errors
    ///
    /// `ttl`이 0이면 [`CacheError::InvalidTtl`]을 반환합니다.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<(), CacheError> {
        let key = key.into();
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(key));
        }

        let expires_at = Instant::now() + ttl;
        self.lock().insert(key, CacheEntry { value, expires_at });
        Ok(())
    }

    /// `key`가 주어지면 해당 항목만, 없으면 전체를 삭제합니다.
    pub fn clear(&self, key: Option<&str>) {
        let mut entries = self.lock();
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
    }

    /// 저장된 항목 수 (아직 조회되지 않은 만료 항목 포함).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 캐시된 값이 있으면 반환하고, 없으면 `fetch`를 실행해 성공한 결과를 저장합니다.
    ///
    /// 실패한 결과는 캐시하지 않습니다.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(key.to_string()).into());
        }

        if let Some(value) = self.get(key) {
            debug!(key, "캐시 히트");
            return Ok(value);
        }

        debug!(key, "캐시 미스");
        let value = fetch().await?;
        self.set(key, value.clone(), ttl)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test(start_paused = true)]
    async fn test_get_before_and_after_expiry() {
        let cache = ExpiringCache::new();
        cache.set("macro:overview", json!({"vix": 14.2}), Duration::from_secs(5)).unwrap();

        assert_eq!(cache.get("macro:overview"), Some(json!({"vix": 14.2})));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("macro:overview"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_then_reset_scenario() {
        let cache = ExpiringCache::new();
        cache.set("x", json!({"a": 1}), Duration::from_secs(1)).unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("x"), None);

        cache.set("x", json!({"a": 2}), Duration::from_secs(10)).unwrap();
        assert_eq!(cache.get("x"), Some(json!({"a": 2})));
    }

    #[test]
    fn test_overwrite_returns_latest() {
        let cache = ExpiringCache::new();
        cache.set("k", 1, Duration::from_secs(60)).unwrap();
        cache.set("k", 2, Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_evicted_on_get() {
        let cache = ExpiringCache::new();
        cache.set("short", 1, Duration::from_secs(1)).unwrap();
        cache.set("long", 2, Duration::from_secs(100)).unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        // 조회 전에는 물리적으로 남아 있음
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let cache: ExpiringCache<Value> = ExpiringCache::new();
        let err = cache.set("k", json!(1), Duration::ZERO).unwrap_err();
        assert_eq!(err, CacheError::InvalidTtl("k".to_string()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_single_and_all() {
        let cache = ExpiringCache::new();
        cache.set("a", 1, Duration::from_secs(60)).unwrap();
        cache.set("b", 2, Duration::from_secs(60)).unwrap();

        cache.clear(Some("missing"));
        assert_eq!(cache.len(), 2);

        cache.clear(Some("a"));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));

        cache.clear(None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_insert_with_memoizes_success_only() {
        let cache: ExpiringCache<u32> = ExpiringCache::new();
        let ttl = Duration::from_secs(30);

        let failed: Result<u32, CacheError> = cache
            .get_or_insert_with("reports:list", ttl, || async {
                Err(CacheError::UnknownDataset("reports".to_string()))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let first: Result<u32, CacheError> = cache
            .get_or_insert_with("reports:list", ttl, || async { Ok(7) })
            .await;
        let second: Result<u32, CacheError> = cache
            .get_or_insert_with("reports:list", ttl, || async { Ok(99) })
            .await;
        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));

        tokio::time::advance(ttl).await;
        let refreshed: Result<u32, CacheError> = cache
            .get_or_insert_with("reports:list", ttl, || async { Ok(99) })
            .await;
        assert_eq!(refreshed, Ok(99));
    }
}
