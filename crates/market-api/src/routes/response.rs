//! 라우트 공용 응답 타입과 캐시 조회 헬퍼.

use std::future::Future;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use market_data::DatasetView;

use crate::error::SourceError;
use crate::metrics::{record_dataset_response, record_store_error};
use crate::state::AppState;

/// 데이터셋 기반 응답.
///
/// 본문 필드 옆에 스냅샷 메타데이터를 붙입니다.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetResponse<T> {
    #[serde(flatten)]
    pub data: T,
    /// 마지막 성공 갱신 시각 (기준 시간대, 없으면 null)
    pub last_update: Option<DateTime<Tz>>,
    /// 다음 갱신 안내 문구
    pub next_update: String,
    /// 본문 전체가 정적 기본값인지 여부
    pub is_fallback: bool,
}

impl<T> DatasetResponse<T> {
    /// 조회 결과의 메타데이터로 응답을 만들고 메트릭을 기록합니다.
    pub fn from_view<U>(dataset: &str, view: &DatasetView<U>, data: T) -> Self {
        record_dataset_response(dataset, view.is_fallback);

        Self {
            data,
            last_update: view.last_update,
            next_update: view.next_update.clone(),
            is_fallback: view.is_fallback,
        }
    }
}

/// 결과를 응답 캐시에 `ttl` 동안 보관합니다.
///
/// 실패한 조회는 캐시하지 않습니다.
pub(crate) async fn memoized<T, F, Fut>(
    state: &AppState,
    key: &str,
    ttl: Duration,
    fetch: F,
) -> Result<Value, SourceError>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    state
        .responses
        .get_or_insert_with(key, ttl, || async move {
            let value = fetch().await?;
            Ok::<_, SourceError>(serde_json::to_value(value)?)
        })
        .await
}

/// 저장소 조회를 캐시와 함께 실행합니다.
///
/// 실패하면 경고를 남기고 `empty`를 반환합니다.
pub(crate) async fn store_query<T, F, Fut>(
    state: &AppState,
    store: &str,
    key: &str,
    fetch: F,
    empty: impl FnOnce() -> Value,
) -> Value
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    match memoized(state, key, state.response_ttl(), fetch).await {
        Ok(value) => value,
        Err(e) => {
            warn!(store, key, error = %e, "저장소 조회 실패, 빈 결과로 응답");
            record_store_error(store);
            empty()
        }
    }
}
