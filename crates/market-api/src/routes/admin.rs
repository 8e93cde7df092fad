//! 캐시 관리 endpoint.
//!
//! - `GET /api/admin/cache` - 데이터셋 상태와 응답 캐시 항목 수
//! - `POST /api/admin/cache/{dataset}/refresh` - 무효화 후 동기 갱신
//! - `DELETE /api/admin/cache/{dataset}` - 데이터셋 무효화
//! - `DELETE /api/admin/cache` - 응답 캐시 전체 삭제

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use market_data::DatasetStatus;

use crate::error::{cache_error, ApiResult};
use crate::state::AppState;

/// 캐시 현황 응답.
#[derive(Debug, Serialize)]
pub struct CacheOverview {
    pub datasets: Vec<DatasetStatus>,
    pub response_cache_entries: usize,
}

/// 전체 캐시 현황.
pub async fn get_cache_overview(State(state): State<Arc<AppState>>) -> Json<CacheOverview> {
    Json(CacheOverview {
        datasets: state.datasets.statuses(),
        response_cache_entries: state.responses.len(),
    })
}

/// 데이터셋을 무효화하고 즉시 다시 가져옵니다.
///
/// 업스트림이 실패해도 200이며, 결과 상태의 `state`가 `empty`로 남습니다.
pub async fn refresh_dataset(
    State(state): State<Arc<AppState>>,
    Path(dataset): Path<String>,
) -> ApiResult<Json<DatasetStatus>> {
    let handle = state.datasets.get(&dataset).map_err(cache_error)?;

    info!(dataset = %dataset, "수동 갱신 요청");
    Ok(Json(handle.force_refresh().await))
}

/// 데이터셋 무효화. 다음 조회에서 다시 가져옵니다.
pub async fn invalidate_dataset(
    State(state): State<Arc<AppState>>,
    Path(dataset): Path<String>,
) -> ApiResult<Json<DatasetStatus>> {
    let handle = state.datasets.get(&dataset).map_err(cache_error)?;
    handle.invalidate();
    Ok(Json(handle.status()))
}

/// 응답 캐시 전체 삭제.
pub async fn clear_responses(State(state): State<Arc<AppState>>) -> StatusCode {
    let cleared = state.responses.len();
    state.responses.clear(None);

    info!(cleared, "응답 캐시 삭제");
    StatusCode::NO_CONTENT
}

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cache_overview).delete(clear_responses))
        .route("/{dataset}", delete(invalidate_dataset))
        .route("/{dataset}/refresh", post(refresh_dataset))
}
