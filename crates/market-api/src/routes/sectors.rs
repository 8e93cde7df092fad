//! 섹터 endpoint.
//!
//! - `GET /api/sectors/performance` - 섹터 ETF 1일/1주/1개월/1년 수익률
//! - `GET /api/sectors/history?period=` - 주요 섹터 누적 수익률 추이 (1d, 5d, 1mo, 3mo, 1y)

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use market_data::datasets::{
    fetch_sector_history, HistoryPeriod, SectorHistory, SectorPerformance, SECTORS,
};

use crate::error::{bad_request, ApiResult, SourceError};
use crate::routes::response::{memoized, DatasetResponse};
use crate::state::AppState;

/// 섹터 추이 쿼리.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub period: Option<String>,
}

/// 섹터 ETF 성과.
pub async fn get_sector_performance(
    State(state): State<Arc<AppState>>,
) -> Json<DatasetResponse<SectorPerformance>> {
    let view = state.sectors.get_or_refresh().await;
    Json(DatasetResponse::from_view(
        SECTORS,
        &view,
        SectorPerformance::clone(&view.data),
    ))
}

/// 섹터 누적 수익률 추이.
///
/// 결과는 기간별로 응답 캐시에 보관됩니다. 조회에 실패하면 빈 추이를 반환합니다.
pub async fn get_sector_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let period = match query.period.as_deref() {
        Some(raw) => raw
            .parse::<HistoryPeriod>()
            .map_err(|message| bad_request("INVALID_PERIOD", message))?,
        None => HistoryPeriod::default(),
    };

    let quotes = state.quotes.clone();
    let result = memoized(
        &state,
        &period.cache_key(),
        state.sector_history_ttl(),
        || async move {
            fetch_sector_history(quotes.as_ref(), period)
                .await
                .map_err(SourceError::from)
        },
    )
    .await;

    match result {
        Ok(history) => Ok(Json(history)),
        Err(e) => {
            warn!(period = %period, error = %e, "섹터 추이 조회 실패");
            Ok(Json(
                serde_json::to_value(SectorHistory::empty(period)).unwrap_or(Value::Null),
            ))
        }
    }
}

pub fn sectors_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/performance", get(get_sector_performance))
        .route("/history", get(get_sector_history))
}
