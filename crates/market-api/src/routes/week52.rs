//! 52주 신고가/신저가 endpoint.
//!
//! - `GET /api/52week/highs?limit=` - 신고가 근접 종목 (현재가 ≥ 52주 고가의 98%)
//! - `GET /api/52week/lows?limit=` - 신저가 근접 종목 (현재가 ≤ 52주 저가의 102%)
//! - `GET /api/52week/stats` - 신고가/신저가 수와 시장 폭
//!
//! 세 엔드포인트 모두 하나의 유니버스 스냅샷에서 계산됩니다.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use market_data::datasets::{Week52Stats, Week52Stock, WEEK52};

use crate::error::{validation_error, ApiResult};
use crate::routes::response::DatasetResponse;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 20;

/// 목록 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(range(min = 1, max = 100, message = "limit은 1-100 사이여야 합니다"))]
    pub limit: Option<u32>,
}

impl ListQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT) as usize
    }
}

/// 종목 목록 응답 본문.
#[derive(Debug, Clone, Serialize)]
pub struct StockList {
    pub stocks: Vec<Week52Stock>,
    pub total: usize,
}

impl StockList {
    fn new(stocks: Vec<Week52Stock>) -> Self {
        Self {
            total: stocks.len(),
            stocks,
        }
    }
}

/// 52주 신고가 근접 종목.
pub async fn get_highs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<DatasetResponse<StockList>>> {
    query.validate().map_err(validation_error)?;

    let view = state.week52.get_or_refresh().await;
    let stocks = view.data.highs(query.limit());
    Ok(Json(DatasetResponse::from_view(
        WEEK52,
        &view,
        StockList::new(stocks),
    )))
}

/// 52주 신저가 근접 종목.
pub async fn get_lows(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<DatasetResponse<StockList>>> {
    query.validate().map_err(validation_error)?;

    let view = state.week52.get_or_refresh().await;
    let stocks = view.data.lows(query.limit());
    Ok(Json(DatasetResponse::from_view(
        WEEK52,
        &view,
        StockList::new(stocks),
    )))
}

/// 신고가/신저가 통계.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<DatasetResponse<Week52Stats>> {
    let view = state.week52.get_or_refresh().await;
    let stats = view.data.stats();
    Json(DatasetResponse::from_view(WEEK52, &view, stats))
}

pub fn week52_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/highs", get(get_highs))
        .route("/lows", get(get_lows))
        .route("/stats", get(get_stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use market_data::provider::StaticQuoteSource;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::state::create_test_state;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn universe_state() -> Arc<AppState> {
        let quotes = StaticQuoteSource::new()
            .with_closes("AAPL", &[90.0, 95.0, 100.0])
            .with_closes("MSFT", &[100.0, 60.0, 50.0]);
        Arc::new(create_test_state(Arc::new(quotes)))
    }

    #[tokio::test]
    async fn test_highs_lows_and_stats_share_snapshot() {
        let state = universe_state();

        let (status, highs) =
            get_json(week52_router().with_state(state.clone()), "/highs?limit=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(highs["total"], 1);
        assert_eq!(highs["stocks"][0]["symbol"], "AAPL");
        assert_eq!(highs["is_fallback"], false);

        let (_, lows) = get_json(week52_router().with_state(state.clone()), "/lows").await;
        assert_eq!(lows["stocks"][0]["symbol"], "MSFT");

        let (_, stats) = get_json(week52_router().with_state(state.clone()), "/stats").await;
        assert_eq!(stats["highs_count"], 1);
        assert_eq!(stats["lows_count"], 1);
        assert_eq!(stats["total_scanned"], 2);
        assert_eq!(stats["market_breadth"], "neutral");
    }

    #[tokio::test]
    async fn test_limit_out_of_range_is_rejected() {
        let state = universe_state();

        for uri in ["/highs?limit=0", "/lows?limit=101"] {
            let (status, body) = get_json(week52_router().with_state(state.clone()), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_empty_universe_when_upstream_down() {
        let state = Arc::new(create_test_state(Arc::new(StaticQuoteSource::new())));

        let (status, body) = get_json(week52_router().with_state(state), "/highs").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["is_fallback"], true);
    }
}
