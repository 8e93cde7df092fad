//! 주요 지수 endpoint.
//!
//! - `GET /api/market/overview` - S&P 500, NASDAQ, KOSPI, KOSDAQ, USD/KRW 현재가

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use market_data::datasets::{MarketOverview, MARKET};

use crate::routes::response::DatasetResponse;
use crate::state::AppState;

/// 주요 지수 개요.
///
/// 외부 소스가 모두 실패해도 정적 기본값으로 200을 반환합니다.
pub async fn get_market_overview(
    State(state): State<Arc<AppState>>,
) -> Json<DatasetResponse<MarketOverview>> {
    let view = state.market.get_or_refresh().await;
    Json(DatasetResponse::from_view(
        MARKET,
        &view,
        MarketOverview::clone(&view.data),
    ))
}

pub fn market_router() -> Router<Arc<AppState>> {
    Router::new().route("/overview", get(get_market_overview))
}
