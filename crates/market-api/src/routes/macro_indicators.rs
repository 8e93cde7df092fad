//! 거시경제 지표 endpoint.
//!
//! - `GET /api/macro/overview` - 전체 지표
//! - `GET /api/macro/fear-greed` - 공포탐욕지수
//! - `GET /api/macro/interest-rates` - 기준금리, 10년/단기 국채 수익률
//! - `GET /api/macro/exchange-rates` - USD/KRW, 달러 인덱스
//!
//! 모든 응답은 같은 스냅샷에서 조립되며 빠진 지표는 정적 기본값으로 채워집니다.

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use market_data::datasets::macro_indicators::{
    EXCHANGE_RATE_KEYS, FEAR_GREED, INTEREST_RATE_KEYS,
};
use market_data::datasets::{Indicator, MacroOverview, MACRO_DATA};

use crate::metrics::record_dataset_response;
use crate::routes::response::DatasetResponse;
use crate::state::AppState;

/// 공포탐욕지수 응답 본문.
#[derive(Debug, Clone, Serialize)]
pub struct FearGreedBody {
    pub value: f64,
    pub classification: String,
    pub source: String,
    /// 기본값(중립 50) 여부
    pub is_default: bool,
}

/// 지표 묶음 응답 본문.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct IndicatorGroup(pub BTreeMap<String, Indicator>);

async fn overview(state: &Arc<AppState>) -> MacroOverview {
    let view = state.macro_data.get_or_refresh().await;
    record_dataset_response(MACRO_DATA, view.is_fallback);
    MacroOverview::assemble(&view)
}

fn with_meta<T>(overview: &MacroOverview, data: T) -> DatasetResponse<T> {
    DatasetResponse {
        data,
        last_update: overview.last_update,
        next_update: overview.next_update.clone(),
        is_fallback: overview.is_fallback,
    }
}

/// 전체 거시지표.
pub async fn get_macro_overview(State(state): State<Arc<AppState>>) -> Json<MacroOverview> {
    Json(overview(&state).await)
}

/// 공포탐욕지수.
pub async fn get_fear_greed(
    State(state): State<Arc<AppState>>,
) -> Json<DatasetResponse<FearGreedBody>> {
    let overview = overview(&state).await;
    let body = match overview.indicator(FEAR_GREED) {
        Some(indicator) => FearGreedBody {
            value: indicator.value,
            classification: indicator
                .label
                .clone()
                .unwrap_or_else(|| "Neutral".to_string()),
            source: indicator.source.clone(),
            is_default: indicator.is_default,
        },
        None => FearGreedBody {
            value: 50.0,
            classification: "Neutral".to_string(),
            source: "default".to_string(),
            is_default: true,
        },
    };
    Json(with_meta(&overview, body))
}

/// 금리 지표.
pub async fn get_interest_rates(
    State(state): State<Arc<AppState>>,
) -> Json<DatasetResponse<IndicatorGroup>> {
    let overview = overview(&state).await;
    let rates = IndicatorGroup(overview.subset(&INTEREST_RATE_KEYS));
    Json(with_meta(&overview, rates))
}

/// 환율 지표.
pub async fn get_exchange_rates(
    State(state): State<Arc<AppState>>,
) -> Json<DatasetResponse<IndicatorGroup>> {
    let overview = overview(&state).await;
    let rates = IndicatorGroup(overview.subset(&EXCHANGE_RATE_KEYS));
    Json(with_meta(&overview, rates))
}

pub fn macro_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/overview", get(get_macro_overview))
        .route("/fear-greed", get(get_fear_greed))
        .route("/interest-rates", get(get_interest_rates))
        .route("/exchange-rates", get(get_exchange_rates))
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

    #[tokio::test]
    async fn test_overview_is_all_defaults_when_every_source_fails() {
        let state = Arc::new(create_test_state(Arc::new(StaticQuoteSource::new())));

        let (status, body) = get_json(macro_router().with_state(state), "/overview").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_fallback"], true);
        assert!(body["last_update"].is_null());
        assert_eq!(body["indicators"].as_object().unwrap().len(), 8);
        assert_eq!(body["indicators"]["vix"]["value"], 13.8);
        assert_eq!(body["indicators"]["vix"]["is_default"], true);
    }

    #[tokio::test]
    async fn test_partial_snapshot_fills_missing_indicators() {
        let quotes = StaticQuoteSource::new()
            .with_closes("^VIX", &[30.0])
            .with_closes("^TNX", &[4.1]);
        let state = Arc::new(create_test_state(Arc::new(quotes)));

        let (_, overview) =
            get_json(macro_router().with_state(state.clone()), "/overview").await;
        assert_eq!(overview["is_fallback"], false);
        assert!(overview["last_update"].is_string());
        assert_eq!(overview["indicators"]["vix"]["value"], 30.0);
        assert_eq!(overview["indicators"]["vix"]["is_default"], false);
        assert_eq!(overview["indicators"]["m2"]["is_default"], true);

        // VIX 30 기반 추정: 50 - (30 - 20) * 2.5 = 25
        let (_, fear_greed) =
            get_json(macro_router().with_state(state.clone()), "/fear-greed").await;
        assert_eq!(fear_greed["value"], 25.0);
        assert_eq!(fear_greed["classification"], "Extreme Fear");
        assert_eq!(fear_greed["is_default"], false);

        let (_, rates) =
            get_json(macro_router().with_state(state.clone()), "/interest-rates").await;
        assert_eq!(rates["treasury_10y"]["value"], 4.1);
        assert_eq!(rates["fed_funds_rate"]["value"], 5.5);
        assert_eq!(rates["fed_funds_rate"]["is_default"], true);
        assert!(rates.get("usd_krw").is_none());

        let (_, fx) = get_json(macro_router().with_state(state), "/exchange-rates").await;
        assert_eq!(fx["usd_krw"]["value"], 1308.5);
        assert_eq!(fx["dxy"]["change"], -0.15);
        assert_eq!(fx["is_fallback"], false);
    }
}
