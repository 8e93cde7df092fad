//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/market` - 주요 지수
//! - `/api/sectors` - 섹터 성과/추이
//! - `/api/52week` - 52주 신고가/신저가
//! - `/api/macro` - 거시경제 지표
//! - `/api/reports` - 증권사 리포트
//! - `/api/news` - 뉴스
//! - `/api/stocks` - 종목별 리포트 집계
//! - `/api/admin/cache` - 캐시 관리

pub mod admin;
pub mod health;
pub mod macro_indicators;
pub mod market;
pub mod news;
pub mod reports;
pub mod response;
pub mod sectors;
pub mod stocks;
pub mod week52;

pub use admin::{admin_router, CacheOverview};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse, ServiceStatus};
pub use macro_indicators::{macro_router, FearGreedBody, IndicatorGroup};
pub use market::market_router;
pub use news::news_router;
pub use reports::reports_router;
pub use response::DatasetResponse;
pub use sectors::sectors_router;
pub use stocks::stocks_router;
pub use week52::{week52_router, StockList};

use axum::{http::StatusCode, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/market", market_router())
        .nest("/api/sectors", sectors_router())
        .nest("/api/52week", week52_router())
        .nest("/api/macro", macro_router())
        .nest("/api/reports", reports_router())
        .nest("/api/news", news_router())
        .nest("/api/stocks", stocks_router())
        .nest("/api/admin/cache", admin_router())
        // 목록 endpoint의 끝 슬래시 형태
        .route("/api/reports/", get(reports::list_reports))
        .route("/api/news/", get(news::list_news))
        .route("/api/stocks/", get(stocks::list_stocks))
}

/// 상태와 요청 제한 시간이 적용된 API 라우터.
///
/// `server.request_timeout_secs`를 넘긴 요청은 408로 끝납니다.
/// 빈 데이터셋의 동기 갱신은 설정 검증에서 이보다 짧게 묶여 있으므로 기본값 응답이 먼저 나갑니다.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    create_api_router()
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
}
