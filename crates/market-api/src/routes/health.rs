//! 헬스 체크 endpoint.
//!
//! 데이터셋이 비어 있어도 기본값으로 응답할 수 있으므로 readiness는 항상 200이고,
//! 상태는 본문의 `status`로만 구분합니다.

use std::future::Future;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use market_data::{DatasetState, DatasetStatus, StoreError};

use crate::state::AppState;

/// 전체 서비스 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Healthy,
    /// 아직 한 번도 채워지지 않은 데이터셋이 있음
    WarmingUp,
    /// 설정된 저장소에 연결할 수 없음
    Degraded,
}

/// 상세 헬스 체크 응답.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub version: String,
    pub uptime_secs: i64,
    /// 현재 시간 (RFC 3339)
    pub timestamp: String,
    pub components: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub reports: ComponentStatus,
    pub news: ComponentStatus,
    pub datasets: Vec<DatasetStatus>,
}

/// 저장소 연결 상태.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ComponentStatus {
    Up,
    Down(String),
    NotConfigured,
}

impl ComponentStatus {
    fn is_down(&self) -> bool {
        matches!(self, Self::Down(_))
    }
}

async fn probe<F>(ping: Option<F>) -> ComponentStatus
where
    F: Future<Output = Result<(), StoreError>>,
{
    match ping {
        None => ComponentStatus::NotConfigured,
        Some(ping) => match ping.await {
            Ok(()) => ComponentStatus::Up,
            Err(e) => ComponentStatus::Down(e.to_string()),
        },
    }
}

/// GET /health (liveness)
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /health/ready (readiness)
pub async fn health_ready(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let reports = probe(state.reports.as_ref().map(|store| store.ping())).await;
    let news = probe(state.news.as_ref().map(|store| store.ping())).await;
    let datasets = state.datasets.statuses();

    let status = if reports.is_down() || news.is_down() {
        ServiceStatus::Degraded
    } else if datasets.iter().any(|d| d.state == DatasetState::Empty) {
        ServiceStatus::WarmingUp
    } else {
        ServiceStatus::Healthy
    };

    Json(HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            reports,
            news,
            datasets,
        },
    })
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
