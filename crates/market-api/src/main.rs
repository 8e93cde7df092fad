//! 시장 데이터 대시보드 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 지수, 섹터, 52주, 거시지표 데이터셋과 리포트/뉴스 조회 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use market_api::metrics::setup_metrics_recorder;
use market_api::middleware::metrics_layer;
use market_api::routes::create_app_router;
use market_api::state::AppState;
use market_api::tasks::start_refresh_scheduler;
use market_core::{init_logging, AppConfig, LogConfig, ServerConfig};

/// CORS 미들웨어 구성.
///
/// 허용 origin 목록이 비어 있거나 유효한 항목이 없으면 모든 origin을 허용합니다.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .allowed_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        warn!("허용 origin이 설정되지 않아 모든 origin을 허용합니다 (개발 모드)");
        AllowOrigin::any()
    } else {
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        // preflight 요청 캐시 시간
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let server = state.config.server.clone();

    // 메트릭 라우터 (별도 상태)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        // API 라우트 (요청 타임아웃 포함, 408 반환)
        .merge(create_app_router(state))
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("설정을 불러올 수 없습니다")?;

    init_logging(LogConfig::from_settings(&config.logging)).context("로깅 초기화 실패")?;

    info!("Starting market API server...");

    // Prometheus 메트릭 레코더 설정
    let metrics_handle = setup_metrics_recorder().context("메트릭 레코더 설정 실패")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "소켓 주소 설정이 유효하지 않습니다: {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    let scheduler_interval = Duration::from_secs(config.cache.scheduler_interval_secs);

    // 전역 종료 토큰 (graceful shutdown용, 백그라운드 갱신에서 사용)
    let shutdown_token = CancellationToken::new();

    let state = Arc::new(
        AppState::build(config, shutdown_token.clone())
            .await
            .context("애플리케이션 상태 초기화 실패")?,
    );
    info!(version = %state.version, "Application state initialized");

    let scheduler = start_refresh_scheduler(
        state.clone(),
        scheduler_interval,
        shutdown_token.clone(),
    );

    let app = create_router(state.clone(), metrics_handle);

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");

    // 종료 토큰 취소 (스케줄러와 분리 갱신 작업에 종료 시그널 전파)
    shutdown_token.cancel();

    if let Err(e) = scheduler.await {
        warn!(error = %e, "갱신 스케줄러 비정상 종료");
    }
    if !state.supervisor.shutdown(grace).await {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
        _ = shutdown_token.cancelled() => {}
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
