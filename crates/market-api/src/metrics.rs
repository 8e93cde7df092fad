//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 데이터셋/저장소 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.
//! 데이터셋 갱신 결과(`dataset_refresh_total`)는 `market-data`에서 기록합니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # Errors
///
/// 레코더가 이미 설치되어 있으면 실패합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        // HTTP 요청 지속 시간 히스토그램 버킷 설정
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 데이터셋/저장소 메트릭 헬퍼 함수
// ============================================================================

/// 데이터셋 응답 카운터 증가 (기본값 응답 여부 라벨).
pub fn record_dataset_response(dataset: &str, is_fallback: bool) {
    counter!(
        "dataset_responses_total",
        "dataset" => dataset.to_string(),
        "fallback" => is_fallback.to_string()
    )
    .increment(1);
}

/// 저장소 조회 실패 카운터 증가.
pub fn record_store_error(store: &str) {
    counter!("store_query_errors_total", "store" => store.to_string()).increment(1);
}

/// 실행 중인 백그라운드 갱신 작업 수 설정.
pub fn set_background_tasks(count: usize) {
    gauge!("dataset_background_tasks").set(count as f64);
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로에서 동적 파라미터를 정규화합니다.
///
/// 숫자 세그먼트는 `:id`로, 관리 API의 데이터셋 이름은 `:dataset`으로 바꿉니다.
/// 예: `/api/admin/cache/macro_data/refresh` → `/api/admin/cache/:dataset/refresh`
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let normalized: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
            let is_dataset = i == 4 && path.starts_with("/api/admin/cache/");

            if is_numeric {
                ":id".to_string()
            } else if is_dataset {
                ":dataset".to_string()
            } else {
                (*segment).to_string()
            }
        })
        .collect();
    normalized.join("/")
}
