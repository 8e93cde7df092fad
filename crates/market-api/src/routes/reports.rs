//! 증권사 리포트 endpoint.
//!
//! 리포트 DB(읽기 전용)를 조회합니다. 저장소가 없거나 조회에 실패하면 빈 결과를 반환합니다.
//!
//! - `GET /api/reports?page&page_size&category` - 리포트 목록
//! - `GET /api/reports/analysis?stock_code&report_id&limit` - 종목별 목표가/투자의견
//! - `GET /api/reports/top-recommendations?limit` - 상승 여력 상위 종목
//! - `GET /api/reports/houses` - 증권사 목록
//! - `GET /api/reports/analysts?house_id` - 애널리스트 목록
//! - `GET /api/reports/summary` - 요약 통계

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use market_data::storage::{page_offset, ReportSummary};

use crate::error::{validation_error, ApiResult, SourceError};
use crate::routes::response::store_query;
use crate::state::AppState;

const STORE: &str = "reports";

/// 리포트 목록 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct ReportListQuery {
    #[validate(range(min = 1, message = "page는 1 이상이어야 합니다"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "page_size는 1-100 사이여야 합니다"))]
    pub page_size: Option<u32>,
    pub category: Option<String>,
}

/// 분석 조회 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct AnalysisQuery {
    pub stock_code: Option<String>,
    pub report_id: Option<i64>,
    #[validate(range(min = 1, max = 200, message = "limit은 1-200 사이여야 합니다"))]
    pub limit: Option<u32>,
}

/// 상위 추천 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct TopQuery {
    #[validate(range(min = 1, max = 50, message = "limit은 1-50 사이여야 합니다"))]
    pub limit: Option<u32>,
}

/// 애널리스트 쿼리.
#[derive(Debug, Deserialize)]
pub struct AnalystQuery {
    pub house_id: Option<i64>,
}

/// 리포트 목록.
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<Json<Value>> {
    query.validate().map_err(validation_error)?;

    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(20);
    let empty = || json!({ "reports": [], "total": 0, "page": page, "page_size": page_size });

    let Some(store) = state.reports.clone() else {
        return Ok(Json(empty()));
    };

    let category = query.category.clone();
    let key = format!(
        "reports:list:{}:{}:{}",
        category.as_deref().unwrap_or(""),
        page,
        page_size
    );
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let category = category.as_deref();
            let reports = store
                .recent_reports(category, i64::from(page_size), page_offset(page, page_size))
                .await?;
            let total = store.count_reports(category).await?;
            Ok::<_, SourceError>(json!({
                "reports": reports,
                "total": total,
                "page": page,
                "page_size": page_size,
            }))
        },
        empty,
    )
    .await;

    Ok(Json(body))
}

/// 리포트 분석 (목표가, 투자의견, 상승 여력).
pub async fn list_analysis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalysisQuery>,
) -> ApiResult<Json<Value>> {
    query.validate().map_err(validation_error)?;

    let empty = || json!({ "analyses": [], "total": 0 });
    let Some(store) = state.reports.clone() else {
        return Ok(Json(empty()));
    };

    let limit = query.limit.unwrap_or(50);
    let stock_code = query.stock_code.clone();
    let report_id = query.report_id;
    let key = format!(
        "reports:analysis:{}:{}:{}",
        stock_code.as_deref().unwrap_or(""),
        report_id.map(|id| id.to_string()).unwrap_or_default(),
        limit
    );
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let analyses = store
                .report_analysis(report_id, stock_code.as_deref(), i64::from(limit))
                .await?;
            Ok::<_, SourceError>(json!({ "total": analyses.len(), "analyses": analyses }))
        },
        empty,
    )
    .await;

    Ok(Json(body))
}

/// 상승 여력 상위 종목.
pub async fn top_recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Json<Value>> {
    query.validate().map_err(validation_error)?;

    let empty = || json!({ "recommendations": [], "total": 0 });
    let Some(store) = state.reports.clone() else {
        return Ok(Json(empty()));
    };

    let limit = query.limit.unwrap_or(10);
    let key = format!("reports:top:{}", limit);
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let recommendations = store.top_recommendations(i64::from(limit)).await?;
            Ok::<_, SourceError>(json!({
                "total": recommendations.len(),
                "recommendations": recommendations,
            }))
        },
        empty,
    )
    .await;

    Ok(Json(body))
}

/// 증권사 목록.
pub async fn list_houses(State(state): State<Arc<AppState>>) -> Json<Value> {
    let empty = || json!({ "houses": [], "total": 0 });
    let Some(store) = state.reports.clone() else {
        return Json(empty());
    };

    let body = store_query(
        &state,
        STORE,
        "reports:houses",
        || async move {
            let houses = store.houses().await?;
            Ok::<_, SourceError>(json!({ "total": houses.len(), "houses": houses }))
        },
        empty,
    )
    .await;

    Json(body)
}

/// 애널리스트 목록.
pub async fn list_analysts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalystQuery>,
) -> Json<Value> {
    let empty = || json!({ "analysts": [], "total": 0 });
    let Some(store) = state.reports.clone() else {
        return Json(empty());
    };

    let house_id = query.house_id;
    let key = format!(
        "reports:analysts:{}",
        house_id.map(|id| id.to_string()).unwrap_or_default()
    );
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let analysts = store.analysts(house_id).await?;
            Ok::<_, SourceError>(json!({ "total": analysts.len(), "analysts": analysts }))
        },
        empty,
    )
    .await;

    Json(body)
}

/// 리포트 요약 통계.
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<Value> {
    let empty = || json!(ReportSummary::default());
    let Some(store) = state.reports.clone() else {
        return Json(empty());
    };

    let body = store_query(
        &state,
        STORE,
        "reports:summary",
        || async move { store.summary().await.map_err(SourceError::from) },
        empty,
    )
    .await;

    Json(body)
}

pub fn reports_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_reports))
        .route("/analysis", get(list_analysis))
        .route("/top-recommendations", get(top_recommendations))
        .route("/houses", get(list_houses))
        .route("/analysts", get(list_analysts))
        .route("/summary", get(get_summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use market_data::provider::StaticQuoteSource;
    use market_data::storage::ReportStore;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
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

    async fn report_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        for statement in [
            "CREATE TABLE sent_reports (id INTEGER PRIMARY KEY, date TEXT, category TEXT, title TEXT, pdf_url TEXT, sent INTEGER)",
            "CREATE TABLE houses (id INTEGER PRIMARY KEY, name TEXT, full_name TEXT)",
            "CREATE TABLE analysts (id INTEGER PRIMARY KEY, name TEXT, department TEXT, position TEXT, house_id INTEGER)",
            "CREATE TABLE report_analysis (id INTEGER PRIMARY KEY, report_id INTEGER, stock_code TEXT, stock_name TEXT, current_price REAL, target_price REAL, price_change REAL, recommendation TEXT, adjustment_type TEXT, profit_impact TEXT, analysis_date TEXT)",
            "INSERT INTO sent_reports VALUES (1, '2024-06-03', '기업', '삼성전자 목표가 상향', NULL, 1)",
            "INSERT INTO sent_reports VALUES (2, '2024-06-04', '산업', '반도체 업황 점검', NULL, 1)",
            "INSERT INTO sent_reports VALUES (3, '2024-06-05', '기업', 'SK하이닉스 실적 리뷰', NULL, 0)",
            "INSERT INTO houses VALUES (1, '미래', '미래에셋증권')",
            "INSERT INTO analysts VALUES (1, '김분석', '리서치센터', '연구원', 1)",
            "INSERT INTO report_analysis VALUES (1, 1, '005930', '삼성전자', 80000, 100000, 10000, '매수', '상향', NULL, '2024-06-03')",
            "INSERT INTO report_analysis VALUES (2, 3, '000660', 'SK하이닉스', 200000, 220000, 0, '매수', '유지', NULL, '2024-06-05')",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool
    }

    async fn report_state() -> Arc<AppState> {
        let store = ReportStore::new(report_pool().await);
        Arc::new(create_test_state(Arc::new(StaticQuoteSource::new())).with_reports(store))
    }

    #[tokio::test]
    async fn test_list_reports_paginates() {
        let state = report_state().await;

        let (status, body) = get_json(
            reports_router().with_state(state),
            "/?page=1&page_size=2&category=%EA%B8%B0%EC%97%85",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["page_size"], 2);
        assert_eq!(body["reports"][0]["id"], 3);
        assert_eq!(body["reports"][1]["id"], 1);
    }

    #[tokio::test]
    async fn test_top_recommendations_by_upside() {
        let state = report_state().await;

        let (_, body) = get_json(
            reports_router().with_state(state),
            "/top-recommendations?limit=1",
        )
        .await;

        assert_eq!(body["total"], 1);
        assert_eq!(body["recommendations"][0]["stock_code"], "005930");
        assert_eq!(body["recommendations"][0]["upside_percent"], 25.0);
    }

    #[tokio::test]
    async fn test_results_are_memoized() {
        let state = report_state().await;

        let (_, houses) = get_json(reports_router().with_state(state.clone()), "/houses").await;
        assert_eq!(houses["total"], 1);
        assert_eq!(
            state.responses.get("reports:houses"),
            Some(houses.clone())
        );

        let (_, analysts) =
            get_json(reports_router().with_state(state.clone()), "/analysts?house_id=1").await;
        assert_eq!(analysts["analysts"][0]["house_name"], "미래");
    }

    #[tokio::test]
    async fn test_missing_store_returns_empty() {
        let state = Arc::new(create_test_state(Arc::new(StaticQuoteSource::new())));

        let (status, body) = get_json(reports_router().with_state(state.clone()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["page"], 1);

        let (_, summary) = get_json(reports_router().with_state(state), "/summary").await;
        assert_eq!(summary["total_reports"], 0);
    }

    #[tokio::test]
    async fn test_query_error_returns_empty() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let state = Arc::new(
            create_test_state(Arc::new(StaticQuoteSource::new()))
                .with_reports(ReportStore::new(pool)),
        );

        let (status, body) = get_json(reports_router().with_state(state.clone()), "/houses").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "houses": [], "total": 0 }));
        assert!(state.responses.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_page_size_is_rejected() {
        let state = report_state().await;

        let (status, body) =
            get_json(reports_router().with_state(state), "/?page_size=500").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
