//! 종목별 리포트 endpoint.
//!
//! 리포트 DB를 종목 코드 단위로 집계합니다. 저장소가 없거나 조회에 실패하면 빈 결과,
//! 저장소는 정상인데 리포트가 없는 종목이면 404입니다.
//!
//! - `GET /api/stocks?page&page_size&search` - 종목 목록
//! - `GET /api/stocks/{code}?page&page_size` - 종목 상세 + 리포트 히스토리
//! - `GET /api/stocks/{code}/target-price-history` - 목표가 추이
//! - `GET /api/stocks/{code}/recommendation-summary` - 투자의견 분포

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use market_data::storage::page_offset;

use crate::error::{not_found, validation_error, ApiResult, SourceError};
use crate::routes::response::store_query;
use crate::state::AppState;

const STORE: &str = "reports";

/// 종목 목록 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct StockListQuery {
    #[validate(range(min = 1, message = "page는 1 이상이어야 합니다"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "page_size는 1-100 사이여야 합니다"))]
    pub page_size: Option<u32>,
    #[validate(length(min = 1, max = 100, message = "search는 1-100자여야 합니다"))]
    pub search: Option<String>,
}

/// 종목 상세 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct StockDetailQuery {
    #[validate(range(min = 1, message = "page는 1 이상이어야 합니다"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "page_size는 1-100 사이여야 합니다"))]
    pub page_size: Option<u32>,
}

/// 종목 목록.
pub async fn list_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StockListQuery>,
) -> ApiResult<Json<Value>> {
    query.validate().map_err(validation_error)?;

    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(25);
    let empty = || json!({ "stocks": [], "total": 0, "page": page, "page_size": page_size });

    let Some(store) = state.reports.clone() else {
        return Ok(Json(empty()));
    };

    let search = query.search.clone();
    let key = format!(
        "stocks:list:{}:{}:{}",
        search.as_deref().unwrap_or(""),
        page,
        page_size
    );
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let search = search.as_deref();
            let stocks = store
                .stocks(search, i64::from(page_size), page_offset(page, page_size))
                .await?;
            let total = store.count_stocks(search).await?;
            Ok::<_, SourceError>(json!({
                "stocks": stocks,
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

/// 종목 상세.
pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<StockDetailQuery>,
) -> ApiResult<Json<Value>> {
    query.validate().map_err(validation_error)?;

    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(50);
    let empty = || json!({ "stock": null, "reports": [], "total_reports": 0 });

    let Some(store) = state.reports.clone() else {
        return Ok(Json(empty()));
    };

    let key = format!("stocks:detail:{}:{}:{}", code, page, page_size);
    let stock_code = code.clone();
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            store
                .stock_detail(&stock_code, i64::from(page_size), page_offset(page, page_size))
                .await
                .map_err(SourceError::from)
        },
        empty,
    )
    .await;

    // null은 리포트가 없는 종목
    if body.is_null() {
        return Err(not_found(
            "STOCK_NOT_FOUND",
            format!("종목을 찾을 수 없습니다: {}", code),
        ));
    }
    Ok(Json(body))
}

/// 목표가 추이.
pub async fn target_price_history(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Json<Value> {
    let empty = || json!({ "stock_code": code, "history": [], "total_points": 0 });
    let Some(store) = state.reports.clone() else {
        return Json(empty());
    };

    let key = format!("stocks:targets:{}", code);
    let stock_code = code.clone();
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let history = store.target_price_history(&stock_code).await?;
            Ok::<_, SourceError>(json!({
                "stock_code": stock_code,
                "total_points": history.len(),
                "history": history,
            }))
        },
        empty,
    )
    .await;

    Json(body)
}

/// 투자의견 분포.
pub async fn recommendation_summary(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Json<Value> {
    let empty = || json!({ "stock_code": code, "summary": [] });
    let Some(store) = state.reports.clone() else {
        return Json(empty());
    };

    let key = format!("stocks:recommendations:{}", code);
    let stock_code = code.clone();
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let summary = store.recommendation_summary(&stock_code).await?;
            Ok::<_, SourceError>(json!({ "stock_code": stock_code, "summary": summary }))
        },
        empty,
    )
    .await;

    Json(body)
}

pub fn stocks_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_stocks))
        .route("/{code}", get(get_stock))
        .route("/{code}/target-price-history", get(target_price_history))
        .route("/{code}/recommendation-summary", get(recommendation_summary))
}
