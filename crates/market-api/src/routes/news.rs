//! 뉴스 endpoint.
//!
//! - `GET /api/news?page&page_size&source` - 최근 뉴스
//! - `GET /api/news/sources` - 언론사별 기사 수
//! - `GET /api/news/search?q=&limit=` - 제목 검색
//! - `GET /api/news/summary` - 전체/최근 24시간 기사 수

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use market_data::storage::{page_offset, NewsSummary};

use crate::error::{validation_error, ApiResult, SourceError};
use crate::routes::response::store_query;
use crate::state::AppState;

const STORE: &str = "news";

/// 뉴스 목록 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct NewsListQuery {
    #[validate(range(min = 1, message = "page는 1 이상이어야 합니다"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "page_size는 1-100 사이여야 합니다"))]
    pub page_size: Option<u32>,
    pub source: Option<String>,
}

/// 검색 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 100, message = "검색어는 1-100자여야 합니다"))]
    pub q: String,
    #[validate(range(min = 1, max = 100, message = "limit은 1-100 사이여야 합니다"))]
    pub limit: Option<u32>,
}

/// 최근 뉴스.
pub async fn list_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsListQuery>,
) -> ApiResult<Json<Value>> {
    query.validate().map_err(validation_error)?;

    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(20);
    let empty = || json!({ "articles": [], "total": 0, "page": page, "page_size": page_size });

    let Some(store) = state.news.clone() else {
        return Ok(Json(empty()));
    };

    let source = query.source.clone();
    let key = format!(
        "news:list:{}:{}:{}",
        source.as_deref().unwrap_or(""),
        page,
        page_size
    );
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let source = source.as_deref();
            let articles = store
                .recent_news(source, i64::from(page_size), page_offset(page, page_size))
                .await?;
            let total = store.count_news(source).await?;
            Ok::<_, SourceError>(json!({
                "articles": articles,
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

/// 언론사 목록.
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<Value> {
    let empty = || json!({ "sources": [], "total": 0 });
    let Some(store) = state.news.clone() else {
        return Json(empty());
    };

    let body = store_query(
        &state,
        STORE,
        "news:sources",
        || async move {
            let sources = store.sources().await?;
            Ok::<_, SourceError>(json!({ "total": sources.len(), "sources": sources }))
        },
        empty,
    )
    .await;

    Json(body)
}

/// 제목 키워드 검색.
pub async fn search_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    query.validate().map_err(validation_error)?;

    let keyword = query.q.trim().to_string();
    let limit = query.limit.unwrap_or(30);
    let empty = {
        let keyword = keyword.clone();
        move || json!({ "articles": [], "total": 0, "keyword": keyword })
    };

    let Some(store) = state.news.clone() else {
        return Ok(Json(empty()));
    };

    let key = format!("news:search:{}:{}", keyword, limit);
    let body = store_query(
        &state,
        STORE,
        &key,
        || async move {
            let articles = store.search(&keyword, i64::from(limit)).await?;
            Ok::<_, SourceError>(json!({
                "total": articles.len(),
                "articles": articles,
                "keyword": keyword,
            }))
        },
        empty,
    )
    .await;

    Ok(Json(body))
}

/// 뉴스 요약 통계.
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<Value> {
    let empty = || json!(NewsSummary::default());
    let Some(store) = state.news.clone() else {
        return Json(empty());
    };

    let now = state.clock.now();
    let body = store_query(
        &state,
        STORE,
        "news:summary",
        || async move { store.summary(now).await.map_err(SourceError::from) },
        empty,
    )
    .await;

    Json(body)
}

pub fn news_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_news))
        .route("/sources", get(list_sources))
        .route("/search", get(search_news))
        .route("/summary", get(get_summary))
}
