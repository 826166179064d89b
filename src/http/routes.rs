//! REST handlers for the query surface (§6): containers, per-container
//! events, the global event feed, and the global alert feed. Each list
//! endpoint returns the exact `Page<T>` shape the store hands back.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::http::error::{ApiError, ApiResult};
use crate::http::AppState;
use crate::types::{Alert, Container, Event, Page};

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    before_id: Option<i64>,
    limit: Option<i64>,
}

impl PageQuery {
    fn before_id(&self) -> i64 {
        self.before_id.unwrap_or(0)
    }

    fn limit(&self) -> i64 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)
    }
}

pub async fn list_containers(State(state): State<AppState>) -> Json<Vec<Container>> {
    Json(state.store.list_present_containers())
}

pub async fn list_container_events(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Json<Page<Event>>> {
    if state.store.get_container(&name).is_none() {
        return Err(ApiError::not_found(format!("no container named {name}")));
    }
    let page = state.store.list_events(&name, q.before_id(), q.limit())?;
    Ok(Json(page))
}

pub async fn list_all_events(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Json<Page<Event>>> {
    let page = state.store.list_all_events(q.before_id(), q.limit())?;
    Ok(Json(page))
}

pub async fn list_all_alerts(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Json<Page<Alert>>> {
    let page = state.store.list_all_alerts(q.before_id(), q.limit())?;
    Ok(Json(page))
}
