use crate::api::incidents::IncidentResponse;
use crate::api::pagination::{deserialize_optional_u64, PageParams};
use crate::api::{error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use fedlens_storage::store::{EntityFilter, EntityRow};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 实体列表查询参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEntitiesParams {
    /// 名称模糊匹配
    #[param(required = false)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// 页码（1 起，默认 1）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// 每页条数（默认 25；达到哨兵值 9999 表示返回全部）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
}

/// 实体（规范化的组织/个人名称）
#[derive(Serialize, ToSchema)]
pub struct EntityResponse {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
}

impl From<EntityRow> for EntityResponse {
    fn from(r: EntityRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            normalized_name: r.normalized_name,
        }
    }
}

/// 分页查询实体列表。查询失败时降级为空列表。
#[utoipa::path(
    get,
    path = "/v1/entities",
    tag = "Entities",
    params(ListEntitiesParams),
    responses(
        (status = 200, description = "实体分页列表", body = Vec<EntityResponse>)
    )
)]
async fn list_entities(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListEntitiesParams>,
) -> impl IntoResponse {
    let filter = EntityFilter {
        search: params.search.clone(),
    };
    let page_params = PageParams {
        page: params.page,
        page_size: params.page_size,
    };
    let (limit, offset) = page_params.resolve(&state.config.pagination);
    let page = page_params.page();
    let page_size = page_params.page_size(&state.config.pagination);

    let total = match state.store.count_entities(&filter).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count entities, degrading to empty list");
            return success_paginated_response::<EntityResponse>(
                StatusCode::OK,
                &trace_id,
                vec![],
                0,
                page,
                page_size,
            );
        }
    };

    match state.store.list_entities(&filter, limit, offset).await {
        Ok(rows) => {
            let items: Vec<EntityResponse> = rows.into_iter().map(EntityResponse::from).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, page, page_size)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list entities, degrading to empty list");
            success_paginated_response::<EntityResponse>(
                StatusCode::OK,
                &trace_id,
                vec![],
                0,
                page,
                page_size,
            )
        }
    }
}

/// 实体参与过的事件（按发生时间倒序）。
#[utoipa::path(
    get,
    path = "/v1/entities/{id}/incidents",
    tag = "Entities",
    params(("id" = String, Path, description = "实体 ID")),
    responses(
        (status = 200, description = "事件列表", body = Vec<IncidentResponse>),
        (status = 404, description = "实体不存在", body = crate::api::ApiError)
    )
)]
async fn list_entity_incidents(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_entity_by_id(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Entity not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get entity");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }

    match state.store.list_incidents_for_entity(&id).await {
        Ok(rows) => {
            let items: Vec<IncidentResponse> =
                rows.into_iter().map(IncidentResponse::from).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list entity incidents, degrading to empty list");
            success_response(StatusCode::OK, &trace_id, Vec::<IncidentResponse>::new())
        }
    }
}

pub fn entity_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_entities))
        .routes(routes!(list_entity_incidents))
}
