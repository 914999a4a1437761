use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use fedlens_storage::store::OrganizationRow;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 组织树节点
#[derive(Serialize, ToSchema)]
pub struct OrganizationResponse {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub abbreviation: Option<String>,
    /// 0=部，1=局，2=办公室
    pub level: i32,
    pub parent_id: Option<String>,
    pub depth: i32,
}

impl From<OrganizationRow> for OrganizationResponse {
    fn from(r: OrganizationRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            short_name: r.short_name,
            abbreviation: r.abbreviation,
            level: r.level,
            parent_id: r.parent_id,
            depth: r.depth,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrganizationsParams {
    /// 父节点 ID；缺省时返回根节点（各部）
    #[param(required = false)]
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// 组织树一层：根节点或某节点的直接子节点。
/// 查询失败时降级为空列表。
#[utoipa::path(
    get,
    path = "/v1/organizations",
    tag = "Organizations",
    params(ListOrganizationsParams),
    responses(
        (status = 200, description = "组织节点列表", body = Vec<OrganizationResponse>)
    )
)]
async fn list_organizations(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListOrganizationsParams>,
) -> impl IntoResponse {
    match state
        .store
        .list_organization_children(params.parent_id.as_deref())
        .await
    {
        Ok(rows) => {
            let items: Vec<OrganizationResponse> =
                rows.into_iter().map(OrganizationResponse::from).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list organizations, degrading to empty list");
            success_response(StatusCode::OK, &trace_id, Vec::<OrganizationResponse>::new())
        }
    }
}

/// 按 ID 获取组织节点。
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}",
    tag = "Organizations",
    params(("id" = String, Path, description = "组织 ID")),
    responses(
        (status = 200, description = "组织节点", body = OrganizationResponse),
        (status = 404, description = "组织不存在", body = crate::api::ApiError)
    )
)]
async fn get_organization(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_organization_by_id(&id).await {
        Ok(Some(row)) => {
            success_response(StatusCode::OK, &trace_id, OrganizationResponse::from(row))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Organization not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get organization");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 祖先链（根在前，不含自身）。
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/ancestors",
    tag = "Organizations",
    params(("id" = String, Path, description = "组织 ID")),
    responses(
        (status = 200, description = "祖先节点列表", body = Vec<OrganizationResponse>),
        (status = 404, description = "组织不存在", body = crate::api::ApiError)
    )
)]
async fn list_ancestors(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_organization_by_id(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Organization not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get organization");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }
    match state.store.list_organization_ancestors(&id).await {
        Ok(rows) => {
            let items: Vec<OrganizationResponse> =
                rows.into_iter().map(OrganizationResponse::from).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list ancestors, degrading to empty list");
            success_response(StatusCode::OK, &trace_id, Vec::<OrganizationResponse>::new())
        }
    }
}

/// 全部后代（按路径排序，不含自身）。
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/descendants",
    tag = "Organizations",
    params(("id" = String, Path, description = "组织 ID")),
    responses(
        (status = 200, description = "后代节点列表", body = Vec<OrganizationResponse>),
        (status = 404, description = "组织不存在", body = crate::api::ApiError)
    )
)]
async fn list_descendants(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_organization_by_id(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Organization not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get organization");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }
    match state.store.list_organization_descendants(&id).await {
        Ok(rows) => {
            let items: Vec<OrganizationResponse> =
                rows.into_iter().map(OrganizationResponse::from).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list descendants, degrading to empty list");
            success_response(StatusCode::OK, &trace_id, Vec::<OrganizationResponse>::new())
        }
    }
}

pub fn organization_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_organizations))
        .routes(routes!(get_organization))
        .routes(routes!(list_ancestors))
        .routes(routes!(list_descendants))
}
