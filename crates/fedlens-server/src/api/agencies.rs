use crate::api::pagination::{deserialize_optional_u64, PageParams};
use crate::api::{error_response, success_empty_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fedlens_common::types::ToolType;
use fedlens_storage::store::{AgencyProfileFilter, AgencyProfileRow, AgencyToolInput, AgencyToolRow};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 机构概况列表查询参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAgenciesParams {
    /// 关键字（机构名 / 缩写 / 部级名称 多列模糊匹配）
    #[param(required = false)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// 部署状态精确匹配（all_staff / pilot_or_limited / no_public_internal_assistant）
    #[param(required = false)]
    #[serde(
        rename = "deployment_status__eq",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deployment_status_eq: Option<String>,
    #[param(required = false)]
    #[serde(
        rename = "has_staff_chatbot__eq",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_staff_chatbot: Option<bool>,
    #[param(required = false)]
    #[serde(
        rename = "has_coding_assistant__eq",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_coding_assistant: Option<bool>,
    #[param(required = false)]
    #[serde(
        rename = "has_document_automation__eq",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_document_automation: Option<bool>,
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

impl ListAgenciesParams {
    fn filter(&self) -> AgencyProfileFilter {
        AgencyProfileFilter {
            deployment_status_eq: self.deployment_status_eq.clone(),
            has_staff_chatbot: self.has_staff_chatbot,
            has_coding_assistant: self.has_coding_assistant,
            has_document_automation: self.has_document_automation,
            search: self.search.clone(),
        }
    }

    fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// 机构概况
#[derive(Serialize, ToSchema)]
pub struct AgencyProfileResponse {
    pub id: String,
    pub agency_name: String,
    pub abbreviation: Option<String>,
    pub slug: String,
    pub department_level_name: Option<String>,
    pub parent_abbreviation: Option<String>,
    pub organization_id: Option<String>,
    pub deployment_status: String,
    pub has_staff_chatbot: bool,
    pub has_coding_assistant: bool,
    pub has_document_automation: bool,
    pub tool_count: i32,
}

impl From<AgencyProfileRow> for AgencyProfileResponse {
    fn from(r: AgencyProfileRow) -> Self {
        Self {
            id: r.id,
            agency_name: r.agency_name,
            abbreviation: r.abbreviation,
            slug: r.slug,
            department_level_name: r.department_level_name,
            parent_abbreviation: r.parent_abbreviation,
            organization_id: r.organization_id,
            deployment_status: r.deployment_status,
            has_staff_chatbot: r.has_staff_chatbot,
            has_coding_assistant: r.has_coding_assistant,
            has_document_automation: r.has_document_automation,
            tool_count: r.tool_count,
        }
    }
}

/// 机构 AI 工具
#[derive(Serialize, ToSchema)]
pub struct AgencyToolResponse {
    pub id: String,
    pub product_name: String,
    pub product_type: String,
    pub slug: String,
    pub available_to_all_staff: Option<String>,
    pub is_pilot_or_limited: bool,
    pub internal_or_sensitive_data: Option<String>,
    pub citation_chicago: Option<String>,
    pub citation_accessed_date: Option<String>,
    pub citation_url: Option<String>,
}

impl From<AgencyToolRow> for AgencyToolResponse {
    fn from(r: AgencyToolRow) -> Self {
        Self {
            id: r.id,
            product_name: r.product_name,
            product_type: r.product_type,
            slug: r.slug,
            available_to_all_staff: r.available_to_all_staff,
            is_pilot_or_limited: r.is_pilot_or_limited,
            internal_or_sensitive_data: r.internal_or_sensitive_data,
            citation_chicago: r.citation_chicago,
            citation_accessed_date: r.citation_accessed_date,
            citation_url: r.citation_url,
        }
    }
}

/// 新增/编辑工具请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct ToolRequest {
    pub product_name: String,
    /// staff_chatbot / coding_assistant / document_automation / none_identified
    #[serde(default = "default_product_type")]
    pub product_type: String,
    #[serde(default)]
    pub available_to_all_staff: Option<String>,
    #[serde(default)]
    pub is_pilot_or_limited: bool,
    #[serde(default)]
    pub internal_or_sensitive_data: Option<String>,
    #[serde(default)]
    pub citation_chicago: Option<String>,
    #[serde(default)]
    pub citation_accessed_date: Option<String>,
    #[serde(default)]
    pub citation_url: Option<String>,
}

fn default_product_type() -> String {
    "none_identified".to_string()
}

impl ToolRequest {
    fn to_input(&self) -> AgencyToolInput {
        AgencyToolInput {
            product_name: self.product_name.clone(),
            product_type: ToolType::from_source_label(Some(&self.product_type)),
            available_to_all_staff: self.available_to_all_staff.clone(),
            is_pilot_or_limited: self.is_pilot_or_limited,
            internal_or_sensitive_data: self.internal_or_sensitive_data.clone(),
            citation_chicago: self.citation_chicago.clone(),
            citation_accessed_date: self.citation_accessed_date.clone(),
            citation_url: self.citation_url.clone(),
        }
    }
}

/// 分页查询机构 AI 采用概况。
/// 固定按机构名升序。查询失败时降级为空列表。
#[utoipa::path(
    get,
    path = "/v1/agencies",
    tag = "Agencies",
    params(ListAgenciesParams),
    responses(
        (status = 200, description = "机构概况分页列表", body = Vec<AgencyProfileResponse>)
    )
)]
async fn list_agencies(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListAgenciesParams>,
) -> impl IntoResponse {
    let filter = params.filter();
    let page_params = params.page_params();
    let (limit, offset) = page_params.resolve(&state.config.pagination);
    let page = page_params.page();
    let page_size = page_params.page_size(&state.config.pagination);

    let total = match state.store.count_agency_profiles(&filter).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count agency profiles, degrading to empty list");
            return success_paginated_response::<AgencyProfileResponse>(
                StatusCode::OK,
                &trace_id,
                vec![],
                0,
                page,
                page_size,
            );
        }
    };

    match state
        .store
        .list_agency_profiles(&filter, limit, offset)
        .await
    {
        Ok(rows) => {
            let items: Vec<AgencyProfileResponse> =
                rows.into_iter().map(AgencyProfileResponse::from).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, page, page_size)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list agency profiles, degrading to empty list");
            success_paginated_response::<AgencyProfileResponse>(
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

/// 按 slug 获取机构概况。
#[utoipa::path(
    get,
    path = "/v1/agencies/{slug}",
    tag = "Agencies",
    params(("slug" = String, Path, description = "机构 slug")),
    responses(
        (status = 200, description = "机构概况", body = AgencyProfileResponse),
        (status = 404, description = "机构不存在", body = crate::api::ApiError)
    )
)]
async fn get_agency(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match state.store.get_agency_profile_by_slug(&slug).await {
        Ok(Some(row)) => {
            success_response(StatusCode::OK, &trace_id, AgencyProfileResponse::from(row))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Agency not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get agency profile");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 机构的 AI 工具清单。
#[utoipa::path(
    get,
    path = "/v1/agencies/{slug}/tools",
    tag = "Agencies",
    params(("slug" = String, Path, description = "机构 slug")),
    responses(
        (status = 200, description = "工具列表", body = Vec<AgencyToolResponse>),
        (status = 404, description = "机构不存在", body = crate::api::ApiError)
    )
)]
async fn list_agency_tools(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let profile = match state.store.get_agency_profile_by_slug(&slug).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Agency not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get agency profile");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    match state.store.list_tools_for_profile(&profile.id).await {
        Ok(rows) => {
            let items: Vec<AgencyToolResponse> =
                rows.into_iter().map(AgencyToolResponse::from).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list tools, degrading to empty list");
            success_response(StatusCode::OK, &trace_id, Vec::<AgencyToolResponse>::new())
        }
    }
}

/// 新增工具。概况派生字段（标记/计数）在同一事务内重算。
#[utoipa::path(
    post,
    path = "/v1/agencies/{slug}/tools",
    tag = "Agencies",
    params(("slug" = String, Path, description = "机构 slug")),
    request_body = ToolRequest,
    responses(
        (status = 201, description = "工具已创建", body = AgencyToolResponse),
        (status = 400, description = "参数错误", body = crate::api::ApiError),
        (status = 404, description = "机构不存在", body = crate::api::ApiError)
    )
)]
async fn create_agency_tool(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<ToolRequest>,
) -> impl IntoResponse {
    if req.product_name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "product_name is required",
        );
    }
    let profile = match state.store.get_agency_profile_by_slug(&slug).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Agency not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get agency profile");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    match state
        .store
        .add_agency_tool(&profile.id, &profile.slug, &req.to_input())
        .await
    {
        Ok(tool) => success_response(
            StatusCode::CREATED,
            &trace_id,
            AgencyToolResponse::from(tool),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create tool");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 编辑工具。概况派生字段在同一事务内重算。
#[utoipa::path(
    put,
    path = "/v1/agencies/{slug}/tools/{tool_id}",
    tag = "Agencies",
    params(
        ("slug" = String, Path, description = "机构 slug"),
        ("tool_id" = String, Path, description = "工具 ID")
    ),
    request_body = ToolRequest,
    responses(
        (status = 200, description = "工具已更新", body = AgencyToolResponse),
        (status = 404, description = "机构或工具不存在", body = crate::api::ApiError)
    )
)]
async fn update_agency_tool(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path((slug, tool_id)): Path<(String, String)>,
    Json(req): Json<ToolRequest>,
) -> impl IntoResponse {
    match state.store.get_agency_profile_by_slug(&slug).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Agency not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get agency profile");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }

    match state.store.update_agency_tool(&tool_id, &req.to_input()).await {
        Ok(Some(tool)) => {
            success_response(StatusCode::OK, &trace_id, AgencyToolResponse::from(tool))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Tool not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update tool");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 删除工具。概况派生字段在同一事务内重算。
#[utoipa::path(
    delete,
    path = "/v1/agencies/{slug}/tools/{tool_id}",
    tag = "Agencies",
    params(
        ("slug" = String, Path, description = "机构 slug"),
        ("tool_id" = String, Path, description = "工具 ID")
    ),
    responses(
        (status = 200, description = "工具已删除"),
        (status = 404, description = "机构或工具不存在", body = crate::api::ApiError)
    )
)]
async fn delete_agency_tool(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path((slug, tool_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get_agency_profile_by_slug(&slug).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Agency not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get agency profile");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }

    match state.store.delete_agency_tool(&tool_id).await {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "Tool deleted"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Tool not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete tool");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn agency_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_agencies))
        .routes(routes!(get_agency))
        .routes(routes!(list_agency_tools, create_agency_tool))
        .routes(routes!(update_agency_tool, delete_agency_tool))
}
