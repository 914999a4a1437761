use crate::api::pagination::{deserialize_optional_u64, PageParams};
use crate::api::use_cases::{ranked_from_rows, RelatedMatchResponse, RelatedParams};
use crate::api::{error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use fedlens_storage::store::{
    IncidentFilter, IncidentRow, IncidentSecurityRow, IncidentSort, SortDirection,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 事件列表查询参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListIncidentsParams {
    /// 关键字（标题 / 描述 模糊匹配）
    #[param(required = false)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// 是否数据泄露事件（挂在安全增强记录上）
    #[param(required = false)]
    #[serde(
        rename = "is_data_leak__eq",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_data_leak: Option<bool>,
    /// 是否攻击事件
    #[param(required = false)]
    #[serde(rename = "is_attack__eq", default, skip_serializing_if = "Option::is_none")]
    pub is_attack: Option<bool>,
    /// 排序字段（title / occurred_on / created_at，默认 occurred_on）
    #[param(required = false, value_type = Option<String>)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<IncidentSort>,
    /// 排序方向（asc / desc，默认 desc）
    #[param(required = false, value_type = Option<String>)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortDirection>,
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

/// 事件列表项/详情
#[derive(Serialize, ToSchema)]
pub struct IncidentResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub occurred_on: Option<String>,
    pub deployers: Vec<String>,
    pub developers: Vec<String>,
    pub harmed_parties: Vec<String>,
    pub source_url: Option<String>,
}

impl From<IncidentRow> for IncidentResponse {
    fn from(r: IncidentRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            occurred_on: r.occurred_on,
            deployers: r.deployers,
            developers: r.developers,
            harmed_parties: r.harmed_parties,
            source_url: r.source_url,
        }
    }
}

/// 事件详情（含安全增强信息）
#[derive(Serialize, ToSchema)]
pub struct IncidentDetailResponse {
    pub incident: IncidentResponse,
    #[schema(value_type = Object)]
    pub security: Option<IncidentSecurityRow>,
}

/// 分页查询 AI 事件列表。
/// 默认排序：`occurred_on` 倒序。查询失败时降级为空列表。
#[utoipa::path(
    get,
    path = "/v1/incidents",
    tag = "Incidents",
    params(ListIncidentsParams),
    responses(
        (status = 200, description = "事件分页列表", body = Vec<IncidentResponse>)
    )
)]
async fn list_incidents(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListIncidentsParams>,
) -> impl IntoResponse {
    let filter = IncidentFilter {
        search: params.search.clone(),
        is_data_leak: params.is_data_leak,
        is_attack: params.is_attack,
    };
    let sort = params.sort.unwrap_or_default();
    // 事件列表默认最近的在前
    let order = params.order.unwrap_or(SortDirection::Desc);
    let page_params = PageParams {
        page: params.page,
        page_size: params.page_size,
    };
    let (limit, offset) = page_params.resolve(&state.config.pagination);
    let page = page_params.page();
    let page_size = page_params.page_size(&state.config.pagination);

    let total = match state.store.count_incidents(&filter).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count incidents, degrading to empty list");
            return success_paginated_response::<IncidentResponse>(
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
        .list_incidents(&filter, sort, order, limit, offset)
        .await
    {
        Ok(rows) => {
            let items: Vec<IncidentResponse> =
                rows.into_iter().map(IncidentResponse::from).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, page, page_size)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list incidents, degrading to empty list");
            success_paginated_response::<IncidentResponse>(
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

/// 按 ID 获取事件详情（含安全增强信息）。
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}",
    tag = "Incidents",
    params(("id" = String, Path, description = "事件 ID")),
    responses(
        (status = 200, description = "事件详情", body = IncidentDetailResponse),
        (status = 404, description = "事件不存在", body = crate::api::ApiError)
    )
)]
async fn get_incident(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_incident_by_id(&id).await {
        Ok(Some(row)) => {
            let security = match state.store.get_incident_security(&id).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load incident security enrichment");
                    None
                }
            };
            success_response(
                StatusCode::OK,
                &trace_id,
                IncidentDetailResponse {
                    incident: row.into(),
                    security,
                },
            )
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Incident not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get incident");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 与事件关联的 FedRAMP 产品（向量 + 文本混排）。
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}/related-products",
    tag = "Incidents",
    params(
        ("id" = String, Path, description = "事件 ID"),
        RelatedParams
    ),
    responses(
        (status = 200, description = "关联产品列表", body = Vec<RelatedMatchResponse>),
        (status = 404, description = "事件不存在", body = crate::api::ApiError)
    )
)]
async fn related_products(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RelatedParams>,
) -> impl IntoResponse {
    match state.store.get_incident_by_id(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Incident not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get incident");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }

    let limit = params.limit.unwrap_or(10) as usize;
    let rows = match state
        .store
        .list_incident_product_matches_for_incident(&id)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load product matches, degrading to empty list");
            vec![]
        }
    };
    let ranked = ranked_from_rows(&rows, &state.match_config, limit);

    let mut items = Vec::with_capacity(ranked.len());
    for m in ranked {
        let display_name = match state.store.get_product_by_fedramp_id(&m.target_id).await {
            Ok(Some(p)) => Some(format!("{} - {}", p.provider_name, p.offering_name)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, fedramp_id = %m.target_id, "Failed to resolve product");
                None
            }
        };
        items.push(RelatedMatchResponse {
            link_key: Some(m.target_id.clone()),
            target_id: m.target_id,
            score: m.score,
            source: m.source.as_str().to_string(),
            confidence: m.confidence.map(|c| c.as_str().to_string()),
            reason: m.reason,
            display_name,
        });
    }
    success_response(StatusCode::OK, &trace_id, items)
}

pub fn incident_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_incidents))
        .routes(routes!(get_incident))
        .routes(routes!(related_products))
}
