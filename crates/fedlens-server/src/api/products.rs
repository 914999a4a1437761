use crate::api::pagination::{deserialize_optional_u64, PageParams};
use crate::api::use_cases::{ranked_from_rows, RelatedMatchResponse, RelatedParams};
use crate::api::{error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use fedlens_storage::store::{
    AuthorizationRow, ProductFilter, ProductRow, ProductSort, ServiceAnalysisRow, SortDirection,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 产品列表查询参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProductsParams {
    /// 关键字（供应商 / 产品名 / FedRAMP ID 多列模糊匹配）
    #[param(required = false)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// 供应商精确匹配
    #[param(required = false)]
    #[serde(rename = "provider__eq", default, skip_serializing_if = "Option::is_none")]
    pub provider_eq: Option<String>,
    /// 授权状态精确匹配
    #[param(required = false)]
    #[serde(rename = "status__eq", default, skip_serializing_if = "Option::is_none")]
    pub status_eq: Option<String>,
    /// 是否具备 AI 能力（挂在分析记录上）
    #[param(required = false)]
    #[serde(rename = "has_ai__eq", default, skip_serializing_if = "Option::is_none")]
    pub has_ai: Option<bool>,
    /// 排序字段（offering / provider / status / authorization_date / created_at，默认 offering）
    #[param(required = false, value_type = Option<String>)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<ProductSort>,
    /// 排序方向（asc / desc，默认 asc）
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

impl ListProductsParams {
    fn filter(&self) -> ProductFilter {
        ProductFilter {
            provider_eq: self.provider_eq.clone(),
            status_eq: self.status_eq.clone(),
            has_ai: self.has_ai,
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

/// 产品列表项/详情
#[derive(Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: String,
    pub fedramp_id: String,
    pub provider_name: String,
    pub offering_name: String,
    pub service_model: Option<String>,
    pub status: String,
    pub authorization_date: Option<String>,
}

impl From<ProductRow> for ProductResponse {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            fedramp_id: r.fedramp_id,
            provider_name: r.provider_name,
            offering_name: r.offering_name,
            service_model: r.service_model,
            status: r.status,
            authorization_date: r.authorization_date,
        }
    }
}

/// 产品详情（含 AI 能力分析）
#[derive(Serialize, ToSchema)]
pub struct ProductDetailResponse {
    pub product: ProductResponse,
    #[schema(value_type = Object)]
    pub analysis: Option<ServiceAnalysisRow>,
}

/// 机构授权记录
#[derive(Serialize, ToSchema)]
pub struct AuthorizationResponse {
    pub id: String,
    pub organization_id: Option<String>,
    pub parent_agency_name: String,
    pub sub_agency_name: Option<String>,
    pub ato_issuance_date: Option<String>,
    pub ato_expiration_date: Option<String>,
}

impl From<AuthorizationRow> for AuthorizationResponse {
    fn from(r: AuthorizationRow) -> Self {
        Self {
            id: r.id,
            organization_id: r.organization_id,
            parent_agency_name: r.parent_agency_name,
            sub_agency_name: r.sub_agency_name,
            ato_issuance_date: r.ato_issuance_date,
            ato_expiration_date: r.ato_expiration_date,
        }
    }
}

/// 分页查询 FedRAMP 产品列表。
/// 默认排序：`offering` 升序。查询失败时降级为空列表。
#[utoipa::path(
    get,
    path = "/v1/products",
    tag = "Products",
    params(ListProductsParams),
    responses(
        (status = 200, description = "产品分页列表", body = Vec<ProductResponse>)
    )
)]
async fn list_products(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListProductsParams>,
) -> impl IntoResponse {
    let filter = params.filter();
    let sort = params.sort.unwrap_or_default();
    let order = params.order.unwrap_or_default();
    let page_params = params.page_params();
    let (limit, offset) = page_params.resolve(&state.config.pagination);
    let page = page_params.page();
    let page_size = page_params.page_size(&state.config.pagination);

    let total = match state.store.count_products(&filter).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count products, degrading to empty list");
            return success_paginated_response::<ProductResponse>(
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
        .list_products(&filter, sort, order, limit, offset)
        .await
    {
        Ok(rows) => {
            let items: Vec<ProductResponse> = rows.into_iter().map(ProductResponse::from).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, page, page_size)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list products, degrading to empty list");
            success_paginated_response::<ProductResponse>(
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

/// 按 FedRAMP ID 获取产品详情。
#[utoipa::path(
    get,
    path = "/v1/products/{fedramp_id}",
    tag = "Products",
    params(("fedramp_id" = String, Path, description = "FedRAMP 产品外部标识")),
    responses(
        (status = 200, description = "产品详情", body = ProductDetailResponse),
        (status = 404, description = "产品不存在", body = crate::api::ApiError)
    )
)]
async fn get_product(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(fedramp_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_product_by_fedramp_id(&fedramp_id).await {
        Ok(Some(row)) => {
            let analysis = match state.store.get_service_analysis(&fedramp_id).await {
                Ok(a) => a,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load service analysis");
                    None
                }
            };
            success_response(
                StatusCode::OK,
                &trace_id,
                ProductDetailResponse {
                    product: row.into(),
                    analysis,
                },
            )
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Product not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get product");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 产品的机构授权记录（每个授权机构一行）。
#[utoipa::path(
    get,
    path = "/v1/products/{fedramp_id}/authorizations",
    tag = "Products",
    params(("fedramp_id" = String, Path, description = "FedRAMP 产品外部标识")),
    responses(
        (status = 200, description = "授权记录列表", body = Vec<AuthorizationResponse>),
        (status = 404, description = "产品不存在", body = crate::api::ApiError)
    )
)]
async fn list_product_authorizations(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(fedramp_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_product_by_fedramp_id(&fedramp_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Product not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get product");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }

    match state
        .store
        .list_authorizations_for_product(&fedramp_id)
        .await
    {
        Ok(rows) => {
            let items: Vec<AuthorizationResponse> =
                rows.into_iter().map(AuthorizationResponse::from).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list authorizations, degrading to empty list");
            success_response(StatusCode::OK, &trace_id, Vec::<AuthorizationResponse>::new())
        }
    }
}

/// 与产品关联的 AI 事件（向量 + 文本混排）。
#[utoipa::path(
    get,
    path = "/v1/products/{fedramp_id}/related-incidents",
    tag = "Products",
    params(
        ("fedramp_id" = String, Path, description = "FedRAMP 产品外部标识"),
        RelatedParams
    ),
    responses(
        (status = 200, description = "关联事件列表", body = Vec<RelatedMatchResponse>),
        (status = 404, description = "产品不存在", body = crate::api::ApiError)
    )
)]
async fn related_incidents(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(fedramp_id): Path<String>,
    Query(params): Query<RelatedParams>,
) -> impl IntoResponse {
    match state.store.get_product_by_fedramp_id(&fedramp_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Product not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get product");
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
        .list_incident_product_matches_for_product(&fedramp_id)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load incident matches, degrading to empty list");
            vec![]
        }
    };
    // 这里的 source 是事件、target 是产品；反向取关联时把事件 id 当排名目标
    let flipped: Vec<_> = rows
        .into_iter()
        .map(|mut m| {
            std::mem::swap(&mut m.source_id, &mut m.target_id);
            m
        })
        .collect();
    let ranked = ranked_from_rows(&flipped, &state.match_config, limit);

    let mut items = Vec::with_capacity(ranked.len());
    for m in ranked {
        let display_name = match state.store.get_incident_by_id(&m.target_id).await {
            Ok(Some(i)) => Some(i.title),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, incident_id = %m.target_id, "Failed to resolve incident");
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

pub fn product_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_products))
        .routes(routes!(get_product))
        .routes(routes!(list_product_authorizations))
        .routes(routes!(related_incidents))
}
