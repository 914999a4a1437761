use crate::api::pagination::{deserialize_optional_u64, PageParams};
use crate::api::{error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use fedlens_match::hybrid::rank_related;
use fedlens_storage::store::{
    MatchRow, SortDirection, UseCaseDetailRow, UseCaseFilter, UseCaseRow, UseCaseSort,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 用例列表查询参数。全部状态都在 URL 查询串里，可收藏/分享。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUseCasesParams {
    /// 关键字（用例名 / 机构 / 用途 / 输出 多列模糊匹配）
    #[param(required = false)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// 机构精确匹配
    #[param(required = false)]
    #[serde(rename = "agency__eq", default, skip_serializing_if = "Option::is_none")]
    pub agency_eq: Option<String>,
    /// 内设局精确匹配
    #[param(required = false)]
    #[serde(rename = "bureau__eq", default, skip_serializing_if = "Option::is_none")]
    pub bureau_eq: Option<String>,
    /// 领域分类精确匹配
    #[param(required = false)]
    #[serde(rename = "domain__eq", default, skip_serializing_if = "Option::is_none")]
    pub domain_eq: Option<String>,
    /// 生命周期阶段精确匹配
    #[param(required = false)]
    #[serde(rename = "stage__eq", default, skip_serializing_if = "Option::is_none")]
    pub stage_eq: Option<String>,
    /// 能力标记过滤（true/false）
    #[param(required = false)]
    #[serde(rename = "has_llm__eq", default, skip_serializing_if = "Option::is_none")]
    pub has_llm: Option<bool>,
    #[param(required = false)]
    #[serde(rename = "has_genai__eq", default, skip_serializing_if = "Option::is_none")]
    pub has_genai: Option<bool>,
    #[param(required = false)]
    #[serde(rename = "has_chatbot__eq", default, skip_serializing_if = "Option::is_none")]
    pub has_chatbot: Option<bool>,
    #[param(required = false)]
    #[serde(
        rename = "has_coding_assistant__eq",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_coding_assistant: Option<bool>,
    #[param(required = false)]
    #[serde(
        rename = "has_coding_agent__eq",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_coding_agent: Option<bool>,
    #[param(required = false)]
    #[serde(
        rename = "has_classic_ml__eq",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_classic_ml: Option<bool>,
    #[param(required = false)]
    #[serde(rename = "has_rpa__eq", default, skip_serializing_if = "Option::is_none")]
    pub has_rpa: Option<bool>,
    #[param(required = false)]
    #[serde(rename = "has_rules__eq", default, skip_serializing_if = "Option::is_none")]
    pub has_rules: Option<bool>,
    /// 排序字段（name / agency / stage / date_implemented / created_at，默认 name）
    #[param(required = false, value_type = Option<String>)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<UseCaseSort>,
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

impl ListUseCasesParams {
    pub fn filter(&self) -> UseCaseFilter {
        UseCaseFilter {
            agency_eq: self.agency_eq.clone(),
            bureau_eq: self.bureau_eq.clone(),
            domain_eq: self.domain_eq.clone(),
            stage_eq: self.stage_eq.clone(),
            search: self.search.clone(),
            has_llm: self.has_llm,
            has_genai: self.has_genai,
            has_chatbot: self.has_chatbot,
            has_coding_assistant: self.has_coding_assistant,
            has_coding_agent: self.has_coding_agent,
            has_classic_ml: self.has_classic_ml,
            has_rpa: self.has_rpa,
            has_rules: self.has_rules,
        }
    }

    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// 用例列表项
#[derive(Serialize, ToSchema)]
pub struct UseCaseResponse {
    pub id: String,
    pub use_case_name: String,
    pub agency: String,
    pub agency_abbreviation: Option<String>,
    pub bureau: Option<String>,
    pub topic_area: Option<String>,
    pub stage_of_development: Option<String>,
    pub domain_category: Option<String>,
    pub has_llm: bool,
    pub has_genai: bool,
    pub has_chatbot: bool,
    pub has_coding_assistant: bool,
    pub has_coding_agent: bool,
    pub has_classic_ml: bool,
    pub has_rpa: bool,
    pub has_rules: bool,
    pub providers_detected: Vec<String>,
    pub slug: String,
}

impl From<UseCaseRow> for UseCaseResponse {
    fn from(r: UseCaseRow) -> Self {
        Self {
            id: r.id,
            use_case_name: r.use_case_name,
            agency: r.agency,
            agency_abbreviation: r.agency_abbreviation,
            bureau: r.bureau,
            topic_area: r.topic_area,
            stage_of_development: r.stage_of_development,
            domain_category: r.domain_category,
            has_llm: r.has_llm,
            has_genai: r.has_genai,
            has_chatbot: r.has_chatbot,
            has_coding_assistant: r.has_coding_assistant,
            has_coding_agent: r.has_coding_agent,
            has_classic_ml: r.has_classic_ml,
            has_rpa: r.has_rpa,
            has_rules: r.has_rules,
            providers_detected: r.providers_detected,
            slug: r.slug,
        }
    }
}

/// 用例详情（含扩展调查信息）
#[derive(Serialize, ToSchema)]
pub struct UseCaseDetailResponse {
    pub use_case: UseCaseRowSchema,
    #[schema(value_type = Object)]
    pub detail: Option<UseCaseDetailRow>,
}

/// 完整用例行（详情页用）
#[derive(Serialize, ToSchema)]
pub struct UseCaseRowSchema {
    pub id: String,
    pub use_case_name: String,
    pub agency: String,
    pub agency_abbreviation: Option<String>,
    pub bureau: Option<String>,
    pub topic_area: Option<String>,
    pub intended_purpose: Option<String>,
    pub outputs: Option<String>,
    pub stage_of_development: Option<String>,
    pub rights_safety_impacting: Option<String>,
    pub domain_category: Option<String>,
    pub date_initiated: Option<String>,
    pub date_implemented: Option<String>,
    pub date_retired: Option<String>,
    pub has_llm: bool,
    pub has_genai: bool,
    pub has_chatbot: bool,
    pub has_coding_assistant: bool,
    pub has_coding_agent: bool,
    pub has_classic_ml: bool,
    pub has_rpa: bool,
    pub has_rules: bool,
    pub providers_detected: Vec<String>,
    pub commercial_product: Option<String>,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UseCaseRow> for UseCaseRowSchema {
    fn from(r: UseCaseRow) -> Self {
        Self {
            id: r.id,
            use_case_name: r.use_case_name,
            agency: r.agency,
            agency_abbreviation: r.agency_abbreviation,
            bureau: r.bureau,
            topic_area: r.topic_area,
            intended_purpose: r.intended_purpose,
            outputs: r.outputs,
            stage_of_development: r.stage_of_development,
            rights_safety_impacting: r.rights_safety_impacting,
            domain_category: r.domain_category,
            date_initiated: r.date_initiated,
            date_implemented: r.date_implemented,
            date_retired: r.date_retired,
            has_llm: r.has_llm,
            has_genai: r.has_genai,
            has_chatbot: r.has_chatbot,
            has_coding_assistant: r.has_coding_assistant,
            has_coding_agent: r.has_coding_agent,
            has_classic_ml: r.has_classic_ml,
            has_rpa: r.has_rpa,
            has_rules: r.has_rules,
            providers_detected: r.providers_detected,
            commercial_product: r.commercial_product,
            slug: r.slug,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// 关联记录响应项（混排打分后的产品/事件）
#[derive(Serialize, ToSchema)]
pub struct RelatedMatchResponse {
    pub target_id: String,
    pub score: f32,
    /// 匹配来源（vector / text / hybrid）
    pub source: String,
    pub confidence: Option<String>,
    pub reason: Option<String>,
    /// 目标记录的显示名
    pub display_name: Option<String>,
    /// 目标记录的跳转键（产品为 fedramp_id，事件/用例为 id 或 slug）
    pub link_key: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RelatedParams {
    /// 返回条数上限（默认 10）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
}

pub(crate) fn ranked_from_rows(
    rows: &[MatchRow],
    config: &fedlens_match::alias::MatchConfig,
    limit: usize,
) -> Vec<fedlens_match::hybrid::RankedMatch> {
    let (vector_hits, text_hits) = MatchRow::split_hits(rows);
    rank_related(vector_hits, text_hits, config, limit)
}

/// 分页查询用例列表。
/// 默认排序：`name` 升序；默认分页：`page=1&page_size=25`。
/// 查询失败时降级为空列表（记录错误日志）。
#[utoipa::path(
    get,
    path = "/v1/use-cases",
    tag = "UseCases",
    params(ListUseCasesParams),
    responses(
        (status = 200, description = "用例分页列表", body = Vec<UseCaseResponse>)
    )
)]
async fn list_use_cases(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListUseCasesParams>,
) -> impl IntoResponse {
    let filter = params.filter();
    let sort = params.sort.unwrap_or_default();
    let order = params.order.unwrap_or_default();
    let page_params = params.page_params();
    let (limit, offset) = page_params.resolve(&state.config.pagination);
    let page = page_params.page();
    let page_size = page_params.page_size(&state.config.pagination);

    let total = match state.store.count_use_cases(&filter).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count use cases, degrading to empty list");
            return success_paginated_response::<UseCaseResponse>(
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
        .list_use_cases(&filter, sort, order, limit, offset)
        .await
    {
        Ok(rows) => {
            let items: Vec<UseCaseResponse> =
                rows.into_iter().map(UseCaseResponse::from).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, page, page_size)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list use cases, degrading to empty list");
            success_paginated_response::<UseCaseResponse>(
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

/// 按 slug 获取单个用例（含扩展信息）。
#[utoipa::path(
    get,
    path = "/v1/use-cases/{slug}",
    tag = "UseCases",
    params(("slug" = String, Path, description = "用例 slug")),
    responses(
        (status = 200, description = "用例详情", body = UseCaseDetailResponse),
        (status = 404, description = "用例不存在", body = crate::api::ApiError)
    )
)]
async fn get_use_case(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match state.store.get_use_case_by_slug(&slug).await {
        Ok(Some(row)) => {
            let detail = match state.store.get_use_case_detail(&row.id).await {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, slug = %slug, "Failed to load use case detail");
                    None
                }
            };
            success_response(
                StatusCode::OK,
                &trace_id,
                UseCaseDetailResponse {
                    use_case: row.into(),
                    detail,
                },
            )
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Use case not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get use case");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 与用例关联的 FedRAMP 产品（向量 + 文本混排）。
#[utoipa::path(
    get,
    path = "/v1/use-cases/{slug}/related-products",
    tag = "UseCases",
    params(
        ("slug" = String, Path, description = "用例 slug"),
        RelatedParams
    ),
    responses(
        (status = 200, description = "关联产品列表", body = Vec<RelatedMatchResponse>),
        (status = 404, description = "用例不存在", body = crate::api::ApiError)
    )
)]
async fn related_products(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<RelatedParams>,
) -> impl IntoResponse {
    let use_case = match state.store.get_use_case_by_slug(&slug).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Use case not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get use case");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    let limit = params.limit.unwrap_or(10) as usize;
    let rows = match state
        .store
        .list_use_case_product_matches_for_use_case(&use_case.id)
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

/// 与用例关联的 AI 事件（向量 + 文本混排）。
#[utoipa::path(
    get,
    path = "/v1/use-cases/{slug}/related-incidents",
    tag = "UseCases",
    params(
        ("slug" = String, Path, description = "用例 slug"),
        RelatedParams
    ),
    responses(
        (status = 200, description = "关联事件列表", body = Vec<RelatedMatchResponse>),
        (status = 404, description = "用例不存在", body = crate::api::ApiError)
    )
)]
async fn related_incidents(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<RelatedParams>,
) -> impl IntoResponse {
    let use_case = match state.store.get_use_case_by_slug(&slug).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Use case not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get use case");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    let limit = params.limit.unwrap_or(10) as usize;
    let rows = match state
        .store
        .list_incident_use_case_matches_for_use_case(&use_case.id)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load incident matches, degrading to empty list");
            vec![]
        }
    };
    let ranked = ranked_from_rows(&rows, &state.match_config, limit);

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

pub fn use_case_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_use_cases))
        .routes(routes!(get_use_case))
        .routes(routes!(related_products))
        .routes(routes!(related_incidents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_sort_page_state_survives_url_round_trip() {
        let params = ListUseCasesParams {
            search: Some("fraud detection".to_string()),
            agency_eq: Some("Department of Energy".to_string()),
            stage_eq: Some("Operation and Maintenance".to_string()),
            has_llm: Some(true),
            has_chatbot: Some(false),
            sort: Some(UseCaseSort::Agency),
            order: Some(SortDirection::Desc),
            page: Some(3),
            page_size: Some(50),
            ..Default::default()
        };
        let encoded = serde_urlencoded::to_string(&params).unwrap();
        let reparsed: ListUseCasesParams = serde_urlencoded::from_str(&encoded).unwrap();
        assert_eq!(reparsed, params);
    }

    #[test]
    fn empty_state_round_trips_to_defaults() {
        let params = ListUseCasesParams::default();
        let encoded = serde_urlencoded::to_string(&params).unwrap();
        assert!(encoded.is_empty());
        let reparsed: ListUseCasesParams = serde_urlencoded::from_str(&encoded).unwrap();
        assert_eq!(reparsed, params);
    }
}
