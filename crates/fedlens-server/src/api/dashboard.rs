use crate::api::success_response;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 仪表盘概览数据
#[derive(Serialize, ToSchema)]
struct DashboardOverview {
    /// 用例统计
    use_cases: UseCaseStats,
    /// 产品统计
    products: ProductStats,
    /// 事件统计
    incidents: IncidentStats,
    /// 机构采用度统计
    agencies: AgencyStats,
    /// 匹配表行数
    matches: MatchStats,
    /// 组织树节点数
    organizations: u64,
    /// 服务运行时长（秒）
    uptime_secs: i64,
}

#[derive(Serialize, ToSchema)]
struct UseCaseStats {
    total: u64,
    genai: u64,
    llm: u64,
    chatbot: u64,
    classic_ml: u64,
    distinct_agencies: u64,
    distinct_domains: u64,
}

#[derive(Serialize, ToSchema)]
struct ProductStats {
    #[schema(example = 460)]
    total: u64,
    #[schema(example = 120)]
    with_ai_features: u64,
    distinct_providers: u64,
    authorizations: u64,
}

#[derive(Serialize, ToSchema)]
struct IncidentStats {
    total: u64,
    with_security_enrichment: u64,
    data_leaks: u64,
    attacks: u64,
}

#[derive(Serialize, ToSchema)]
struct AgencyStats {
    total_profiles: u64,
    all_staff: u64,
    pilot_or_limited: u64,
    with_staff_chatbot: u64,
    total_tools: u64,
}

#[derive(Serialize, ToSchema)]
struct MatchStats {
    incident_product: u64,
    incident_use_case: u64,
    entity_product: u64,
    use_case_product: u64,
}

/// 获取仪表盘概览数据。
/// 单项聚合失败时该块降级为 0 并记录错误日志。
#[utoipa::path(
    get,
    path = "/v1/dashboard/overview",
    tag = "Dashboard",
    responses(
        (status = 200, description = "仪表盘概览", body = DashboardOverview)
    )
)]
async fn dashboard_overview(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let use_cases = match state.store.use_case_summary().await {
        Ok(s) => UseCaseStats {
            total: s.total,
            genai: s.genai,
            llm: s.llm,
            chatbot: s.chatbot,
            classic_ml: s.classic_ml,
            distinct_agencies: s.distinct_agencies,
            distinct_domains: s.distinct_domains,
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to get use case summary for dashboard");
            UseCaseStats {
                total: 0,
                genai: 0,
                llm: 0,
                chatbot: 0,
                classic_ml: 0,
                distinct_agencies: 0,
                distinct_domains: 0,
            }
        }
    };

    let products = match state.store.product_summary().await {
        Ok(s) => ProductStats {
            total: s.total,
            with_ai_features: s.with_ai_features,
            distinct_providers: s.distinct_providers,
            authorizations: s.authorizations,
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to get product summary for dashboard");
            ProductStats {
                total: 0,
                with_ai_features: 0,
                distinct_providers: 0,
                authorizations: 0,
            }
        }
    };

    let incidents = match state.store.incident_summary().await {
        Ok(s) => IncidentStats {
            total: s.total,
            with_security_enrichment: s.with_security_enrichment,
            data_leaks: s.data_leaks,
            attacks: s.attacks,
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to get incident summary for dashboard");
            IncidentStats {
                total: 0,
                with_security_enrichment: 0,
                data_leaks: 0,
                attacks: 0,
            }
        }
    };

    let agencies = match state.store.agency_summary().await {
        Ok(s) => AgencyStats {
            total_profiles: s.total_profiles,
            all_staff: s.all_staff,
            pilot_or_limited: s.pilot_or_limited,
            with_staff_chatbot: s.with_staff_chatbot,
            total_tools: s.total_tools,
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to get agency summary for dashboard");
            AgencyStats {
                total_profiles: 0,
                all_staff: 0,
                pilot_or_limited: 0,
                with_staff_chatbot: 0,
                total_tools: 0,
            }
        }
    };

    let matches = match state.store.match_summary().await {
        Ok(s) => MatchStats {
            incident_product: s.incident_product,
            incident_use_case: s.incident_use_case,
            entity_product: s.entity_product,
            use_case_product: s.use_case_product,
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to get match summary for dashboard");
            MatchStats {
                incident_product: 0,
                incident_use_case: 0,
                entity_product: 0,
                use_case_product: 0,
            }
        }
    };

    let organizations = match state.store.count_organizations().await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count organizations for dashboard");
            0
        }
    };

    let uptime = (chrono::Utc::now() - state.start_time).num_seconds();

    success_response(
        StatusCode::OK,
        &trace_id,
        DashboardOverview {
            use_cases,
            products,
            incidents,
            agencies,
            matches,
            organizations,
            uptime_secs: uptime,
        },
    )
}

pub fn dashboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(dashboard_overview))
}
