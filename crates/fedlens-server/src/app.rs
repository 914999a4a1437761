use crate::state::AppState;
use crate::{api, logging};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "fedlens API",
        description = "联邦 AI 采用与 FedRAMP 数据报表 REST API",
    ),
    tags(
        (name = "System", description = "服务健康检查"),
        (name = "UseCases", description = "联邦 AI 用例清单"),
        (name = "Products", description = "FedRAMP 云产品与授权"),
        (name = "Agencies", description = "机构 AI 采用概况与工具"),
        (name = "Incidents", description = "AI 事件与安全增强"),
        (name = "Entities", description = "事件参与实体"),
        (name = "Organizations", description = "联邦组织树"),
        (name = "Dashboard", description = "仪表盘概览")
    )
)]
struct ApiDoc;

pub fn build_http_app(state: AppState) -> Router {
    let (router, spec) = api::public_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(spec);

    let cors = if state.config.cors_allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    router
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/v1/openapi.json", merged_spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
