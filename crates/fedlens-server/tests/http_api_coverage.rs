mod common;

use axum::http::StatusCode;
use common::{
    assert_err_envelope, assert_ok_envelope, build_test_context, request_json, request_no_body,
    sample_incident, sample_product, sample_use_case,
};
use fedlens_match::{Confidence, NameMatch};
use serde_json::json;

#[tokio::test]
async fn health_returns_ok_envelope_with_trace_id() {
    let ctx = build_test_context().await.expect("test context should build");
    let (status, body, trace) = request_no_body(&ctx.app, "GET", "/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert!(body["data"]["version"].is_string());
    assert!(trace.is_some());
}

#[tokio::test]
async fn use_case_list_filters_and_paginates() {
    let ctx = build_test_context().await.expect("test context should build");
    for i in 0..6 {
        let row = sample_use_case(&format!("Case {i}"), "GSA", "GSA", i % 2 == 0);
        ctx.state
            .store
            .insert_use_case(&row, None)
            .await
            .expect("insert should succeed");
    }

    // 能力标记过滤：恰好是打标子集
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/use-cases?has_llm__eq=true&page_size=9999").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 3);

    // 第 2 页、每页 2 条 = 排序集的第 2..3 行
    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/use-cases?sort=name&order=asc&page=2&page_size=2",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["use_case_name"], "Case 2");
    assert_eq!(items[1]["use_case_name"], "Case 3");
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["total"], 6);

    // 哨兵页大小一页返回全部
    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/use-cases?page_size=9999").await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn use_case_detail_and_not_found() {
    let ctx = build_test_context().await.expect("test context should build");
    let row = sample_use_case("Claims Triage", "VA", "VA", true);
    let slug = row.slug.clone();
    ctx.state
        .store
        .insert_use_case(&row, None)
        .await
        .expect("insert should succeed");

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/use-cases/{slug}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["use_case"]["use_case_name"], "Claims Triage");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/use-cases/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn related_products_blend_vector_and_text_hits() {
    let ctx = build_test_context().await.expect("test context should build");
    let use_case = sample_use_case("Copilot Rollout", "GSA", "GSA", true);
    let slug = use_case.slug.clone();
    let use_case = ctx
        .state
        .store
        .insert_use_case(&use_case, None)
        .await
        .expect("insert should succeed");
    ctx.state
        .store
        .upsert_product(&sample_product("FR100", "Microsoft", "Azure Government"))
        .await
        .expect("upsert should succeed");
    ctx.state
        .store
        .upsert_product(&sample_product("FR200", "Palantir", "Foundry"))
        .await
        .expect("upsert should succeed");

    // FR100: 文本 + 向量 → hybrid 且分数取向量；FR200: 仅文本
    let m = NameMatch {
        confidence: Confidence::High,
        reason: "company family match: microsoft".to_string(),
    };
    ctx.state
        .store
        .upsert_use_case_product_text_match(&use_case.id, "FR100", &m)
        .await
        .expect("match write should succeed");
    ctx.state
        .store
        .upsert_use_case_product_vector_score(&use_case.id, "FR100", 0.95)
        .await
        .expect("score write should succeed");
    let m2 = NameMatch {
        confidence: Confidence::Medium,
        reason: "substring match".to_string(),
    };
    ctx.state
        .store
        .upsert_use_case_product_text_match(&use_case.id, "FR200", &m2)
        .await
        .expect("match write should succeed");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/use-cases/{slug}/related-products"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["target_id"], "FR100");
    assert_eq!(items[0]["source"], "hybrid");
    assert!((items[0]["score"].as_f64().unwrap() - 0.95).abs() < 1e-6);
    assert_eq!(items[1]["target_id"], "FR200");
    assert_eq!(items[1]["source"], "text");
    assert!((items[1]["score"].as_f64().unwrap() - 0.70).abs() < 1e-6);
}

#[tokio::test]
async fn product_endpoints_cover_detail_authorizations_and_404() {
    let ctx = build_test_context().await.expect("test context should build");
    ctx.state
        .store
        .upsert_product(&sample_product("FR300", "Anthropic", "Claude for Government"))
        .await
        .expect("upsert should succeed");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/products/FR300").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["product"]["provider_name"], "Anthropic");

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/products/FR300/authorizations").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/products/FR999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn agency_tool_crud_recomputes_profile_over_http() {
    let ctx = build_test_context().await.expect("test context should build");
    let now = chrono::Utc::now();
    ctx.state
        .store
        .insert_agency_profile(&fedlens_storage::store::AgencyProfileRow {
            id: fedlens_common::id::next_id(),
            agency_name: "General Services Administration".to_string(),
            abbreviation: Some("GSA".to_string()),
            slug: "gsa".to_string(),
            department_level_name: None,
            parent_abbreviation: None,
            organization_id: None,
            deployment_status: "all_staff".to_string(),
            has_staff_chatbot: false,
            has_coding_assistant: false,
            has_document_automation: false,
            tool_count: 0,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("insert should succeed");

    // 新增工具
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/agencies/gsa/tools",
        Some(json!({
            "product_name": "GSA Chat",
            "product_type": "staff_chatbot"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tool_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/agencies/gsa").await;
    assert_eq!(body["data"]["has_staff_chatbot"], true);
    assert_eq!(body["data"]["tool_count"], 1);

    // 编辑成编码助手
    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/agencies/gsa/tools/{tool_id}"),
        Some(json!({
            "product_name": "GSA Codex",
            "product_type": "coding_assistant"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/agencies/gsa").await;
    assert_eq!(body["data"]["has_staff_chatbot"], false);
    assert_eq!(body["data"]["has_coding_assistant"], true);

    // 删除
    let (status, _, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/agencies/gsa/tools/{tool_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/agencies/gsa").await;
    assert_eq!(body["data"]["tool_count"], 0);

    // 空 product_name 拒绝
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/agencies/gsa/tools",
        Some(json!({"product_name": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);
}

#[tokio::test]
async fn incident_endpoints_cover_filters_and_security() {
    let ctx = build_test_context().await.expect("test context should build");
    let leak = ctx
        .state
        .store
        .insert_incident(&sample_incident("Training data exposure", &["Acme Corp"]))
        .await
        .expect("insert should succeed");
    ctx.state
        .store
        .insert_incident(&sample_incident("Benign outage", &["Globex"]))
        .await
        .expect("insert should succeed");
    ctx.state
        .store
        .upsert_incident_security(&fedlens_storage::store::IncidentSecurityRow {
            incident_id: leak.id.clone(),
            is_data_leak: true,
            is_attack: false,
            attack_type: None,
            leak_type: Some("training-data".to_string()),
            taxonomy: None,
            notes: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await
        .expect("upsert should succeed");

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/incidents?is_data_leak__eq=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["title"], "Training data exposure");

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/incidents/{}", leak.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["security"]["is_data_leak"], true);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/incidents/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn organization_tree_endpoints_walk_ancestors_and_descendants() {
    let ctx = build_test_context().await.expect("test context should build");
    let dept = ctx
        .state
        .store
        .insert_organization("Department of Energy", None, Some("DOE"), None)
        .await
        .expect("insert should succeed");
    let sub = ctx
        .state
        .store
        .insert_organization("NNSA", None, Some("NNSA"), Some(&dept.id))
        .await
        .expect("insert should succeed");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/organizations").await;
    assert_eq!(status, StatusCode::OK);
    let roots = body["data"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["abbreviation"], "DOE");

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/organizations?parent_id={}", dept.id),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/organizations/{}/ancestors", sub.id),
    )
    .await;
    let ancestors = body["data"].as_array().unwrap();
    assert_eq!(ancestors.len(), 1);
    assert_eq!(ancestors[0]["abbreviation"], "DOE");

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/organizations/{}/descendants", dept.id),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn dashboard_overview_aggregates_all_sections() {
    let ctx = build_test_context().await.expect("test context should build");
    ctx.state
        .store
        .insert_use_case(&sample_use_case("Overview Case", "GSA", "GSA", true), None)
        .await
        .expect("insert should succeed");
    ctx.state
        .store
        .upsert_product(&sample_product("FR400", "Google", "Vertex AI"))
        .await
        .expect("upsert should succeed");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/dashboard/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["use_cases"]["total"], 1);
    assert_eq!(body["data"]["use_cases"]["llm"], 1);
    assert_eq!(body["data"]["products"]["total"], 1);
    assert_eq!(body["data"]["incidents"]["total"], 0);
    assert!(body["data"]["uptime_secs"].as_i64().is_some());
}
