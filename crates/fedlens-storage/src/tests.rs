use crate::store::{
    AgencyProfileRow, AgencyToolInput, IncidentFilter, IncidentRow, IncidentSecurityRow,
    IncidentSort, ProductRow, RecordStore, SortDirection, UseCaseFilter, UseCaseRow, UseCaseSort,
};
use chrono::Utc;
use fedlens_common::types::ToolType;
use fedlens_match::{Confidence, NameMatch};
use sea_orm::{ConnectionTrait, Statement};
use tempfile::TempDir;

async fn setup() -> (TempDir, RecordStore) {
    fedlens_common::id::init(1, 1);
    let dir = TempDir::new().expect("temp dir should create");
    let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let store = RecordStore::new(&db_url)
        .await
        .expect("store should initialize");
    (dir, store)
}

fn make_use_case(name: &str, agency: &str, has_llm: bool, has_chatbot: bool) -> UseCaseRow {
    let now = Utc::now();
    UseCaseRow {
        id: fedlens_common::id::next_id(),
        use_case_name: name.to_string(),
        agency: agency.to_string(),
        agency_abbreviation: None,
        bureau: None,
        topic_area: None,
        intended_purpose: Some(format!("{name} purpose")),
        outputs: None,
        stage_of_development: Some("Operation and Maintenance".to_string()),
        rights_safety_impacting: None,
        domain_category: Some("Mission-Enabling".to_string()),
        date_initiated: None,
        date_implemented: None,
        date_retired: None,
        has_llm,
        has_genai: has_llm,
        has_chatbot,
        has_coding_assistant: false,
        has_coding_agent: false,
        has_classic_ml: false,
        has_rpa: false,
        has_rules: false,
        providers_detected: vec![],
        commercial_product: None,
        slug: fedlens_common::types::slugify(&format!("{agency} {name}"), 80),
        created_at: now,
        updated_at: now,
    }
}

fn make_incident(title: &str, deployers: &[&str]) -> IncidentRow {
    let now = Utc::now();
    IncidentRow {
        id: fedlens_common::id::next_id(),
        title: title.to_string(),
        description: Some(format!("{title} description")),
        occurred_on: Some("2024-06-01".to_string()),
        deployers: deployers.iter().map(|s| s.to_string()).collect(),
        developers: vec![],
        harmed_parties: vec![],
        source_url: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn capability_flag_filters_use_and_semantics() {
    let (_dir, store) = setup().await;
    store
        .insert_use_case(&make_use_case("Chat Triage", "GSA", true, true), None)
        .await
        .unwrap();
    store
        .insert_use_case(&make_use_case("LLM Summarizer", "GSA", true, false), None)
        .await
        .unwrap();
    store
        .insert_use_case(&make_use_case("Rules Engine", "DOE", false, false), None)
        .await
        .unwrap();

    // Single flag: exactly the flagged subset
    let filter = UseCaseFilter {
        has_llm: Some(true),
        ..Default::default()
    };
    let rows = store
        .list_use_cases(&filter, UseCaseSort::Name, SortDirection::Asc, 100, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.has_llm));

    // Two filters: intersection, not union
    let filter = UseCaseFilter {
        has_llm: Some(true),
        has_chatbot: Some(true),
        ..Default::default()
    };
    let rows = store
        .list_use_cases(&filter, UseCaseSort::Name, SortDirection::Asc, 100, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].use_case_name, "Chat Triage");
    assert_eq!(store.count_use_cases(&filter).await.unwrap(), 1);
}

#[tokio::test]
async fn pagination_is_stable_and_sentinel_returns_everything() {
    let (_dir, store) = setup().await;
    for i in 0..5 {
        store
            .insert_use_case(
                &make_use_case(&format!("Case {i}"), "GSA", false, false),
                None,
            )
            .await
            .unwrap();
    }

    let filter = UseCaseFilter::default();
    // Page 2 with size 2 = rows 2..3 of the sorted set
    let page2 = store
        .list_use_cases(&filter, UseCaseSort::Name, SortDirection::Asc, 2, 2)
        .await
        .unwrap();
    assert_eq!(page2.len(), 2);
    assert_eq!(page2[0].use_case_name, "Case 2");
    assert_eq!(page2[1].use_case_name, "Case 3");

    // The all-rows sentinel skips limit/offset entirely
    let all = store
        .list_use_cases(&filter, UseCaseSort::Name, SortDirection::Asc, usize::MAX, 0)
        .await
        .unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn search_matches_across_columns() {
    let (_dir, store) = setup().await;
    store
        .insert_use_case(&make_use_case("Fraud Detection", "Treasury", false, false), None)
        .await
        .unwrap();
    store
        .insert_use_case(&make_use_case("Benefits Chat", "VA", false, false), None)
        .await
        .unwrap();

    let filter = UseCaseFilter {
        search: Some("fraud".to_string()),
        ..Default::default()
    };
    let rows = store
        .list_use_cases(&filter, UseCaseSort::Name, SortDirection::Asc, 100, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].agency, "Treasury");

    // Searching agency text also hits
    let filter = UseCaseFilter {
        search: Some("VA".to_string()),
        ..Default::default()
    };
    assert_eq!(store.count_use_cases(&filter).await.unwrap(), 1);
}

#[tokio::test]
async fn missing_slug_returns_none() {
    let (_dir, store) = setup().await;
    assert!(store
        .get_use_case_by_slug("does-not-exist")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn malformed_provider_json_reads_as_empty_list() {
    let (_dir, store) = setup().await;
    let row = make_use_case("Broken Providers", "GSA", false, false);
    let inserted = store.insert_use_case(&row, None).await.unwrap();

    store
        .db
        .execute(Statement::from_string(
            store.db.get_database_backend(),
            format!(
                "UPDATE ai_use_cases SET providers_detected = 'not json' WHERE id = '{}'",
                inserted.id
            ),
        ))
        .await
        .unwrap();

    let reread = store
        .get_use_case_by_id(&inserted.id)
        .await
        .unwrap()
        .unwrap();
    assert!(reread.providers_detected.is_empty());
}

#[tokio::test]
async fn tool_mutations_recompute_profile_summary() {
    let (_dir, store) = setup().await;
    let now = Utc::now();
    let profile = store
        .insert_agency_profile(&AgencyProfileRow {
            id: fedlens_common::id::next_id(),
            agency_name: "Department of Energy".to_string(),
            abbreviation: Some("DOE".to_string()),
            slug: "doe".to_string(),
            department_level_name: None,
            parent_abbreviation: None,
            organization_id: None,
            deployment_status: "pilot_or_limited".to_string(),
            has_staff_chatbot: false,
            has_coding_assistant: false,
            has_document_automation: false,
            tool_count: 0,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    let tool = store
        .add_agency_tool(
            &profile.id,
            &profile.slug,
            &AgencyToolInput {
                product_name: "DOEGPT".to_string(),
                product_type: ToolType::StaffChatbot,
                available_to_all_staff: Some("yes".to_string()),
                is_pilot_or_limited: false,
                internal_or_sensitive_data: None,
                citation_chicago: None,
                citation_accessed_date: None,
                citation_url: None,
            },
        )
        .await
        .unwrap();

    let profile = store
        .get_agency_profile_by_slug("doe")
        .await
        .unwrap()
        .unwrap();
    assert!(profile.has_staff_chatbot);
    assert!(!profile.has_coding_assistant);
    assert_eq!(profile.tool_count, 1);

    // Retype the tool: chatbot flag drops, coding flag rises
    store
        .update_agency_tool(
            &tool.id,
            &AgencyToolInput {
                product_name: "DOE Codex".to_string(),
                product_type: ToolType::CodingAssistant,
                available_to_all_staff: None,
                is_pilot_or_limited: true,
                internal_or_sensitive_data: None,
                citation_chicago: None,
                citation_accessed_date: None,
                citation_url: None,
            },
        )
        .await
        .unwrap();
    let profile = store
        .get_agency_profile_by_slug("doe")
        .await
        .unwrap()
        .unwrap();
    assert!(!profile.has_staff_chatbot);
    assert!(profile.has_coding_assistant);

    assert!(store.delete_agency_tool(&tool.id).await.unwrap());
    let profile = store
        .get_agency_profile_by_slug("doe")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.tool_count, 0);
    assert!(!profile.has_coding_assistant);
}

#[tokio::test]
async fn organization_paths_hold_the_tree_invariant() {
    let (_dir, store) = setup().await;
    let dept = store
        .insert_organization("Department of Homeland Security", None, Some("DHS"), None)
        .await
        .unwrap();
    let sub = store
        .insert_organization("CISA", None, Some("CISA"), Some(&dept.id))
        .await
        .unwrap();
    let office = store
        .insert_organization("Threat Hunting", None, None, Some(&sub.id))
        .await
        .unwrap();

    assert_eq!(dept.path, format!("/{}", dept.id));
    assert_eq!(sub.path, format!("{}/{}", dept.path, sub.id));
    assert_eq!(office.path, format!("{}/{}", sub.path, office.id));
    assert_eq!(office.depth, 2);

    let ancestors = store.list_organization_ancestors(&office.id).await.unwrap();
    let ancestor_ids: Vec<&str> = ancestors.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ancestor_ids, vec![dept.id.as_str(), sub.id.as_str()]);

    let descendants = store
        .list_organization_descendants(&dept.id)
        .await
        .unwrap();
    assert_eq!(descendants.len(), 2);

    let children = store
        .list_organization_children(Some(&dept.id))
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, sub.id);
}

#[tokio::test]
async fn vector_score_over_text_match_becomes_hybrid() {
    let (_dir, store) = setup().await;
    let m = NameMatch {
        confidence: Confidence::High,
        reason: "exact match".to_string(),
    };
    store
        .upsert_incident_product_text_match("inc-1", "FR123", &m)
        .await
        .unwrap();
    store
        .upsert_incident_product_vector_score("inc-1", "FR123", 0.93)
        .await
        .unwrap();

    let rows = store
        .list_incident_product_matches_for_incident("inc-1")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].match_type, "hybrid");
    assert_eq!(rows[0].similarity_score, Some(0.93));
    assert_eq!(rows[0].confidence, "high");

    // Regeneration keeps scored rows, only text rows are cleared
    store
        .upsert_incident_product_text_match("inc-2", "FR999", &m)
        .await
        .unwrap();
    let cleared = store.clear_incident_product_text_matches().await.unwrap();
    assert_eq!(cleared, 1);
    let remaining = store
        .list_incident_product_matches_for_incident("inc-1")
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn product_upsert_is_idempotent_per_fedramp_id() {
    let (_dir, store) = setup().await;
    let now = Utc::now();
    let mut row = ProductRow {
        id: fedlens_common::id::next_id(),
        fedramp_id: "FR0001".to_string(),
        provider_name: "Microsoft".to_string(),
        offering_name: "Azure Government".to_string(),
        service_model: Some("IaaS".to_string()),
        status: "authorized".to_string(),
        authorization_date: None,
        created_at: now,
        updated_at: now,
    };
    store.upsert_product(&row).await.unwrap();
    row.id = fedlens_common::id::next_id();
    row.offering_name = "Azure Government (updated)".to_string();
    store.upsert_product(&row).await.unwrap();

    let filter = Default::default();
    assert_eq!(store.count_products(&filter).await.unwrap(), 1);
    let fetched = store
        .get_product_by_fedramp_id("FR0001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.offering_name, "Azure Government (updated)");
}

#[tokio::test]
async fn incident_security_filter_uses_enrichment_table() {
    let (_dir, store) = setup().await;
    let leak = store
        .insert_incident(&make_incident("Training data leak", &["Acme"]))
        .await
        .unwrap();
    store
        .insert_incident(&make_incident("Chatbot outage", &["Globex"]))
        .await
        .unwrap();
    store
        .upsert_incident_security(&IncidentSecurityRow {
            incident_id: leak.id.clone(),
            is_data_leak: true,
            is_attack: false,
            attack_type: None,
            leak_type: Some("training-data".to_string()),
            taxonomy: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    let filter = IncidentFilter {
        is_data_leak: Some(true),
        ..Default::default()
    };
    let rows = store
        .list_incidents(&filter, IncidentSort::Title, SortDirection::Asc, 100, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, leak.id);

    let summary = store.incident_summary().await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.with_security_enrichment, 1);
    assert_eq!(summary.data_leaks, 1);
}

#[tokio::test]
async fn entities_deduplicate_on_normalized_name() {
    let (_dir, store) = setup().await;
    let a = store.get_or_create_entity("OpenAI, Inc.").await.unwrap();
    let b = store.get_or_create_entity("openai inc").await.unwrap();
    assert_eq!(a.id, b.id);

    let incident = store
        .insert_incident(&make_incident("Prompt injection", &["OpenAI"]))
        .await
        .unwrap();
    store
        .link_entity_to_incident(&incident.id, &a.id, fedlens_common::types::EntityRole::Deployer)
        .await
        .unwrap();
    // Duplicate link is idempotent
    store
        .link_entity_to_incident(&incident.id, &a.id, fedlens_common::types::EntityRole::Deployer)
        .await
        .unwrap();

    let incidents = store.list_incidents_for_entity(&a.id).await.unwrap();
    assert_eq!(incidents.len(), 1);
    let links = store
        .list_entity_links_for_incident(&incident.id)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].role, "deployer");
}

#[tokio::test]
async fn batch_migration_commits_rows_and_checkpoint_together() {
    let (_dir, store) = setup().await;
    let batch = vec![
        (make_use_case("Batch A", "GSA", false, false), None),
        (make_use_case("Batch B", "GSA", true, false), None),
    ];
    store
        .insert_use_case_batch_checkpointed(&batch, 2)
        .await
        .unwrap();
    assert_eq!(store.count_use_cases(&Default::default()).await.unwrap(), 2);
    let cp = store
        .get_migration_checkpoint("ai_use_cases")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cp.last_migrated_id, batch[1].0.id);
    assert_eq!(cp.migrated_count, 2);

    // A failing row rolls the whole batch back, checkpoint included
    let dup = make_use_case("Batch A", "GSA", false, false); // same slug as Batch A
    let bad_batch = vec![
        (make_use_case("Batch C", "GSA", false, false), None),
        (dup, None),
    ];
    assert!(store
        .insert_use_case_batch_checkpointed(&bad_batch, 4)
        .await
        .is_err());
    assert_eq!(store.count_use_cases(&Default::default()).await.unwrap(), 2);
    let cp = store
        .get_migration_checkpoint("ai_use_cases")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cp.migrated_count, 2);
}

#[tokio::test]
async fn migration_checkpoint_round_trips() {
    let (_dir, store) = setup().await;
    assert!(store
        .get_migration_checkpoint("ai_use_cases")
        .await
        .unwrap()
        .is_none());
    store
        .upsert_migration_checkpoint("ai_use_cases", "12345", 200)
        .await
        .unwrap();
    store
        .upsert_migration_checkpoint("ai_use_cases", "67890", 400)
        .await
        .unwrap();
    let cp = store
        .get_migration_checkpoint("ai_use_cases")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cp.last_migrated_id, "67890");
    assert_eq!(cp.migrated_count, 400);
}
