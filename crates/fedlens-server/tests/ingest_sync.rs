mod common;

use common::build_test_context;
use fedlens_server::ingest::use_cases::{run_load, run_sync};
use std::io::Write;
use std::path::PathBuf;

const HEADER: &str = "use_case_name,agency,agency_abbreviation,bureau,topic_area,intended_purpose,outputs,stage_of_development,rights_safety_impacting,domain_category,date_initiated,date_implemented,date_retired,has_llm,has_genai,has_chatbot,has_coding_assistant,has_coding_agent,has_classic_ml,has_rpa,has_rules,providers_detected,commercial_product,development_approach,procurement_instrument,involves_pii,has_ato,system_name,key_risks,search_text";

fn write_csv(dir: &std::path::Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("csv should create");
    writeln!(file, "{HEADER}").expect("header should write");
    for row in rows {
        writeln!(file, "{row}").expect("row should write");
    }
    path
}

fn inventory_row(name: &str, has_llm: &str) -> String {
    format!(
        "{name},General Services Administration,GSA,,Service Delivery,Automate intake,Summaries,Operation and Maintenance,Neither,Mission-Enabling,,,,{has_llm},{has_llm},false,false,false,false,false,false,\"[\"\"OpenAI\"\"]\",,In-house,,No,Yes,Intake System,Hallucination risk,intake automation"
    )
}

#[tokio::test]
async fn load_then_sync_is_idempotent() {
    let ctx = build_test_context().await.expect("test context should build");
    let rows = [
        inventory_row("Intake Triage", "true"),
        inventory_row("Document Summarizer", "false"),
    ];
    let row_refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
    let csv_path = write_csv(ctx.temp_dir.path(), "inventory.csv", &row_refs);

    run_load(&ctx.state.store, csv_path.to_str().unwrap())
        .await
        .expect("load should succeed");
    assert_eq!(
        ctx.state
            .store
            .count_use_cases(&Default::default())
            .await
            .unwrap(),
        2
    );

    // 对已同步目标重跑：0 增 0 改
    let stats = run_sync(&ctx.state.store, csv_path.to_str().unwrap())
        .await
        .expect("sync should succeed");
    assert_eq!(stats.added, 0);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.unchanged, 2);
}

#[tokio::test]
async fn sync_adds_missing_and_updates_changed_flags() {
    let ctx = build_test_context().await.expect("test context should build");
    let initial = [inventory_row("Intake Triage", "false")];
    let initial_refs: Vec<&str> = initial.iter().map(|s| s.as_str()).collect();
    let csv_v1 = write_csv(ctx.temp_dir.path(), "v1.csv", &initial_refs);
    run_load(&ctx.state.store, csv_v1.to_str().unwrap())
        .await
        .expect("load should succeed");

    // v2：旧行的 LLM 标记翻转，另加一行新用例
    let v2 = [
        inventory_row("Intake Triage", "true"),
        inventory_row("Fraud Scorer", "false"),
    ];
    let v2_refs: Vec<&str> = v2.iter().map(|s| s.as_str()).collect();
    let csv_v2 = write_csv(ctx.temp_dir.path(), "v2.csv", &v2_refs);

    let stats = run_sync(&ctx.state.store, csv_v2.to_str().unwrap())
        .await
        .expect("sync should succeed");
    assert_eq!(stats.added, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.unchanged, 0);

    let updated = ctx
        .state
        .store
        .get_use_case_by_slug("gsa-intake-triage")
        .await
        .unwrap()
        .expect("row should exist");
    assert!(updated.has_llm);

    // 再跑一遍回到幂等
    let stats = run_sync(&ctx.state.store, csv_v2.to_str().unwrap())
        .await
        .expect("sync should succeed");
    assert_eq!(stats.added, 0);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.unchanged, 2);
}

#[tokio::test]
async fn migrate_db_copies_and_skips_populated_tables() {
    let ctx = build_test_context().await.expect("test context should build");

    // 准备一个源库
    let source_path = ctx.temp_dir.path().join("source.db");
    let source_url = format!("sqlite://{}?mode=rwc", source_path.display());
    let source = fedlens_storage::RecordStore::new(&source_url)
        .await
        .expect("source store should build");
    source
        .insert_use_case(
            &common::sample_use_case("Migrated Case", "DOE", "DOE", true),
            None,
        )
        .await
        .expect("insert should succeed");
    source
        .upsert_product(&common::sample_product("FR500", "IBM", "watsonx.gov"))
        .await
        .expect("upsert should succeed");
    drop(source);

    fedlens_server::ingest::db_migrate::run(&ctx.state.store, source_path.to_str().unwrap())
        .await
        .expect("migration should succeed");

    assert_eq!(
        ctx.state
            .store
            .count_use_cases(&Default::default())
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        ctx.state
            .store
            .count_products(&Default::default())
            .await
            .unwrap(),
        1
    );

    // 再跑一遍：目标已有数据，整表跳过，不产生重复
    fedlens_server::ingest::db_migrate::run(&ctx.state.store, source_path.to_str().unwrap())
        .await
        .expect("second migration should succeed");
    assert_eq!(
        ctx.state
            .store
            .count_use_cases(&Default::default())
            .await
            .unwrap(),
        1
    );
}
