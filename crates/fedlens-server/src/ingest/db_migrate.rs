use anyhow::Result;
use fedlens_common::types::EntityRole;
use fedlens_storage::store::{IncidentSort, SortDirection, UseCaseSort};
use fedlens_storage::RecordStore;
use std::collections::HashMap;

/// 断点批大小：每迁移这么多行落一次 checkpoint。
const CHECKPOINT_BATCH: usize = 500;

/// 源库 → 目标库的整库拷贝。
///
/// - 逐表幂等：目标表已有数据且无断点时整表跳过；
/// - 每批行落一次 migration_checkpoints 断点，中断后重跑从断点之后继续；
/// - 行级写入走 upsert/插入，失败行记日志后继续；
/// - 结束时逐表核对源/目标行数并打印 pass/FAIL。
pub async fn run(dest: &RecordStore, source_db_path: &str) -> Result<()> {
    let source_url = format!("sqlite://{source_db_path}?mode=rwc");
    tracing::info!(source = %source_db_path, "Opening source database");
    let source = RecordStore::new(&source_url).await?;

    let mut failures = 0u32;

    failures += migrate_use_cases(&source, dest).await?;
    failures += migrate_products(&source, dest).await?;
    failures += migrate_authorizations(&source, dest).await?;
    failures += migrate_agencies(&source, dest).await?;
    failures += migrate_incidents(&source, dest).await?;
    failures += migrate_entities(&source, dest).await?;

    // 逐表计数核对
    let pairs = [
        (
            "ai_use_cases",
            source.count_use_cases(&Default::default()).await?,
            dest.count_use_cases(&Default::default()).await?,
        ),
        (
            "products",
            source.count_products(&Default::default()).await?,
            dest.count_products(&Default::default()).await?,
        ),
        (
            "product_authorizations",
            source.count_authorizations().await?,
            dest.count_authorizations().await?,
        ),
        (
            "agency_ai_profiles",
            source.count_agency_profiles(&Default::default()).await?,
            dest.count_agency_profiles(&Default::default()).await?,
        ),
        (
            "incidents",
            source.count_incidents(&Default::default()).await?,
            dest.count_incidents(&Default::default()).await?,
        ),
        (
            "entities",
            source.count_entities(&Default::default()).await?,
            dest.count_entities(&Default::default()).await?,
        ),
    ];
    let mut all_pass = true;
    for (table, src_count, dest_count) in pairs {
        let pass = dest_count >= src_count;
        if !pass {
            all_pass = false;
        }
        tracing::info!(
            table,
            source = src_count,
            destination = dest_count,
            verification = if pass { "pass" } else { "FAIL" },
            "Table count check"
        );
    }

    tracing::info!(
        failures,
        verification = if all_pass && failures == 0 { "pass" } else { "FAIL" },
        "migrate-db completed"
    );
    Ok(())
}

/// 目标已有数据且没有断点 → 整表视为已迁移。
async fn table_done(dest: &RecordStore, table: &str, dest_count: u64) -> Result<bool> {
    if dest_count > 0 && dest.get_migration_checkpoint(table).await?.is_none() {
        tracing::info!(table, rows = dest_count, "Destination already populated, skipping table");
        return Ok(true);
    }
    Ok(false)
}

async fn migrate_use_cases(source: &RecordStore, dest: &RecordStore) -> Result<u32> {
    const TABLE: &str = "ai_use_cases";
    let dest_count = dest.count_use_cases(&Default::default()).await?;
    if table_done(dest, TABLE, dest_count).await? {
        return Ok(0);
    }
    let resume_after = dest
        .get_migration_checkpoint(TABLE)
        .await?
        .map(|cp| cp.last_migrated_id);

    let mut rows = source
        .list_use_cases(
            &Default::default(),
            UseCaseSort::CreatedAt,
            SortDirection::Asc,
            usize::MAX,
            0,
        )
        .await?;
    rows.sort_by(|a, b| a.id.cmp(&b.id));

    let mut pending = Vec::with_capacity(CHECKPOINT_BATCH);
    for row in rows {
        if let Some(last) = &resume_after {
            if row.id.as_str() <= last.as_str() {
                continue;
            }
        }
        let detail = source.get_use_case_detail(&row.id).await.unwrap_or(None);
        pending.push((row, detail));
    }

    // 整批与断点同事务：失败的批整批回滚并跳过，重跑时安全续传
    let mut migrated = 0i64;
    let mut failures = 0u32;
    for batch in pending.chunks(CHECKPOINT_BATCH) {
        match dest
            .insert_use_case_batch_checkpointed(batch, migrated + batch.len() as i64)
            .await
        {
            Ok(()) => {
                migrated += batch.len() as i64;
                tracing::info!(table = TABLE, migrated, "Checkpoint written");
            }
            Err(e) => {
                tracing::error!(table = TABLE, rows = batch.len(), error = %e, "Batch rolled back, continuing");
                failures += batch.len() as u32;
            }
        }
    }
    tracing::info!(table = TABLE, migrated, failures, "Table migrated");
    Ok(failures)
}

async fn migrate_products(source: &RecordStore, dest: &RecordStore) -> Result<u32> {
    const TABLE: &str = "products";
    let dest_count = dest.count_products(&Default::default()).await?;
    if table_done(dest, TABLE, dest_count).await? {
        return Ok(0);
    }

    let products = source
        .list_products(
            &Default::default(),
            Default::default(),
            SortDirection::Asc,
            usize::MAX,
            0,
        )
        .await?;
    let mut migrated = 0i64;
    let mut failures = 0u32;
    for row in &products {
        match dest.upsert_product(row).await {
            Ok(()) => migrated += 1,
            Err(e) => {
                tracing::error!(table = TABLE, fedramp_id = %row.fedramp_id, error = %e, "Row migration failed, continuing");
                failures += 1;
            }
        }
        if migrated > 0 && migrated % CHECKPOINT_BATCH as i64 == 0 {
            dest.upsert_migration_checkpoint(TABLE, &row.id, migrated)
                .await?;
        }
    }

    // 分析记录跟着产品走
    let analyses = source.list_all_service_analyses().await?;
    for analysis in &analyses {
        if let Err(e) = dest.upsert_service_analysis(analysis).await {
            tracing::error!(fedramp_id = %analysis.fedramp_id, error = %e, "Analysis migration failed, continuing");
            failures += 1;
        }
    }
    tracing::info!(table = TABLE, migrated, analyses = analyses.len(), failures, "Table migrated");
    Ok(failures)
}

async fn migrate_authorizations(source: &RecordStore, dest: &RecordStore) -> Result<u32> {
    const TABLE: &str = "product_authorizations";
    let dest_count = dest.count_authorizations().await?;
    if table_done(dest, TABLE, dest_count).await? {
        return Ok(0);
    }

    let rows = source.list_all_authorizations().await?;
    let mut migrated = 0i64;
    let mut failures = 0u32;
    for row in &rows {
        match dest.upsert_authorization(row).await {
            Ok(()) => migrated += 1,
            Err(e) => {
                tracing::error!(table = TABLE, id = %row.id, error = %e, "Row migration failed, continuing");
                failures += 1;
            }
        }
        if migrated > 0 && migrated % CHECKPOINT_BATCH as i64 == 0 {
            dest.upsert_migration_checkpoint(TABLE, &row.id, migrated)
                .await?;
        }
    }
    tracing::info!(table = TABLE, migrated, failures, "Table migrated");
    Ok(failures)
}

async fn migrate_agencies(source: &RecordStore, dest: &RecordStore) -> Result<u32> {
    const TABLE: &str = "agency_ai_profiles";
    let dest_count = dest.count_agency_profiles(&Default::default()).await?;
    if table_done(dest, TABLE, dest_count).await? {
        return Ok(0);
    }

    let profiles = source
        .list_agency_profiles(&Default::default(), usize::MAX, 0)
        .await?;
    let mut migrated = 0i64;
    let mut failures = 0u32;
    for profile in &profiles {
        if dest
            .get_agency_profile_by_slug(&profile.slug)
            .await
            .unwrap_or(None)
            .is_some()
        {
            continue;
        }
        let inserted = match dest.insert_agency_profile(profile).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(table = TABLE, slug = %profile.slug, error = %e, "Row migration failed, continuing");
                failures += 1;
                continue;
            }
        };
        migrated += 1;
        let tools = source.list_tools_for_profile(&profile.id).await?;
        for tool in &tools {
            let input = fedlens_storage::store::AgencyToolInput {
                product_name: tool.product_name.clone(),
                product_type: fedlens_common::types::ToolType::from_source_label(Some(
                    &tool.product_type,
                )),
                available_to_all_staff: tool.available_to_all_staff.clone(),
                is_pilot_or_limited: tool.is_pilot_or_limited,
                internal_or_sensitive_data: tool.internal_or_sensitive_data.clone(),
                citation_chicago: tool.citation_chicago.clone(),
                citation_accessed_date: tool.citation_accessed_date.clone(),
                citation_url: tool.citation_url.clone(),
            };
            if let Err(e) = dest
                .add_agency_tool(&inserted.id, &inserted.slug, &input)
                .await
            {
                tracing::error!(slug = %profile.slug, product = %tool.product_name, error = %e, "Tool migration failed, continuing");
                failures += 1;
            }
        }
        if migrated % CHECKPOINT_BATCH as i64 == 0 {
            dest.upsert_migration_checkpoint(TABLE, &profile.id, migrated)
                .await?;
        }
    }
    tracing::info!(table = TABLE, migrated, failures, "Table migrated");
    Ok(failures)
}

async fn migrate_incidents(source: &RecordStore, dest: &RecordStore) -> Result<u32> {
    const TABLE: &str = "incidents";
    let dest_count = dest.count_incidents(&Default::default()).await?;
    if table_done(dest, TABLE, dest_count).await? {
        return Ok(0);
    }
    let resume_after = dest
        .get_migration_checkpoint(TABLE)
        .await?
        .map(|cp| cp.last_migrated_id);

    let mut rows = source
        .list_incidents(
            &Default::default(),
            IncidentSort::CreatedAt,
            SortDirection::Asc,
            usize::MAX,
            0,
        )
        .await?;
    rows.sort_by(|a, b| a.id.cmp(&b.id));

    let mut pending = Vec::with_capacity(CHECKPOINT_BATCH);
    for row in rows {
        if let Some(last) = &resume_after {
            if row.id.as_str() <= last.as_str() {
                continue;
            }
        }
        let security = source.get_incident_security(&row.id).await.unwrap_or(None);
        pending.push((row, security));
    }

    let mut migrated = 0i64;
    let mut failures = 0u32;
    for batch in pending.chunks(CHECKPOINT_BATCH) {
        match dest
            .insert_incident_batch_checkpointed(batch, migrated + batch.len() as i64)
            .await
        {
            Ok(()) => migrated += batch.len() as i64,
            Err(e) => {
                tracing::error!(table = TABLE, rows = batch.len(), error = %e, "Batch rolled back, continuing");
                failures += batch.len() as u32;
            }
        }
    }
    tracing::info!(table = TABLE, migrated, failures, "Table migrated");
    Ok(failures)
}

async fn migrate_entities(source: &RecordStore, dest: &RecordStore) -> Result<u32> {
    const TABLE: &str = "entities";
    let dest_count = dest.count_entities(&Default::default()).await?;
    if table_done(dest, TABLE, dest_count).await? {
        return Ok(0);
    }

    // 目标库按规范化名称去重建实体，id 会变，后面迁关联时要换 id
    let entities = source.list_all_entities().await?;
    let mut id_map: HashMap<String, String> = HashMap::with_capacity(entities.len());
    let mut migrated = 0i64;
    let mut failures = 0u32;
    for entity in &entities {
        match dest.get_or_create_entity(&entity.name).await {
            Ok(created) => {
                id_map.insert(entity.id.clone(), created.id);
                migrated += 1;
            }
            Err(e) => {
                tracing::error!(table = TABLE, name = %entity.name, error = %e, "Row migration failed, continuing");
                failures += 1;
            }
        }
        if migrated > 0 && migrated % CHECKPOINT_BATCH as i64 == 0 {
            dest.upsert_migration_checkpoint(TABLE, &entity.id, migrated)
                .await?;
        }
    }

    // 角色关联跟实体走；重复关联幂等跳过
    let incidents = source
        .list_incidents(
            &Default::default(),
            IncidentSort::CreatedAt,
            SortDirection::Asc,
            usize::MAX,
            0,
        )
        .await?;
    let mut links = 0u32;
    for incident in &incidents {
        let source_links = source.list_entity_links_for_incident(&incident.id).await?;
        for link in source_links {
            let Some(dest_entity_id) = id_map.get(&link.entity_id) else {
                continue;
            };
            let Ok(role) = link.role.parse::<EntityRole>() else {
                tracing::warn!(incident = %incident.id, role = %link.role, "Unknown role, skipping link");
                continue;
            };
            match dest
                .link_entity_to_incident(&incident.id, dest_entity_id, role)
                .await
            {
                Ok(()) => links += 1,
                Err(e) => {
                    tracing::error!(incident = %incident.id, error = %e, "Link migration failed, continuing");
                    failures += 1;
                }
            }
        }
    }
    tracing::info!(table = TABLE, migrated, links, failures, "Table migrated");
    Ok(failures)
}
