use anyhow::Result;
use fedlens_match::alias::MatchConfig;
use fedlens_match::text::match_names;
use fedlens_match::NameMatch;
use fedlens_storage::store::{SortDirection, UseCaseSort};
use fedlens_storage::RecordStore;

/// 重新生成四张匹配表的文本匹配。
///
/// 只清理并重写 match_type = 'text' 的行；带向量分数的行保留，
/// 文本命中叠加上去时改标 hybrid（向量分数优先）。
pub async fn run(store: &RecordStore, config: &MatchConfig) -> Result<()> {
    tracing::info!("Regenerating cross-record matches");

    let cleared_ep = store.clear_entity_product_text_matches().await?;
    let cleared_ip = store.clear_incident_product_text_matches().await?;
    let cleared_iu = store.clear_incident_use_case_text_matches().await?;
    let cleared_up = store.clear_use_case_product_text_matches().await?;
    tracing::info!(
        entity_product = cleared_ep,
        incident_product = cleared_ip,
        incident_use_case = cleared_iu,
        use_case_product = cleared_up,
        "Cleared stale text matches"
    );

    let products = store
        .list_products(&Default::default(), Default::default(), SortDirection::Asc, usize::MAX, 0)
        .await?;
    let use_cases = store
        .list_use_cases(
            &Default::default(),
            UseCaseSort::Name,
            SortDirection::Asc,
            usize::MAX,
            0,
        )
        .await?;
    let incidents = store
        .list_incidents(
            &Default::default(),
            Default::default(),
            SortDirection::Asc,
            usize::MAX,
            0,
        )
        .await?;
    let entities = store.list_all_entities().await?;

    // 实体 → 产品。泛指参与方（victims/users/...）先行排除。
    let mut entity_product = 0u32;
    let mut excluded_entities = 0u32;
    for entity in &entities {
        if config.is_excluded_participant(&entity.name) {
            excluded_entities += 1;
            continue;
        }
        for product in &products {
            if let Some(m) = match_names(&entity.name, &product.provider_name, config) {
                if let Err(e) = store
                    .upsert_entity_product_text_match(&entity.id, &product.fedramp_id, &m)
                    .await
                {
                    tracing::error!(entity = %entity.name, fedramp_id = %product.fedramp_id, error = %e, "Match write failed, continuing");
                } else {
                    entity_product += 1;
                }
            }
        }
    }

    // 事件 → 产品：部署方/开发方名单逐一比对供应商名。
    let mut incident_product = 0u32;
    for incident in &incidents {
        for product in &products {
            let mut best: Option<NameMatch> = None;
            for name in incident.deployers.iter().chain(incident.developers.iter()) {
                if config.is_excluded_participant(name) {
                    continue;
                }
                if let Some(m) = match_names(name, &product.provider_name, config) {
                    let better = match &best {
                        Some(current) => m.confidence > current.confidence,
                        None => true,
                    };
                    if better {
                        best = Some(m);
                    }
                }
            }
            if let Some(m) = best {
                if let Err(e) = store
                    .upsert_incident_product_text_match(&incident.id, &product.fedramp_id, &m)
                    .await
                {
                    tracing::error!(incident = %incident.id, error = %e, "Match write failed, continuing");
                } else {
                    incident_product += 1;
                }
            }
        }
    }

    // 用例 → 产品：检出的供应商列表比对供应商名。
    let mut use_case_product = 0u32;
    for use_case in &use_cases {
        for product in &products {
            let mut best: Option<NameMatch> = None;
            for provider in &use_case.providers_detected {
                if let Some(m) = match_names(provider, &product.provider_name, config) {
                    let better = match &best {
                        Some(current) => m.confidence > current.confidence,
                        None => true,
                    };
                    if better {
                        best = Some(m);
                    }
                }
            }
            if let Some(m) = best {
                if let Err(e) = store
                    .upsert_use_case_product_text_match(&use_case.id, &product.fedramp_id, &m)
                    .await
                {
                    tracing::error!(use_case = %use_case.slug, error = %e, "Match write failed, continuing");
                } else {
                    use_case_product += 1;
                }
            }
        }
    }

    // 事件 → 用例：事件参与方与用例检出供应商有同一家族即关联。
    let mut incident_use_case = 0u32;
    for incident in &incidents {
        for use_case in &use_cases {
            let mut best: Option<NameMatch> = None;
            for name in incident.deployers.iter().chain(incident.developers.iter()) {
                if config.is_excluded_participant(name) {
                    continue;
                }
                for provider in &use_case.providers_detected {
                    if let Some(m) = match_names(name, provider, config) {
                        let better = match &best {
                            Some(current) => m.confidence > current.confidence,
                            None => true,
                        };
                        if better {
                            best = Some(m);
                        }
                    }
                }
            }
            if let Some(m) = best {
                if let Err(e) = store
                    .upsert_incident_use_case_text_match(&incident.id, &use_case.id, &m)
                    .await
                {
                    tracing::error!(incident = %incident.id, use_case = %use_case.slug, error = %e, "Match write failed, continuing");
                } else {
                    incident_use_case += 1;
                }
            }
        }
    }

    let summary = store.match_summary().await?;
    tracing::info!(
        entity_product,
        incident_product,
        use_case_product,
        incident_use_case,
        excluded_entities,
        table_totals = ?summary,
        "link-matches completed"
    );
    Ok(())
}
