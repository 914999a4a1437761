use anyhow::{Context, Result};
use chrono::Utc;
use fedlens_common::types::{parse_source_bool, slugify};
use fedlens_storage::store::{UseCaseDetailRow, UseCaseRow, UseCaseUpdate};
use fedlens_storage::RecordStore;
use serde::Deserialize;
use std::path::Path;

/// 清单 CSV 的一行（带标记的富化导出）。
#[derive(Debug, Deserialize)]
pub struct CsvUseCaseRow {
    #[serde(default)]
    pub use_case_name: String,
    #[serde(default)]
    pub agency: String,
    #[serde(default)]
    pub agency_abbreviation: String,
    #[serde(default)]
    pub bureau: String,
    #[serde(default)]
    pub topic_area: String,
    #[serde(default)]
    pub intended_purpose: String,
    #[serde(default)]
    pub outputs: String,
    #[serde(default)]
    pub stage_of_development: String,
    #[serde(default)]
    pub rights_safety_impacting: String,
    #[serde(default)]
    pub domain_category: String,
    #[serde(default)]
    pub date_initiated: String,
    #[serde(default)]
    pub date_implemented: String,
    #[serde(default)]
    pub date_retired: String,
    #[serde(default)]
    pub has_llm: String,
    #[serde(default)]
    pub has_genai: String,
    #[serde(default)]
    pub has_chatbot: String,
    #[serde(default)]
    pub has_coding_assistant: String,
    #[serde(default)]
    pub has_coding_agent: String,
    #[serde(default)]
    pub has_classic_ml: String,
    #[serde(default)]
    pub has_rpa: String,
    #[serde(default)]
    pub has_rules: String,
    #[serde(default)]
    pub providers_detected: String,
    #[serde(default)]
    pub commercial_product: String,
    #[serde(default)]
    pub development_approach: String,
    #[serde(default)]
    pub procurement_instrument: String,
    #[serde(default)]
    pub involves_pii: String,
    #[serde(default)]
    pub has_ato: String,
    #[serde(default)]
    pub system_name: String,
    #[serde(default)]
    pub key_risks: String,
    #[serde(default)]
    pub search_text: String,
}

fn opt(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// providers 列可能是 JSON 数组，也可能是源表格的 `['a', 'b']` 写法；
/// 解析失败一律当空列表。
pub fn parse_providers(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Vec::new();
    }
    if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
        return list;
    }
    trimmed
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|p| p.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// 用例 slug：机构缩写前缀 + 名称，截到 80 字符。
pub fn use_case_slug(name: &str, agency_abbr: &str) -> String {
    let base = slugify(name, 80);
    let prefix = slugify(agency_abbr, 16);
    if prefix.is_empty() {
        base
    } else {
        format!("{prefix}-{base}")
    }
}

fn flags_update(record: &CsvUseCaseRow) -> UseCaseUpdate {
    UseCaseUpdate {
        has_llm: parse_source_bool(&record.has_llm),
        has_genai: parse_source_bool(&record.has_genai),
        has_chatbot: parse_source_bool(&record.has_chatbot),
        has_coding_assistant: parse_source_bool(&record.has_coding_assistant),
        has_coding_agent: parse_source_bool(&record.has_coding_agent),
        has_classic_ml: parse_source_bool(&record.has_classic_ml),
        has_rpa: parse_source_bool(&record.has_rpa),
        has_rules: parse_source_bool(&record.has_rules),
        providers_detected: parse_providers(&record.providers_detected),
    }
}

fn row_from_record(record: &CsvUseCaseRow, slug: String) -> (UseCaseRow, UseCaseDetailRow) {
    let flags = flags_update(record);
    let now = Utc::now();
    let row = UseCaseRow {
        id: fedlens_common::id::next_id(),
        use_case_name: record.use_case_name.trim().to_string(),
        agency: record.agency.trim().to_string(),
        agency_abbreviation: opt(&record.agency_abbreviation),
        bureau: opt(&record.bureau),
        topic_area: opt(&record.topic_area),
        intended_purpose: opt(&record.intended_purpose),
        outputs: opt(&record.outputs),
        stage_of_development: opt(&record.stage_of_development),
        rights_safety_impacting: opt(&record.rights_safety_impacting),
        domain_category: opt(&record.domain_category),
        date_initiated: opt(&record.date_initiated),
        date_implemented: opt(&record.date_implemented),
        date_retired: opt(&record.date_retired),
        has_llm: flags.has_llm,
        has_genai: flags.has_genai,
        has_chatbot: flags.has_chatbot,
        has_coding_assistant: flags.has_coding_assistant,
        has_coding_agent: flags.has_coding_agent,
        has_classic_ml: flags.has_classic_ml,
        has_rpa: flags.has_rpa,
        has_rules: flags.has_rules,
        providers_detected: flags.providers_detected,
        commercial_product: opt(&record.commercial_product),
        slug,
        created_at: now,
        updated_at: now,
    };
    let detail = UseCaseDetailRow {
        development_approach: opt(&record.development_approach),
        procurement_instrument: opt(&record.procurement_instrument),
        involves_pii: opt(&record.involves_pii),
        has_ato: opt(&record.has_ato),
        system_name: opt(&record.system_name),
        key_risks: opt(&record.key_risks),
        search_text: opt(&record.search_text),
        ..Default::default()
    };
    (row, detail)
}

/// 全量加载用例清单 CSV（首次导入）。
pub async fn run_load(store: &RecordStore, csv_path: &str) -> Result<()> {
    tracing::info!(csv = %csv_path, "Loading AI use case inventory");
    let mut reader = csv::Reader::from_path(Path::new(csv_path))
        .with_context(|| format!("failed to open CSV '{csv_path}'"))?;

    let mut loaded = 0u32;
    let mut skipped = 0u32;
    let mut source_rows = 0u32;

    for (index, result) in reader.deserialize::<CsvUseCaseRow>().enumerate() {
        let row_num = index + 2; // header is row 1
        source_rows += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(row = row_num, error = %e, "Skipping unreadable row");
                skipped += 1;
                continue;
            }
        };
        if record.use_case_name.trim().is_empty() || record.agency.trim().is_empty() {
            skipped += 1;
            continue;
        }

        let mut slug = use_case_slug(&record.use_case_name, &record.agency_abbreviation);
        match store.slug_exists(&slug).await {
            Ok(true) => slug = format!("{slug}-{row_num}"),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(row = row_num, error = %e, "Slug lookup failed, skipping row");
                skipped += 1;
                continue;
            }
        }

        let (row, detail) = row_from_record(&record, slug);
        match store.insert_use_case(&row, Some(&detail)).await {
            Ok(_) => {
                loaded += 1;
                if loaded % 100 == 0 {
                    tracing::info!(loaded, "Processed use cases...");
                }
            }
            Err(e) => {
                tracing::warn!(row = row_num, name = %row.use_case_name, error = %e, "Insert failed, skipping row");
                skipped += 1;
            }
        }
    }

    // 计数核对
    let db_total = store.count_use_cases(&Default::default()).await?;
    let verified = db_total >= loaded as u64;
    tracing::info!(
        source_rows,
        loaded,
        skipped,
        db_total,
        verification = if verified { "pass" } else { "FAIL" },
        "load-use-cases completed"
    );
    Ok(())
}

/// 同步结果统计
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub added: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub skipped: u32,
}

/// CSV 与库内记录做差异同步：新行补插，标记变化的行更新，其余不动。
/// 对已同步的目标重跑一遍应得到 0 增 0 改。
pub async fn run_sync(store: &RecordStore, csv_path: &str) -> Result<SyncStats> {
    tracing::info!(csv = %csv_path, "Syncing use case capability flags");
    let mut reader = csv::Reader::from_path(Path::new(csv_path))
        .with_context(|| format!("failed to open CSV '{csv_path}'"))?;

    let mut stats = SyncStats::default();

    for (index, result) in reader.deserialize::<CsvUseCaseRow>().enumerate() {
        let row_num = index + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(row = row_num, error = %e, "Skipping unreadable row");
                stats.skipped += 1;
                continue;
            }
        };
        if record.use_case_name.trim().is_empty() || record.agency.trim().is_empty() {
            stats.skipped += 1;
            continue;
        }

        let slug = use_case_slug(&record.use_case_name, &record.agency_abbreviation);
        let existing = match store.get_use_case_by_slug(&slug).await {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(row = row_num, error = %e, "Lookup failed, skipping row");
                stats.skipped += 1;
                continue;
            }
        };

        match existing {
            None => {
                let (row, detail) = row_from_record(&record, slug);
                match store.insert_use_case(&row, Some(&detail)).await {
                    Ok(_) => stats.added += 1,
                    Err(e) => {
                        tracing::warn!(row = row_num, error = %e, "Insert failed, skipping row");
                        stats.skipped += 1;
                    }
                }
            }
            Some(current) => {
                let update = flags_update(&record);
                if update.differs_from(&current) {
                    match store.update_use_case_flags(&current.id, &update).await {
                        Ok(_) => stats.updated += 1,
                        Err(e) => {
                            tracing::warn!(row = row_num, error = %e, "Update failed, skipping row");
                            stats.skipped += 1;
                        }
                    }
                } else {
                    stats.unchanged += 1;
                }
            }
        }
    }

    tracing::info!(
        added = stats.added,
        updated = stats.updated,
        unchanged = stats.unchanged,
        skipped = stats.skipped,
        "sync-use-case-flags completed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_parse_from_json_and_python_repr() {
        assert_eq!(
            parse_providers(r#"["OpenAI", "Microsoft"]"#),
            vec!["OpenAI", "Microsoft"]
        );
        assert_eq!(
            parse_providers("['OpenAI', 'Microsoft']"),
            vec!["OpenAI", "Microsoft"]
        );
        assert!(parse_providers("").is_empty());
        assert!(parse_providers("[]").is_empty());
    }

    #[test]
    fn slugs_carry_agency_prefix() {
        assert_eq!(
            use_case_slug("Fraud Detection (Phase 2)", "DOE"),
            "doe-fraud-detection-phase-2"
        );
        assert_eq!(use_case_slug("Fraud Detection", ""), "fraud-detection");
    }
}
