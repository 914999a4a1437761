use anyhow::{Context, Result};
use chrono::Utc;
use fedlens_match::text::normalize_name;
use fedlens_storage::store::AuthorizationRow;
use fedlens_storage::RecordStore;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// marketplace 导出 CSV 的一行。
#[derive(Debug, Deserialize)]
pub struct CsvAuthorizationRow {
    #[serde(rename = "FedRAMP ID", default)]
    pub fedramp_id: String,
    #[serde(rename = "Parent Agency", default)]
    pub parent_agency: String,
    #[serde(rename = "Sub Agency", default)]
    pub sub_agency: String,
    #[serde(rename = "ATO Issuance Date", default)]
    pub ato_issuance_date: String,
    #[serde(rename = "ATO Expiration Date", default)]
    pub ato_expiration_date: String,
}

/// 不是真实机构的占位行，跳过组织匹配。
const PROGRAM_SENTINELS: [&str; 2] = [
    "Legacy JAB Authorization",
    "Federal Risk and Authorization Management Program",
];

/// 机构名 → 组织 ID 的多键索引（全名/简称/缩写都能查）。
pub fn build_org_index(
    orgs: &[fedlens_storage::store::OrganizationRow],
) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for org in orgs {
        index.insert(normalize_name(&org.name), org.id.clone());
        if let Some(short) = &org.short_name {
            index.insert(normalize_name(short), org.id.clone());
        }
        if let Some(abbr) = &org.abbreviation {
            index.insert(normalize_name(abbr), org.id.clone());
        }
    }
    index
}

/// CSV 机构名匹配组织：子机构优先，其次父机构，最后去掉
/// "Department of (the )?" 前缀再试一次。
pub fn match_agency_to_org(
    parent_agency: &str,
    sub_agency: &str,
    index: &HashMap<String, String>,
) -> Option<String> {
    if PROGRAM_SENTINELS.contains(&parent_agency) {
        return None;
    }
    if !sub_agency.trim().is_empty() {
        if let Some(id) = index.get(&normalize_name(sub_agency)) {
            return Some(id.clone());
        }
    }
    if !parent_agency.trim().is_empty() {
        if let Some(id) = index.get(&normalize_name(parent_agency)) {
            return Some(id.clone());
        }
        for prefix in ["Department of the ", "Department of "] {
            if let Some(stripped) = parent_agency.strip_prefix(prefix) {
                if let Some(id) = index.get(&normalize_name(stripped)) {
                    return Some(id.clone());
                }
            }
        }
    }
    None
}

fn opt(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 从 marketplace CSV 导入机构授权记录。
pub async fn run(store: &RecordStore, csv_path: &str) -> Result<()> {
    tracing::info!(csv = %csv_path, "Importing product authorizations");

    let orgs = store.list_all_organizations().await?;
    let index = build_org_index(&orgs);
    tracing::info!(mappings = index.len(), "Organization name index built");

    let mut reader = csv::Reader::from_path(Path::new(csv_path))
        .with_context(|| format!("failed to open CSV '{csv_path}'"))?;

    let mut total = 0u32;
    let mut matched = 0u32;
    let mut unmatched = 0u32;
    let mut skipped = 0u32;
    let mut duplicates = 0u32;
    let mut imported = 0u32;
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut unmatched_agencies: HashMap<String, u32> = HashMap::new();

    for result in reader.deserialize::<CsvAuthorizationRow>() {
        total += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable row");
                skipped += 1;
                continue;
            }
        };
        let fedramp_id = record.fedramp_id.trim().to_string();
        let parent = record.parent_agency.trim().to_string();
        let sub = record.sub_agency.trim().to_string();
        if fedramp_id.is_empty() || parent.is_empty() {
            skipped += 1;
            continue;
        }

        let key = (fedramp_id.clone(), parent.clone(), sub.clone());
        if !seen.insert(key) {
            duplicates += 1;
            continue;
        }

        let org_id = match_agency_to_org(&parent, &sub, &index);
        if org_id.is_some() {
            matched += 1;
        } else {
            unmatched += 1;
            let label = if sub.is_empty() { parent.clone() } else { sub.clone() };
            *unmatched_agencies.entry(label).or_insert(0) += 1;
        }

        let now = Utc::now();
        let row = AuthorizationRow {
            id: fedlens_common::id::next_id(),
            fedramp_id,
            organization_id: org_id,
            parent_agency_name: parent,
            sub_agency_name: opt(&sub),
            ato_issuance_date: opt(&record.ato_issuance_date),
            ato_expiration_date: opt(&record.ato_expiration_date),
            created_at: now,
            updated_at: now,
        };
        match store.upsert_authorization(&row).await {
            Ok(()) => imported += 1,
            Err(e) => {
                tracing::error!(fedramp_id = %row.fedramp_id, error = %e, "Upsert failed, skipping row");
                skipped += 1;
            }
        }
    }

    // 未匹配机构 Top 报告
    let mut top: Vec<(String, u32)> = unmatched_agencies.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1));
    for (agency, count) in top.iter().take(20) {
        tracing::warn!(agency = %agency, count, "Unmatched agency");
    }

    let db_total = store.count_authorizations().await?;
    let verified = db_total >= imported as u64;
    tracing::info!(
        total,
        duplicates,
        skipped,
        matched,
        unmatched,
        imported,
        db_total,
        verification = if verified { "pass" } else { "FAIL" },
        "import-authorizations completed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(name, id)| (normalize_name(name), id.to_string()))
            .collect()
    }

    #[test]
    fn sub_agency_wins_over_parent() {
        let index = index_of(&[("Department of Energy", "org-doe"), ("NNSA", "org-nnsa")]);
        assert_eq!(
            match_agency_to_org("Department of Energy", "NNSA", &index),
            Some("org-nnsa".to_string())
        );
    }

    #[test]
    fn department_prefix_is_stripped_as_fallback() {
        let index = index_of(&[("Energy", "org-doe")]);
        assert_eq!(
            match_agency_to_org("Department of Energy", "", &index),
            Some("org-doe".to_string())
        );
        let index = index_of(&[("Treasury", "org-treas")]);
        assert_eq!(
            match_agency_to_org("Department of the Treasury", "", &index),
            Some("org-treas".to_string())
        );
    }

    #[test]
    fn program_sentinels_never_match() {
        let index = index_of(&[("Legacy JAB Authorization", "org-x")]);
        assert_eq!(
            match_agency_to_org("Legacy JAB Authorization", "", &index),
            None
        );
    }
}
