use anyhow::{Context, Result};
use chrono::Utc;
use fedlens_common::types::{parse_source_bool, slugify, DeploymentStatus, ToolType};
use fedlens_storage::store::{AgencyProfileRow, AgencyToolInput};
use fedlens_storage::RecordStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// 机构生成式 AI 工具表的一行（同一机构可对应多行）。
#[derive(Debug, Deserialize)]
pub struct CsvAgencyToolRow {
    #[serde(rename = "AgencyName", default)]
    pub agency_name: String,
    #[serde(rename = "Abbreviation", default)]
    pub abbreviation: String,
    #[serde(rename = "Parent", default)]
    pub parent: String,
    #[serde(rename = "DepartmentLevelName", default)]
    pub department_level_name: String,
    #[serde(rename = "DeploymentStatus", default)]
    pub deployment_status: String,
    #[serde(rename = "ProductName", default)]
    pub product_name: String,
    #[serde(rename = "ProductType", default)]
    pub product_type: String,
    #[serde(rename = "AvailableToAllStaff", default)]
    pub available_to_all_staff: String,
    #[serde(rename = "PilotOrLimited", default)]
    pub pilot_or_limited: String,
    #[serde(rename = "InternalOrSensitiveData", default)]
    pub internal_or_sensitive_data: String,
    #[serde(rename = "CitationChicago", default)]
    pub citation_chicago: String,
    #[serde(rename = "CitationAccessedDate", default)]
    pub citation_accessed_date: String,
    #[serde(rename = "CitationURL", default)]
    pub citation_url: String,
}

fn opt(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

struct PendingAgency {
    profile: AgencyProfileRow,
    tools: Vec<AgencyToolInput>,
}

/// 从 CSV 加载机构 AI 采用概况与工具清单。
/// 概况派生字段（标记/计数）由工具写入时的事务内重算得出。
pub async fn run(store: &RecordStore, csv_path: &str) -> Result<()> {
    tracing::info!(csv = %csv_path, "Loading agency AI tools");
    let mut reader = csv::Reader::from_path(Path::new(csv_path))
        .with_context(|| format!("failed to open CSV '{csv_path}'"))?;

    // 逐行归组到机构
    let mut agencies: Vec<PendingAgency> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    let mut used_slugs: HashSet<String> = HashSet::new();
    let mut source_rows = 0u32;
    let mut source_tools = 0u32;

    for result in reader.deserialize::<CsvAgencyToolRow>() {
        source_rows += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable row");
                continue;
            }
        };
        if record.agency_name.trim().is_empty() {
            continue;
        }

        let key = format!(
            "{}|{}",
            record.agency_name.trim(),
            record.abbreviation.trim()
        );
        let position = match keys.iter().position(|k| k == &key) {
            Some(p) => p,
            None => {
                let base = if record.abbreviation.trim().is_empty() {
                    slugify(&record.agency_name, 60)
                } else {
                    slugify(&record.abbreviation, 60)
                };
                let mut slug = base.clone();
                let mut counter = 1;
                while used_slugs.contains(&slug) {
                    slug = format!("{base}-{counter}");
                    counter += 1;
                }
                used_slugs.insert(slug.clone());

                let now = Utc::now();
                agencies.push(PendingAgency {
                    profile: AgencyProfileRow {
                        id: fedlens_common::id::next_id(),
                        agency_name: record.agency_name.trim().to_string(),
                        abbreviation: opt(&record.abbreviation),
                        slug,
                        department_level_name: opt(&record.department_level_name),
                        parent_abbreviation: opt(&record.parent),
                        organization_id: None,
                        deployment_status: DeploymentStatus::from_source_label(Some(
                            &record.deployment_status,
                        ))
                        .as_str()
                        .to_string(),
                        has_staff_chatbot: false,
                        has_coding_assistant: false,
                        has_document_automation: false,
                        tool_count: 0,
                        created_at: now,
                        updated_at: now,
                    },
                    tools: Vec::new(),
                });
                keys.push(key);
                agencies.len() - 1
            }
        };

        let product_name = record.product_name.trim();
        if !product_name.is_empty() && product_name.to_lowercase() != "none_identified" {
            source_tools += 1;
            agencies[position].tools.push(AgencyToolInput {
                product_name: product_name.to_string(),
                product_type: ToolType::from_source_label(Some(&record.product_type)),
                available_to_all_staff: opt(&record.available_to_all_staff),
                is_pilot_or_limited: parse_source_bool(&record.pilot_or_limited)
                    || record.pilot_or_limited.trim().to_lowercase() == "pilot"
                    || record.pilot_or_limited.trim().to_lowercase() == "limited",
                internal_or_sensitive_data: opt(&record.internal_or_sensitive_data),
                citation_chicago: opt(&record.citation_chicago),
                citation_accessed_date: opt(&record.citation_accessed_date),
                citation_url: opt(&record.citation_url),
            });
        }
    }

    tracing::info!(
        source_rows,
        agencies = agencies.len(),
        "Grouped source rows into agencies"
    );

    let mut profiles_created = 0u32;
    let mut profiles_skipped = 0u32;
    let mut tools_created = 0u32;

    for pending in &agencies {
        match store.get_agency_profile_by_slug(&pending.profile.slug).await {
            Ok(Some(_)) => {
                tracing::warn!(slug = %pending.profile.slug, "Profile already exists, skipping");
                profiles_skipped += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(slug = %pending.profile.slug, error = %e, "Lookup failed, skipping agency");
                profiles_skipped += 1;
                continue;
            }
        }

        let profile = match store.insert_agency_profile(&pending.profile).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(agency = %pending.profile.agency_name, error = %e, "Insert failed, skipping agency");
                profiles_skipped += 1;
                continue;
            }
        };
        profiles_created += 1;

        for tool in &pending.tools {
            match store.add_agency_tool(&profile.id, &profile.slug, tool).await {
                Ok(_) => tools_created += 1,
                Err(e) => {
                    tracing::error!(
                        agency = %profile.agency_name,
                        product = %tool.product_name,
                        error = %e,
                        "Tool insert failed, continuing"
                    );
                }
            }
        }
    }

    let db_profiles = store.count_agency_profiles(&Default::default()).await?;
    let summary = store.agency_summary().await?;
    let verified = db_profiles >= profiles_created as u64 && summary.total_tools >= tools_created as u64;
    tracing::info!(
        profiles_created,
        profiles_skipped,
        tools_created,
        source_tools,
        db_profiles,
        db_tools = summary.total_tools,
        verification = if verified { "pass" } else { "FAIL" },
        "load-agency-tools completed"
    );
    Ok(())
}
