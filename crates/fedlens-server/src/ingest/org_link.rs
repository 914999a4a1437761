use anyhow::Result;
use fedlens_match::text::normalize_name;
use fedlens_storage::store::OrganizationRow;
use fedlens_storage::RecordStore;
use std::collections::HashMap;

/// 保守前缀匹配的最小长度：太短的前缀会把不同机构连到一起。
const MIN_PREFIX_LEN: usize = 10;

/// 从机构显示名里提取括号缩写，如 "Department of Energy (DOE)" → "DOE"。
pub fn extract_abbreviation(name: &str) -> Option<String> {
    let open = name.rfind('(')?;
    let close = name[open..].find(')')? + open;
    let inner = name[open + 1..close].trim();
    if inner.is_empty() || inner.len() > 12 || inner.chars().any(|c| c.is_whitespace()) {
        return None;
    }
    Some(inner.to_string())
}

/// 机构名与组织树的分级匹配：缩写 → 规范化全名精确 → 保守前缀。
pub fn match_org<'a>(
    profile_name: &str,
    profile_abbreviation: Option<&str>,
    orgs: &'a [OrganizationRow],
    abbrev_index: &HashMap<String, &'a OrganizationRow>,
    name_index: &HashMap<String, &'a OrganizationRow>,
) -> Option<&'a OrganizationRow> {
    // 1. 缩写（档案字段优先，其次从名称里提取）
    let abbrev = profile_abbreviation
        .map(|a| a.to_string())
        .or_else(|| extract_abbreviation(profile_name));
    if let Some(abbrev) = abbrev {
        if let Some(org) = abbrev_index.get(&normalize_name(&abbrev)) {
            return Some(org);
        }
    }

    // 2. 规范化全名精确匹配
    let normalized = normalize_name(profile_name);
    if let Some(org) = name_index.get(&normalized) {
        return Some(org);
    }

    // 3. 保守前缀匹配：一方是另一方的前缀，且公共前缀足够长
    for org in orgs {
        let org_norm = normalize_name(&org.name);
        let (shorter, longer) = if org_norm.len() <= normalized.len() {
            (&org_norm, &normalized)
        } else {
            (&normalized, &org_norm)
        };
        if shorter.len() >= MIN_PREFIX_LEN && longer.starts_with(shorter.as_str()) {
            return Some(org);
        }
    }

    None
}

/// 把机构概况关联到组织树节点。匹配不到的行仅报告，不重试。
pub async fn run(store: &RecordStore) -> Result<()> {
    tracing::info!("Linking agency profiles to the organization tree");

    let orgs = store.list_all_organizations().await?;
    if orgs.is_empty() {
        tracing::warn!("Organization tree is empty; nothing to link");
        return Ok(());
    }
    let abbrev_index: HashMap<String, &OrganizationRow> = orgs
        .iter()
        .filter_map(|o| {
            o.abbreviation
                .as_deref()
                .map(|a| (normalize_name(a), o))
        })
        .collect();
    let name_index: HashMap<String, &OrganizationRow> =
        orgs.iter().map(|o| (normalize_name(&o.name), o)).collect();

    let profiles = store
        .list_agency_profiles(&Default::default(), usize::MAX, 0)
        .await?;

    let mut linked = 0u32;
    let mut already_linked = 0u32;
    let mut unmatched = 0u32;

    for profile in &profiles {
        if profile.organization_id.is_some() {
            already_linked += 1;
            continue;
        }
        match match_org(
            &profile.agency_name,
            profile.abbreviation.as_deref(),
            &orgs,
            &abbrev_index,
            &name_index,
        ) {
            Some(org) => {
                match store
                    .set_profile_organization(&profile.id, Some(&org.id))
                    .await
                {
                    Ok(()) => {
                        linked += 1;
                        tracing::info!(agency = %profile.agency_name, org = %org.name, "Linked");
                    }
                    Err(e) => {
                        tracing::error!(agency = %profile.agency_name, error = %e, "Link write failed, continuing");
                        unmatched += 1;
                    }
                }
            }
            None => {
                unmatched += 1;
                tracing::warn!(agency = %profile.agency_name, "No organization match");
            }
        }
    }

    tracing::info!(
        total = profiles.len(),
        linked,
        already_linked,
        unmatched,
        "link-organizations completed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_extract_from_parentheses() {
        assert_eq!(
            extract_abbreviation("Department of Energy (DOE)"),
            Some("DOE".to_string())
        );
        assert_eq!(extract_abbreviation("Department of Energy"), None);
        // 括号里带空格的不是缩写
        assert_eq!(
            extract_abbreviation("General Services (regional office)"),
            None
        );
    }
}
