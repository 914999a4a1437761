use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role an entity plays in an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    Developer,
    Deployer,
    Harmed,
}

impl EntityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityRole::Developer => "developer",
            EntityRole::Deployer => "deployer",
            EntityRole::Harmed => "harmed",
        }
    }

    pub const ALL: [EntityRole; 3] = [
        EntityRole::Developer,
        EntityRole::Deployer,
        EntityRole::Harmed,
    ];
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "developer" => Ok(EntityRole::Developer),
            "deployer" => Ok(EntityRole::Deployer),
            "harmed" | "harmed_party" => Ok(EntityRole::Harmed),
            other => Err(format!("unknown entity role: {other}")),
        }
    }
}

/// 机构级生成式 AI 部署状态（来源表格的三档枚举）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    AllStaff,
    PilotOrLimited,
    NoPublicInternalAssistant,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::AllStaff => "all_staff",
            DeploymentStatus::PilotOrLimited => "pilot_or_limited",
            DeploymentStatus::NoPublicInternalAssistant => "no_public_internal_assistant",
        }
    }

    /// Map free-form source labels onto the enum; anything unrecognized is
    /// the conservative "no assistant" bucket.
    pub fn from_source_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return DeploymentStatus::NoPublicInternalAssistant;
        };
        let lower = label.trim().to_lowercase();
        if lower.contains("all_staff") || lower == "all staff" {
            DeploymentStatus::AllStaff
        } else if lower.contains("pilot") || lower.contains("limited") {
            DeploymentStatus::PilotOrLimited
        } else {
            DeploymentStatus::NoPublicInternalAssistant
        }
    }
}

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all_staff" => Ok(DeploymentStatus::AllStaff),
            "pilot_or_limited" => Ok(DeploymentStatus::PilotOrLimited),
            "no_public_internal_assistant" => Ok(DeploymentStatus::NoPublicInternalAssistant),
            other => Err(format!("unknown deployment status: {other}")),
        }
    }
}

/// 机构 AI 工具类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    StaffChatbot,
    CodingAssistant,
    DocumentAutomation,
    NoneIdentified,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::StaffChatbot => "staff_chatbot",
            ToolType::CodingAssistant => "coding_assistant",
            ToolType::DocumentAutomation => "document_automation",
            ToolType::NoneIdentified => "none_identified",
        }
    }

    pub fn from_source_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return ToolType::NoneIdentified;
        };
        match label.trim().to_lowercase().replace(' ', "_").as_str() {
            "staff_chatbot" => ToolType::StaffChatbot,
            "coding_assistant" => ToolType::CodingAssistant,
            "document_automation" => ToolType::DocumentAutomation,
            _ => ToolType::NoneIdentified,
        }
    }
}

/// Convert the source spreadsheets' assorted truthy spellings to a bool.
pub fn parse_source_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}

/// Generate a URL-friendly slug from a display name.
///
/// Lowercases, drops everything but alphanumerics/spaces/hyphens, collapses
/// separator runs to single hyphens, and trims to `max_len`.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_sep = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
            last_was_sep = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !last_was_sep {
            slug.push('-');
            last_was_sep = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.len() > max_len {
        let mut end = max_len;
        while end > 0 && !slug.is_char_boundary(end) {
            end -= 1;
        }
        slug.truncate(end);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_punctuation_and_collapses_separators() {
        assert_eq!(
            slugify("AI-Powered  Fraud Detection (Phase 2)", 80),
            "ai-powered-fraud-detection-phase-2"
        );
        assert_eq!(slugify("  --  ", 80), "");
    }

    #[test]
    fn slugify_truncates_on_char_boundary() {
        let slug = slugify("department of veterans affairs claims triage", 20);
        assert!(slug.len() <= 20);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn deployment_status_maps_source_labels() {
        assert_eq!(
            DeploymentStatus::from_source_label(Some("All_Staff rollout")),
            DeploymentStatus::AllStaff
        );
        assert_eq!(
            DeploymentStatus::from_source_label(Some("pilot (limited)")),
            DeploymentStatus::PilotOrLimited
        );
        assert_eq!(
            DeploymentStatus::from_source_label(None),
            DeploymentStatus::NoPublicInternalAssistant
        );
    }

    #[test]
    fn entity_role_round_trips() {
        for role in EntityRole::ALL {
            assert_eq!(role.as_str().parse::<EntityRole>().unwrap(), role);
        }
    }

    #[test]
    fn source_bool_accepts_truthy_spellings() {
        assert!(parse_source_bool("TRUE"));
        assert!(parse_source_bool(" y "));
        assert!(parse_source_bool("1"));
        assert!(!parse_source_bool("no"));
        assert!(!parse_source_bool(""));
    }
}
