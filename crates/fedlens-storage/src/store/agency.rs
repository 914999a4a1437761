use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use fedlens_common::types::ToolType;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::agency_profile::{self, Column, Entity};
use crate::entities::agency_tool::{self, Column as ToolCol, Entity as ToolEntity};
use crate::store::RecordStore;

/// 机构 AI 采用概况数据行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyProfileRow {
    pub id: String,
    pub agency_name: String,
    pub abbreviation: Option<String>,
    pub slug: String,
    pub department_level_name: Option<String>,
    pub parent_abbreviation: Option<String>,
    pub organization_id: Option<String>,
    pub deployment_status: String,
    pub has_staff_chatbot: bool,
    pub has_coding_assistant: bool,
    pub has_document_automation: bool,
    pub tool_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 机构 AI 工具数据行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyToolRow {
    pub id: String,
    pub agency_profile_id: String,
    pub product_name: String,
    pub product_type: String,
    pub slug: String,
    pub available_to_all_staff: Option<String>,
    pub is_pilot_or_limited: bool,
    pub internal_or_sensitive_data: Option<String>,
    pub citation_chicago: Option<String>,
    pub citation_accessed_date: Option<String>,
    pub citation_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新增/编辑工具的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyToolInput {
    pub product_name: String,
    pub product_type: ToolType,
    pub available_to_all_staff: Option<String>,
    pub is_pilot_or_limited: bool,
    pub internal_or_sensitive_data: Option<String>,
    pub citation_chicago: Option<String>,
    pub citation_accessed_date: Option<String>,
    pub citation_url: Option<String>,
}

/// 机构概况列表过滤器
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgencyProfileFilter {
    pub deployment_status_eq: Option<String>,
    pub has_staff_chatbot: Option<bool>,
    pub has_coding_assistant: Option<bool>,
    pub has_document_automation: Option<bool>,
    pub search: Option<String>,
}

/// 机构采用度统计（仪表盘用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgencySummary {
    pub total_profiles: u64,
    pub all_staff: u64,
    pub pilot_or_limited: u64,
    pub with_staff_chatbot: u64,
    pub total_tools: u64,
}

fn to_row(m: agency_profile::Model) -> AgencyProfileRow {
    AgencyProfileRow {
        id: m.id,
        agency_name: m.agency_name,
        abbreviation: m.abbreviation,
        slug: m.slug,
        department_level_name: m.department_level_name,
        parent_abbreviation: m.parent_abbreviation,
        organization_id: m.organization_id,
        deployment_status: m.deployment_status,
        has_staff_chatbot: m.has_staff_chatbot,
        has_coding_assistant: m.has_coding_assistant,
        has_document_automation: m.has_document_automation,
        tool_count: m.tool_count,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn tool_to_row(m: agency_tool::Model) -> AgencyToolRow {
    AgencyToolRow {
        id: m.id,
        agency_profile_id: m.agency_profile_id,
        product_name: m.product_name,
        product_type: m.product_type,
        slug: m.slug,
        available_to_all_staff: m.available_to_all_staff,
        is_pilot_or_limited: m.is_pilot_or_limited,
        internal_or_sensitive_data: m.internal_or_sensitive_data,
        citation_chicago: m.citation_chicago,
        citation_accessed_date: m.citation_accessed_date,
        citation_url: m.citation_url,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn apply_filter(
    mut q: sea_orm::Select<Entity>,
    filter: &AgencyProfileFilter,
) -> sea_orm::Select<Entity> {
    if let Some(status) = &filter.deployment_status_eq {
        q = q.filter(Column::DeploymentStatus.eq(status));
    }
    if let Some(v) = filter.has_staff_chatbot {
        q = q.filter(Column::HasStaffChatbot.eq(v));
    }
    if let Some(v) = filter.has_coding_assistant {
        q = q.filter(Column::HasCodingAssistant.eq(v));
    }
    if let Some(v) = filter.has_document_automation {
        q = q.filter(Column::HasDocumentAutomation.eq(v));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        q = q.filter(
            Condition::any()
                .add(Column::AgencyName.contains(search))
                .add(Column::Abbreviation.contains(search))
                .add(Column::DepartmentLevelName.contains(search)),
        );
    }
    q
}

/// 从子工具重算概况的派生字段。必须与工具增删改同在一个事务里执行，
/// 避免并发编辑兄弟行时丢失汇总。
async fn recompute_profile_summary<C: ConnectionTrait>(conn: &C, profile_id: &str) -> Result<()> {
    let tools = ToolEntity::find()
        .filter(ToolCol::AgencyProfileId.eq(profile_id))
        .all(conn)
        .await?;
    let has_staff_chatbot = tools
        .iter()
        .any(|t| t.product_type == ToolType::StaffChatbot.as_str());
    let has_coding_assistant = tools
        .iter()
        .any(|t| t.product_type == ToolType::CodingAssistant.as_str());
    let has_document_automation = tools
        .iter()
        .any(|t| t.product_type == ToolType::DocumentAutomation.as_str());

    let model = Entity::find_by_id(profile_id)
        .one(conn)
        .await?
        .ok_or_else(|| anyhow!("Agency profile not found: {}", profile_id))?;
    let mut am: agency_profile::ActiveModel = model.into();
    am.has_staff_chatbot = Set(has_staff_chatbot);
    am.has_coding_assistant = Set(has_coding_assistant);
    am.has_document_automation = Set(has_document_automation);
    am.tool_count = Set(tools.len() as i32);
    am.updated_at = Set(Utc::now().fixed_offset());
    am.update(conn).await?;
    Ok(())
}

fn tool_slug(profile_slug: &str, product_name: &str, tool_id: &str) -> String {
    let base = fedlens_common::types::slugify(&format!("{profile_slug} {product_name}"), 70);
    format!("{base}-{}", &tool_id[tool_id.len().saturating_sub(6)..])
}

impl RecordStore {
    // ---- agency_ai_profiles ----

    pub async fn insert_agency_profile(&self, row: &AgencyProfileRow) -> Result<AgencyProfileRow> {
        let now = Utc::now().fixed_offset();
        let am = agency_profile::ActiveModel {
            id: Set(row.id.clone()),
            agency_name: Set(row.agency_name.clone()),
            abbreviation: Set(row.abbreviation.clone()),
            slug: Set(row.slug.clone()),
            department_level_name: Set(row.department_level_name.clone()),
            parent_abbreviation: Set(row.parent_abbreviation.clone()),
            organization_id: Set(row.organization_id.clone()),
            deployment_status: Set(row.deployment_status.clone()),
            has_staff_chatbot: Set(row.has_staff_chatbot),
            has_coding_assistant: Set(row.has_coding_assistant),
            has_document_automation: Set(row.has_document_automation),
            tool_count: Set(row.tool_count),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_agency_profile_by_slug(&self, slug: &str) -> Result<Option<AgencyProfileRow>> {
        let model = Entity::find()
            .filter(Column::Slug.eq(slug))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn list_agency_profiles(
        &self,
        filter: &AgencyProfileFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AgencyProfileRow>> {
        let mut q = apply_filter(Entity::find(), filter).order_by(Column::AgencyName, Order::Asc);
        if limit != usize::MAX {
            q = q.limit(limit as u64).offset(offset as u64);
        }
        let rows = q.all(self.db()).await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_agency_profiles(&self, filter: &AgencyProfileFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    pub async fn set_profile_organization(
        &self,
        profile_id: &str,
        organization_id: Option<&str>,
    ) -> Result<()> {
        let model = Entity::find_by_id(profile_id)
            .one(self.db())
            .await?
            .ok_or_else(|| anyhow!("Agency profile not found: {}", profile_id))?;
        let mut am: agency_profile::ActiveModel = model.into();
        am.organization_id = Set(organization_id.map(|s| s.to_string()));
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(())
    }

    // ---- agency_ai_tools ----

    pub async fn list_tools_for_profile(&self, profile_id: &str) -> Result<Vec<AgencyToolRow>> {
        let rows = ToolEntity::find()
            .filter(ToolCol::AgencyProfileId.eq(profile_id))
            .order_by(ToolCol::ProductName, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(tool_to_row).collect())
    }

    pub async fn get_agency_tool(&self, tool_id: &str) -> Result<Option<AgencyToolRow>> {
        let model = ToolEntity::find_by_id(tool_id).one(self.db()).await?;
        Ok(model.map(tool_to_row))
    }

    /// 新增工具并在同一事务内重算概况派生字段。
    pub async fn add_agency_tool(
        &self,
        profile_id: &str,
        profile_slug: &str,
        input: &AgencyToolInput,
    ) -> Result<AgencyToolRow> {
        let now = Utc::now().fixed_offset();
        let id = fedlens_common::id::next_id();
        let slug = tool_slug(profile_slug, &input.product_name, &id);
        let txn = self.db().begin().await?;
        let am = agency_tool::ActiveModel {
            id: Set(id),
            agency_profile_id: Set(profile_id.to_string()),
            product_name: Set(input.product_name.clone()),
            product_type: Set(input.product_type.as_str().to_string()),
            slug: Set(slug),
            available_to_all_staff: Set(input.available_to_all_staff.clone()),
            is_pilot_or_limited: Set(input.is_pilot_or_limited),
            internal_or_sensitive_data: Set(input.internal_or_sensitive_data.clone()),
            citation_chicago: Set(input.citation_chicago.clone()),
            citation_accessed_date: Set(input.citation_accessed_date.clone()),
            citation_url: Set(input.citation_url.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(&txn).await?;
        recompute_profile_summary(&txn, profile_id).await?;
        txn.commit().await?;
        Ok(tool_to_row(model))
    }

    /// 编辑工具并在同一事务内重算概况派生字段。
    pub async fn update_agency_tool(
        &self,
        tool_id: &str,
        input: &AgencyToolInput,
    ) -> Result<Option<AgencyToolRow>> {
        let txn = self.db().begin().await?;
        let model = ToolEntity::find_by_id(tool_id).one(&txn).await?;
        let Some(m) = model else {
            txn.rollback().await?;
            return Ok(None);
        };
        let profile_id = m.agency_profile_id.clone();
        let mut am: agency_tool::ActiveModel = m.into();
        am.product_name = Set(input.product_name.clone());
        am.product_type = Set(input.product_type.as_str().to_string());
        am.available_to_all_staff = Set(input.available_to_all_staff.clone());
        am.is_pilot_or_limited = Set(input.is_pilot_or_limited);
        am.internal_or_sensitive_data = Set(input.internal_or_sensitive_data.clone());
        am.citation_chicago = Set(input.citation_chicago.clone());
        am.citation_accessed_date = Set(input.citation_accessed_date.clone());
        am.citation_url = Set(input.citation_url.clone());
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(&txn).await?;
        recompute_profile_summary(&txn, &profile_id).await?;
        txn.commit().await?;
        Ok(Some(tool_to_row(updated)))
    }

    /// 删除工具并在同一事务内重算概况派生字段。
    pub async fn delete_agency_tool(&self, tool_id: &str) -> Result<bool> {
        let txn = self.db().begin().await?;
        let model = ToolEntity::find_by_id(tool_id).one(&txn).await?;
        let Some(m) = model else {
            txn.rollback().await?;
            return Ok(false);
        };
        let profile_id = m.agency_profile_id.clone();
        ToolEntity::delete_by_id(tool_id).exec(&txn).await?;
        recompute_profile_summary(&txn, &profile_id).await?;
        txn.commit().await?;
        Ok(true)
    }

    pub async fn agency_summary(&self) -> Result<AgencySummary> {
        let total_profiles = Entity::find().count(self.db()).await?;
        let all_staff = Entity::find()
            .filter(Column::DeploymentStatus.eq("all_staff"))
            .count(self.db())
            .await?;
        let pilot = Entity::find()
            .filter(Column::DeploymentStatus.eq("pilot_or_limited"))
            .count(self.db())
            .await?;
        let with_chatbot = Entity::find()
            .filter(Column::HasStaffChatbot.eq(true))
            .count(self.db())
            .await?;
        let total_tools = ToolEntity::find().count(self.db()).await?;
        Ok(AgencySummary {
            total_profiles,
            all_staff,
            pilot_or_limited: pilot,
            with_staff_chatbot: with_chatbot,
            total_tools,
        })
    }
}
