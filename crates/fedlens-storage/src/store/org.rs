use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::entities::organization::{self, Column, Entity};
use crate::store::RecordStore;

/// 联邦组织树节点（部 → 局 → 办公室）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub abbreviation: Option<String>,
    pub level: i32,
    pub parent_id: Option<String>,
    pub is_active: bool,
    pub path: String,
    pub depth: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: organization::Model) -> OrganizationRow {
    OrganizationRow {
        id: m.id,
        name: m.name,
        short_name: m.short_name,
        abbreviation: m.abbreviation,
        level: m.level,
        parent_id: m.parent_id,
        is_active: m.is_active,
        path: m.path,
        depth: m.depth,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl RecordStore {
    /// 插入组织节点，维护物化路径不变式：
    /// 非根节点 path = 父节点 path + '/' + 自身 id，depth = 父 depth + 1。
    pub async fn insert_organization(
        &self,
        name: &str,
        short_name: Option<&str>,
        abbreviation: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<OrganizationRow> {
        let id = fedlens_common::id::next_id();
        let (path, depth, level) = match parent_id {
            Some(pid) => {
                let parent = Entity::find_by_id(pid)
                    .one(self.db())
                    .await?
                    .ok_or_else(|| anyhow!("Parent organization not found: {}", pid))?;
                (
                    format!("{}/{}", parent.path, id),
                    parent.depth + 1,
                    parent.level + 1,
                )
            }
            None => (format!("/{id}"), 0, 0),
        };
        let now = Utc::now().fixed_offset();
        let am = organization::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            short_name: Set(short_name.map(|s| s.to_string())),
            abbreviation: Set(abbreviation.map(|s| s.to_string())),
            level: Set(level),
            parent_id: Set(parent_id.map(|s| s.to_string())),
            is_active: Set(true),
            path: Set(path),
            depth: Set(depth),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_organization_by_id(&self, id: &str) -> Result<Option<OrganizationRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    /// 根节点（parent_id 为空）或某节点的直接子节点。
    pub async fn list_organization_children(
        &self,
        parent_id: Option<&str>,
    ) -> Result<Vec<OrganizationRow>> {
        let mut q = Entity::find().filter(Column::IsActive.eq(true));
        q = match parent_id {
            Some(pid) => q.filter(Column::ParentId.eq(pid)),
            None => q.filter(Column::ParentId.is_null()),
        };
        let rows = q.order_by(Column::Name, Order::Asc).all(self.db()).await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn list_all_organizations(&self) -> Result<Vec<OrganizationRow>> {
        let rows = Entity::find()
            .filter(Column::IsActive.eq(true))
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    /// 祖先链从物化路径解析，根在前、不含自身。
    pub async fn list_organization_ancestors(&self, id: &str) -> Result<Vec<OrganizationRow>> {
        let model = Entity::find_by_id(id)
            .one(self.db())
            .await?
            .ok_or_else(|| anyhow!("Organization not found: {}", id))?;
        let ancestor_ids: Vec<String> = model
            .path
            .split('/')
            .filter(|seg| !seg.is_empty() && *seg != id)
            .map(|seg| seg.to_string())
            .collect();
        if ancestor_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = Entity::find()
            .filter(Column::Id.is_in(ancestor_ids))
            .order_by(Column::Depth, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    /// 后代按路径前缀查询，不含自身。
    pub async fn list_organization_descendants(&self, id: &str) -> Result<Vec<OrganizationRow>> {
        let model = Entity::find_by_id(id)
            .one(self.db())
            .await?
            .ok_or_else(|| anyhow!("Organization not found: {}", id))?;
        let prefix = format!("{}/", model.path);
        let rows = Entity::find()
            .filter(Column::Path.starts_with(&prefix))
            .order_by(Column::Path, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_organizations(&self) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::IsActive.eq(true))
            .count(self.db())
            .await?)
    }
}
