use anyhow::Result;
use chrono::{DateTime, Utc};
use fedlens_common::types::EntityRole;
use fedlens_match::text::normalize_name;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::entity_record::{self, Column, Entity};
use crate::entities::incident_entity::{self, Column as LinkCol, Entity as LinkEntity};
use crate::store::incident::IncidentRow;
use crate::store::RecordStore;

/// 实体（规范化的组织/个人名称）数据行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 实体列表过滤器
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFilter {
    pub search: Option<String>,
}

/// 事件-实体关联（带角色标记）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentEntityLink {
    pub incident_id: String,
    pub entity_id: String,
    pub role: String,
}

fn to_row(m: entity_record::Model) -> EntityRow {
    EntityRow {
        id: m.id,
        name: m.name,
        normalized_name: m.normalized_name,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl RecordStore {
    /// 按规范化名称取或建实体。同名（规范化后）只存一行。
    pub async fn get_or_create_entity(&self, raw_name: &str) -> Result<EntityRow> {
        let normalized = normalize_name(raw_name);
        if let Some(existing) = Entity::find()
            .filter(Column::NormalizedName.eq(&normalized))
            .one(self.db())
            .await?
        {
            return Ok(to_row(existing));
        }
        let now = Utc::now().fixed_offset();
        let am = entity_record::ActiveModel {
            id: Set(fedlens_common::id::next_id()),
            name: Set(raw_name.trim().to_string()),
            normalized_name: Set(normalized),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_entity_by_id(&self, id: &str) -> Result<Option<EntityRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn list_entities(
        &self,
        filter: &EntityFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EntityRow>> {
        let mut q = Entity::find();
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            q = q.filter(Column::Name.contains(search));
        }
        let mut q = q.order_by(Column::Name, Order::Asc);
        if limit != usize::MAX {
            q = q.limit(limit as u64).offset(offset as u64);
        }
        let rows = q.all(self.db()).await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_entities(&self, filter: &EntityFilter) -> Result<u64> {
        let mut q = Entity::find();
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            q = q.filter(Column::Name.contains(search));
        }
        Ok(q.count(self.db()).await?)
    }

    pub async fn list_all_entities(&self) -> Result<Vec<EntityRow>> {
        let rows = Entity::find()
            .order_by(Column::NormalizedName, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    /// 事件与实体建立角色关联；重复关联幂等跳过。
    pub async fn link_entity_to_incident(
        &self,
        incident_id: &str,
        entity_id: &str,
        role: EntityRole,
    ) -> Result<()> {
        let am = incident_entity::ActiveModel {
            id: Set(fedlens_common::id::next_id()),
            incident_id: Set(incident_id.to_string()),
            entity_id: Set(entity_id.to_string()),
            role: Set(role.as_str().to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let insert = LinkEntity::insert(am).on_conflict(
            OnConflict::columns([LinkCol::IncidentId, LinkCol::EntityId, LinkCol::Role])
                .do_nothing()
                .to_owned(),
        );
        match insert.exec(self.db()).await {
            Ok(_) => Ok(()),
            Err(sea_orm::DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_entity_links_for_incident(
        &self,
        incident_id: &str,
    ) -> Result<Vec<IncidentEntityLink>> {
        let rows = LinkEntity::find()
            .filter(LinkCol::IncidentId.eq(incident_id))
            .all(self.db())
            .await?;
        Ok(rows
            .into_iter()
            .map(|m| IncidentEntityLink {
                incident_id: m.incident_id,
                entity_id: m.entity_id,
                role: m.role,
            })
            .collect())
    }

    /// 某实体参与过的全部事件（按发生时间倒序）。
    pub async fn list_incidents_for_entity(&self, entity_id: &str) -> Result<Vec<IncidentRow>> {
        let links = LinkEntity::find()
            .filter(LinkCol::EntityId.eq(entity_id))
            .all(self.db())
            .await?;
        let incident_ids: Vec<String> = links.into_iter().map(|l| l.incident_id).collect();
        if incident_ids.is_empty() {
            return Ok(Vec::new());
        }
        use crate::entities::incident::{Column as IncCol, Entity as IncEntity};
        let rows = IncEntity::find()
            .filter(IncCol::Id.is_in(incident_ids))
            .order_by(IncCol::OccurredOn, Order::Desc)
            .all(self.db())
            .await?;
        Ok(rows
            .into_iter()
            .map(crate::store::incident::to_row)
            .collect())
    }
}
