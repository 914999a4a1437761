use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::incident::{self, Column, Entity};
use crate::entities::incident_security::{self, Column as SecCol, Entity as SecEntity};
use crate::store::{RecordStore, SortDirection};

/// AI 事件数据行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub occurred_on: Option<String>,
    pub deployers: Vec<String>,
    pub developers: Vec<String>,
    pub harmed_parties: Vec<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 事件安全增强信息（incident_security 表，1:1 可选）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentSecurityRow {
    pub incident_id: String,
    pub is_data_leak: bool,
    pub is_attack: bool,
    pub attack_type: Option<String>,
    pub leak_type: Option<String>,
    pub taxonomy: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 事件列表过滤器
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentFilter {
    pub search: Option<String>,
    pub is_data_leak: Option<bool>,
    pub is_attack: Option<bool>,
}

/// 事件列表允许的排序字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSort {
    Title,
    #[default]
    OccurredOn,
    CreatedAt,
}

impl IncidentSort {
    fn column(self) -> Column {
        match self {
            IncidentSort::Title => Column::Title,
            IncidentSort::OccurredOn => Column::OccurredOn,
            IncidentSort::CreatedAt => Column::CreatedAt,
        }
    }
}

/// 事件总体统计（仪表盘用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub total: u64,
    pub with_security_enrichment: u64,
    pub data_leaks: u64,
    pub attacks: u64,
}

fn parse_names(json: &str) -> Vec<String> {
    // 参与方列表存 JSON；坏数据当空列表
    serde_json::from_str(json).unwrap_or_default()
}

pub(crate) fn to_row(m: incident::Model) -> IncidentRow {
    IncidentRow {
        id: m.id,
        title: m.title,
        description: m.description,
        occurred_on: m.occurred_on,
        deployers: parse_names(&m.deployers),
        developers: parse_names(&m.developers),
        harmed_parties: parse_names(&m.harmed_parties),
        source_url: m.source_url,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn security_to_row(m: incident_security::Model) -> IncidentSecurityRow {
    IncidentSecurityRow {
        incident_id: m.incident_id,
        is_data_leak: m.is_data_leak,
        is_attack: m.is_attack,
        attack_type: m.attack_type,
        leak_type: m.leak_type,
        taxonomy: m.taxonomy,
        notes: m.notes,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn apply_filter(
    mut q: sea_orm::Select<Entity>,
    filter: &IncidentFilter,
) -> sea_orm::Select<Entity> {
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        q = q.filter(
            Condition::any()
                .add(Column::Title.contains(search))
                .add(Column::Description.contains(search)),
        );
    }
    // 泄露/攻击标记挂在 incident_security 上，用子查询过滤
    if let Some(v) = filter.is_data_leak {
        let sub = Query::select()
            .column(SecCol::IncidentId)
            .from(SecEntity)
            .and_where(SecCol::IsDataLeak.eq(true))
            .to_owned();
        if v {
            q = q.filter(Column::Id.in_subquery(sub));
        } else {
            q = q.filter(Column::Id.not_in_subquery(sub));
        }
    }
    if let Some(v) = filter.is_attack {
        let sub = Query::select()
            .column(SecCol::IncidentId)
            .from(SecEntity)
            .and_where(SecCol::IsAttack.eq(true))
            .to_owned();
        if v {
            q = q.filter(Column::Id.in_subquery(sub));
        } else {
            q = q.filter(Column::Id.not_in_subquery(sub));
        }
    }
    q
}

async fn insert_incident_on<C: ConnectionTrait>(
    conn: &C,
    row: &IncidentRow,
) -> Result<incident::Model> {
    let now = Utc::now().fixed_offset();
    let am = incident::ActiveModel {
        id: Set(row.id.clone()),
        title: Set(row.title.clone()),
        description: Set(row.description.clone()),
        occurred_on: Set(row.occurred_on.clone()),
        deployers: Set(serde_json::to_string(&row.deployers)?),
        developers: Set(serde_json::to_string(&row.developers)?),
        harmed_parties: Set(serde_json::to_string(&row.harmed_parties)?),
        source_url: Set(row.source_url.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(am.insert(conn).await?)
}

async fn upsert_security_on<C: ConnectionTrait>(
    conn: &C,
    row: &IncidentSecurityRow,
) -> Result<()> {
    let now = Utc::now().fixed_offset();
    let am = incident_security::ActiveModel {
        incident_id: Set(row.incident_id.clone()),
        is_data_leak: Set(row.is_data_leak),
        is_attack: Set(row.is_attack),
        attack_type: Set(row.attack_type.clone()),
        leak_type: Set(row.leak_type.clone()),
        taxonomy: Set(row.taxonomy.clone()),
        notes: Set(row.notes.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    SecEntity::insert(am)
        .on_conflict(
            OnConflict::column(SecCol::IncidentId)
                .update_columns([
                    SecCol::IsDataLeak,
                    SecCol::IsAttack,
                    SecCol::AttackType,
                    SecCol::LeakType,
                    SecCol::Taxonomy,
                    SecCol::Notes,
                    SecCol::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(conn)
        .await?;
    Ok(())
}

impl RecordStore {
    pub async fn insert_incident(&self, row: &IncidentRow) -> Result<IncidentRow> {
        let model = insert_incident_on(self.db(), row).await?;
        Ok(to_row(model))
    }

    /// 库间迁移的批量写入：整批事件（含安全增强行）与断点同事务提交，
    /// 中途失败整批回滚，重跑从断点之后继续，不产生重复行。
    pub async fn insert_incident_batch_checkpointed(
        &self,
        batch: &[(IncidentRow, Option<IncidentSecurityRow>)],
        migrated_total: i64,
    ) -> Result<()> {
        let Some((last, _)) = batch.last() else {
            return Ok(());
        };
        let txn = self.db().begin().await?;
        for (row, security) in batch {
            insert_incident_on(&txn, row).await?;
            if let Some(security) = security {
                upsert_security_on(&txn, security).await?;
            }
        }
        crate::store::checkpoint::upsert_checkpoint_on(
            &txn,
            "incidents",
            &last.id,
            migrated_total,
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn get_incident_by_id(&self, id: &str) -> Result<Option<IncidentRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn list_incidents(
        &self,
        filter: &IncidentFilter,
        sort: IncidentSort,
        direction: SortDirection,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<IncidentRow>> {
        let order: Order = direction.into();
        let mut q = apply_filter(Entity::find(), filter).order_by(sort.column(), order);
        if limit != usize::MAX {
            q = q.limit(limit as u64).offset(offset as u64);
        }
        let rows = q.all(self.db()).await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_incidents(&self, filter: &IncidentFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    pub async fn upsert_incident_security(&self, row: &IncidentSecurityRow) -> Result<()> {
        upsert_security_on(self.db(), row).await
    }

    pub async fn get_incident_security(
        &self,
        incident_id: &str,
    ) -> Result<Option<IncidentSecurityRow>> {
        let model = SecEntity::find_by_id(incident_id).one(self.db()).await?;
        Ok(model.map(security_to_row))
    }

    pub async fn incident_summary(&self) -> Result<IncidentSummary> {
        let total = Entity::find().count(self.db()).await?;
        let with_security = SecEntity::find().count(self.db()).await?;
        let data_leaks = SecEntity::find()
            .filter(SecCol::IsDataLeak.eq(true))
            .count(self.db())
            .await?;
        let attacks = SecEntity::find()
            .filter(SecCol::IsAttack.eq(true))
            .count(self.db())
            .await?;
        Ok(IncidentSummary {
            total,
            with_security_enrichment: with_security,
            data_leaks,
            attacks,
        })
    }
}
