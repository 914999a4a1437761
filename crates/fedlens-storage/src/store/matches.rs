use anyhow::Result;
use chrono::{DateTime, Utc};
use fedlens_match::hybrid::{TextHit, VectorHit};
use fedlens_match::{Confidence, NameMatch};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::entities::{
    entity_product_match, incident_product_match, incident_use_case_match, use_case_product_match,
};
use crate::store::RecordStore;

/// 跨记录匹配数据行（四张匹配表共用一个视图模型）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRow {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub match_type: String,
    pub confidence: String,
    pub match_reason: Option<String>,
    pub similarity_score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

impl MatchRow {
    /// 拆成混排输入：有相似度分数的行进向量侧，文本/混合行进文本侧。
    pub fn split_hits(rows: &[MatchRow]) -> (Vec<VectorHit>, Vec<TextHit>) {
        let mut vector_hits = Vec::new();
        let mut text_hits = Vec::new();
        for row in rows {
            if let Some(score) = row.similarity_score {
                vector_hits.push(VectorHit {
                    target_id: row.target_id.clone(),
                    score,
                });
            }
            if row.match_type != "vector" {
                if let Ok(confidence) = row.confidence.parse::<Confidence>() {
                    text_hits.push(TextHit {
                        target_id: row.target_id.clone(),
                        confidence,
                        reason: row.match_reason.clone().unwrap_or_default(),
                    });
                }
            }
        }
        (vector_hits, text_hits)
    }
}

/// 四张匹配表的行数统计（仪表盘用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchSummary {
    pub incident_product: u64,
    pub incident_use_case: u64,
    pub entity_product: u64,
    pub use_case_product: u64,
}

/// 分数到置信度的映射：生成脚本保证"置信度随分数单调"的约定。
pub(crate) fn confidence_for_score(score: f32) -> Confidence {
    if score >= 0.85 {
        Confidence::High
    } else if score >= 0.70 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

impl RecordStore {
    // ---- incident_product_matches ----

    /// 写入文本匹配。同键已有向量行时改标 hybrid 并保留向量分数。
    pub async fn upsert_incident_product_text_match(
        &self,
        incident_id: &str,
        fedramp_id: &str,
        m: &NameMatch,
    ) -> Result<()> {
        use crate::entities::incident_product_match::{ActiveModel, Column, Entity};
        let existing = Entity::find()
            .filter(Column::IncidentId.eq(incident_id))
            .filter(Column::FedrampId.eq(fedramp_id))
            .one(self.db())
            .await?;
        match existing {
            Some(model) => {
                let is_vector = model.similarity_score.is_some();
                let mut am: ActiveModel = model.into();
                am.match_type = Set(if is_vector { "hybrid" } else { "text" }.to_string());
                am.confidence = Set(m.confidence.as_str().to_string());
                am.match_reason = Set(Some(m.reason.clone()));
                am.update(self.db()).await?;
            }
            None => {
                let am = ActiveModel {
                    id: Set(fedlens_common::id::next_id()),
                    incident_id: Set(incident_id.to_string()),
                    fedramp_id: Set(fedramp_id.to_string()),
                    match_type: Set("text".to_string()),
                    confidence: Set(m.confidence.as_str().to_string()),
                    match_reason: Set(Some(m.reason.clone())),
                    similarity_score: Set(None),
                    created_at: Set(Utc::now().fixed_offset()),
                };
                am.insert(self.db()).await?;
            }
        }
        Ok(())
    }

    pub async fn upsert_incident_product_vector_score(
        &self,
        incident_id: &str,
        fedramp_id: &str,
        score: f32,
    ) -> Result<()> {
        use crate::entities::incident_product_match::{ActiveModel, Column, Entity};
        let existing = Entity::find()
            .filter(Column::IncidentId.eq(incident_id))
            .filter(Column::FedrampId.eq(fedramp_id))
            .one(self.db())
            .await?;
        match existing {
            Some(model) => {
                let was_text = model.match_type == "text";
                let mut am: ActiveModel = model.into();
                am.similarity_score = Set(Some(score));
                if was_text {
                    am.match_type = Set("hybrid".to_string());
                }
                am.update(self.db()).await?;
            }
            None => {
                let am = ActiveModel {
                    id: Set(fedlens_common::id::next_id()),
                    incident_id: Set(incident_id.to_string()),
                    fedramp_id: Set(fedramp_id.to_string()),
                    match_type: Set("vector".to_string()),
                    confidence: Set(confidence_for_score(score).as_str().to_string()),
                    match_reason: Set(None),
                    similarity_score: Set(Some(score)),
                    created_at: Set(Utc::now().fixed_offset()),
                };
                am.insert(self.db()).await?;
            }
        }
        Ok(())
    }

    pub async fn list_incident_product_matches_for_incident(
        &self,
        incident_id: &str,
    ) -> Result<Vec<MatchRow>> {
        use crate::entities::incident_product_match::{Column, Entity};
        let rows = Entity::find()
            .filter(Column::IncidentId.eq(incident_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows
            .into_iter()
            .map(|m| MatchRow {
                id: m.id,
                source_id: m.incident_id,
                target_id: m.fedramp_id,
                match_type: m.match_type,
                confidence: m.confidence,
                match_reason: m.match_reason,
                similarity_score: m.similarity_score,
                created_at: m.created_at.with_timezone(&Utc),
            })
            .collect())
    }

    pub async fn list_incident_product_matches_for_product(
        &self,
        fedramp_id: &str,
    ) -> Result<Vec<MatchRow>> {
        use crate::entities::incident_product_match::{Column, Entity};
        let rows = Entity::find()
            .filter(Column::FedrampId.eq(fedramp_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows
            .into_iter()
            .map(|m| MatchRow {
                id: m.id,
                source_id: m.incident_id,
                target_id: m.fedramp_id,
                match_type: m.match_type,
                confidence: m.confidence,
                match_reason: m.match_reason,
                similarity_score: m.similarity_score,
                created_at: m.created_at.with_timezone(&Utc),
            })
            .collect())
    }

    /// 重新生成前清掉旧的纯文本匹配；向量/混合行保留分数。
    pub async fn clear_incident_product_text_matches(&self) -> Result<u64> {
        use crate::entities::incident_product_match::{Column, Entity};
        let res = Entity::delete_many()
            .filter(Column::MatchType.eq("text"))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    // ---- incident_use_case_matches ----

    pub async fn upsert_incident_use_case_text_match(
        &self,
        incident_id: &str,
        use_case_id: &str,
        m: &NameMatch,
    ) -> Result<()> {
        use crate::entities::incident_use_case_match::{ActiveModel, Column, Entity};
        let existing = Entity::find()
            .filter(Column::IncidentId.eq(incident_id))
            .filter(Column::UseCaseId.eq(use_case_id))
            .one(self.db())
            .await?;
        match existing {
            Some(model) => {
                let is_vector = model.similarity_score.is_some();
                let mut am: ActiveModel = model.into();
                am.match_type = Set(if is_vector { "hybrid" } else { "text" }.to_string());
                am.confidence = Set(m.confidence.as_str().to_string());
                am.match_reason = Set(Some(m.reason.clone()));
                am.update(self.db()).await?;
            }
            None => {
                let am = ActiveModel {
                    id: Set(fedlens_common::id::next_id()),
                    incident_id: Set(incident_id.to_string()),
                    use_case_id: Set(use_case_id.to_string()),
                    match_type: Set("text".to_string()),
                    confidence: Set(m.confidence.as_str().to_string()),
                    match_reason: Set(Some(m.reason.clone())),
                    similarity_score: Set(None),
                    created_at: Set(Utc::now().fixed_offset()),
                };
                am.insert(self.db()).await?;
            }
        }
        Ok(())
    }

    pub async fn upsert_incident_use_case_vector_score(
        &self,
        incident_id: &str,
        use_case_id: &str,
        score: f32,
    ) -> Result<()> {
        use crate::entities::incident_use_case_match::{ActiveModel, Column, Entity};
        let existing = Entity::find()
            .filter(Column::IncidentId.eq(incident_id))
            .filter(Column::UseCaseId.eq(use_case_id))
            .one(self.db())
            .await?;
        match existing {
            Some(model) => {
                let was_text = model.match_type == "text";
                let mut am: ActiveModel = model.into();
                am.similarity_score = Set(Some(score));
                if was_text {
                    am.match_type = Set("hybrid".to_string());
                }
                am.update(self.db()).await?;
            }
            None => {
                let am = ActiveModel {
                    id: Set(fedlens_common::id::next_id()),
                    incident_id: Set(incident_id.to_string()),
                    use_case_id: Set(use_case_id.to_string()),
                    match_type: Set("vector".to_string()),
                    confidence: Set(confidence_for_score(score).as_str().to_string()),
                    match_reason: Set(None),
                    similarity_score: Set(Some(score)),
                    created_at: Set(Utc::now().fixed_offset()),
                };
                am.insert(self.db()).await?;
            }
        }
        Ok(())
    }

    pub async fn list_incident_use_case_matches_for_use_case(
        &self,
        use_case_id: &str,
    ) -> Result<Vec<MatchRow>> {
        use crate::entities::incident_use_case_match::{Column, Entity};
        let rows = Entity::find()
            .filter(Column::UseCaseId.eq(use_case_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows
            .into_iter()
            .map(|m| MatchRow {
                id: m.id,
                source_id: m.use_case_id,
                target_id: m.incident_id,
                match_type: m.match_type,
                confidence: m.confidence,
                match_reason: m.match_reason,
                similarity_score: m.similarity_score,
                created_at: m.created_at.with_timezone(&Utc),
            })
            .collect())
    }

    pub async fn clear_incident_use_case_text_matches(&self) -> Result<u64> {
        use crate::entities::incident_use_case_match::{Column, Entity};
        let res = Entity::delete_many()
            .filter(Column::MatchType.eq("text"))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    // ---- entity_product_matches ----

    pub async fn upsert_entity_product_text_match(
        &self,
        entity_id: &str,
        fedramp_id: &str,
        m: &NameMatch,
    ) -> Result<()> {
        use crate::entities::entity_product_match::{ActiveModel, Column, Entity};
        let existing = Entity::find()
            .filter(Column::EntityId.eq(entity_id))
            .filter(Column::FedrampId.eq(fedramp_id))
            .one(self.db())
            .await?;
        match existing {
            Some(model) => {
                let is_vector = model.similarity_score.is_some();
                let mut am: ActiveModel = model.into();
                am.match_type = Set(if is_vector { "hybrid" } else { "text" }.to_string());
                am.confidence = Set(m.confidence.as_str().to_string());
                am.match_reason = Set(Some(m.reason.clone()));
                am.update(self.db()).await?;
            }
            None => {
                let am = ActiveModel {
                    id: Set(fedlens_common::id::next_id()),
                    entity_id: Set(entity_id.to_string()),
                    fedramp_id: Set(fedramp_id.to_string()),
                    match_type: Set("text".to_string()),
                    confidence: Set(m.confidence.as_str().to_string()),
                    match_reason: Set(Some(m.reason.clone())),
                    similarity_score: Set(None),
                    created_at: Set(Utc::now().fixed_offset()),
                };
                am.insert(self.db()).await?;
            }
        }
        Ok(())
    }

    pub async fn list_entity_product_matches_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<MatchRow>> {
        use crate::entities::entity_product_match::{Column, Entity};
        let rows = Entity::find()
            .filter(Column::EntityId.eq(entity_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows
            .into_iter()
            .map(|m| MatchRow {
                id: m.id,
                source_id: m.entity_id,
                target_id: m.fedramp_id,
                match_type: m.match_type,
                confidence: m.confidence,
                match_reason: m.match_reason,
                similarity_score: m.similarity_score,
                created_at: m.created_at.with_timezone(&Utc),
            })
            .collect())
    }

    pub async fn clear_entity_product_text_matches(&self) -> Result<u64> {
        use crate::entities::entity_product_match::{Column, Entity};
        let res = Entity::delete_many()
            .filter(Column::MatchType.eq("text"))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    // ---- use_case_product_matches ----

    pub async fn upsert_use_case_product_text_match(
        &self,
        use_case_id: &str,
        fedramp_id: &str,
        m: &NameMatch,
    ) -> Result<()> {
        use crate::entities::use_case_product_match::{ActiveModel, Column, Entity};
        let existing = Entity::find()
            .filter(Column::UseCaseId.eq(use_case_id))
            .filter(Column::FedrampId.eq(fedramp_id))
            .one(self.db())
            .await?;
        match existing {
            Some(model) => {
                let is_vector = model.similarity_score.is_some();
                let mut am: ActiveModel = model.into();
                am.match_type = Set(if is_vector { "hybrid" } else { "text" }.to_string());
                am.confidence = Set(m.confidence.as_str().to_string());
                am.match_reason = Set(Some(m.reason.clone()));
                am.update(self.db()).await?;
            }
            None => {
                let am = ActiveModel {
                    id: Set(fedlens_common::id::next_id()),
                    use_case_id: Set(use_case_id.to_string()),
                    fedramp_id: Set(fedramp_id.to_string()),
                    match_type: Set("text".to_string()),
                    confidence: Set(m.confidence.as_str().to_string()),
                    match_reason: Set(Some(m.reason.clone())),
                    similarity_score: Set(None),
                    created_at: Set(Utc::now().fixed_offset()),
                };
                am.insert(self.db()).await?;
            }
        }
        Ok(())
    }

    pub async fn list_use_case_product_matches_for_use_case(
        &self,
        use_case_id: &str,
    ) -> Result<Vec<MatchRow>> {
        use crate::entities::use_case_product_match::{Column, Entity};
        let rows = Entity::find()
            .filter(Column::UseCaseId.eq(use_case_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows
            .into_iter()
            .map(|m| MatchRow {
                id: m.id,
                source_id: m.use_case_id,
                target_id: m.fedramp_id,
                match_type: m.match_type,
                confidence: m.confidence,
                match_reason: m.match_reason,
                similarity_score: m.similarity_score,
                created_at: m.created_at.with_timezone(&Utc),
            })
            .collect())
    }

    pub async fn clear_use_case_product_text_matches(&self) -> Result<u64> {
        use crate::entities::use_case_product_match::{Column, Entity};
        let res = Entity::delete_many()
            .filter(Column::MatchType.eq("text"))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    // ---- 汇总 ----

    pub async fn match_summary(&self) -> Result<MatchSummary> {
        Ok(MatchSummary {
            incident_product: incident_product_match::Entity::find()
                .count(self.db())
                .await?,
            incident_use_case: incident_use_case_match::Entity::find()
                .count(self.db())
                .await?,
            entity_product: entity_product_match::Entity::find()
                .count(self.db())
                .await?,
            use_case_product: use_case_product_match::Entity::find()
                .count(self.db())
                .await?,
        })
    }
}
