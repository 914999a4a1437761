use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Statement,
};
use serde::{Deserialize, Serialize};

use crate::entities::authorization::{self, Column as AuthCol, Entity as AuthEntity};
use crate::entities::product::{self, Column, Entity};
use crate::entities::service_analysis::{self, Column as AnalysisCol, Entity as AnalysisEntity};
use crate::store::{RecordStore, SortDirection};

/// FedRAMP 云产品数据行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: String,
    pub fedramp_id: String,
    pub provider_name: String,
    pub offering_name: String,
    pub service_model: Option<String>,
    pub status: String,
    pub authorization_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 产品 AI 能力分析（service_analyses 表，按 fedramp_id 1:1）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAnalysisRow {
    pub id: String,
    pub fedramp_id: String,
    pub has_ai_features: bool,
    pub has_llm: bool,
    pub has_chatbot: bool,
    pub has_classic_ml: bool,
    pub ai_summary: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// 机构授权记录（每个授权机构一行）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRow {
    pub id: String,
    pub fedramp_id: String,
    pub organization_id: Option<String>,
    pub parent_agency_name: String,
    pub sub_agency_name: Option<String>,
    pub ato_issuance_date: Option<String>,
    pub ato_expiration_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 产品列表过滤器
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub provider_eq: Option<String>,
    pub status_eq: Option<String>,
    pub has_ai: Option<bool>,
    pub search: Option<String>,
}

/// 产品列表允许的排序字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Offering,
    Provider,
    Status,
    AuthorizationDate,
    CreatedAt,
}

impl ProductSort {
    fn column(self) -> Column {
        match self {
            ProductSort::Offering => Column::OfferingName,
            ProductSort::Provider => Column::ProviderName,
            ProductSort::Status => Column::Status,
            ProductSort::AuthorizationDate => Column::AuthorizationDate,
            ProductSort::CreatedAt => Column::CreatedAt,
        }
    }
}

/// 产品总体统计（仪表盘用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductSummary {
    pub total: u64,
    pub with_ai_features: u64,
    pub distinct_providers: u64,
    pub authorizations: u64,
}

fn to_row(m: product::Model) -> ProductRow {
    ProductRow {
        id: m.id,
        fedramp_id: m.fedramp_id,
        provider_name: m.provider_name,
        offering_name: m.offering_name,
        service_model: m.service_model,
        status: m.status,
        authorization_date: m.authorization_date,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn analysis_to_row(m: service_analysis::Model) -> ServiceAnalysisRow {
    ServiceAnalysisRow {
        id: m.id,
        fedramp_id: m.fedramp_id,
        has_ai_features: m.has_ai_features,
        has_llm: m.has_llm,
        has_chatbot: m.has_chatbot,
        has_classic_ml: m.has_classic_ml,
        ai_summary: m.ai_summary,
        analyzed_at: m.analyzed_at.with_timezone(&Utc),
    }
}

fn auth_to_row(m: authorization::Model) -> AuthorizationRow {
    // 库里空串代表"无子机构"，视图模型还原成 None
    let sub_agency_name = if m.sub_agency_name.is_empty() {
        None
    } else {
        Some(m.sub_agency_name)
    };
    AuthorizationRow {
        id: m.id,
        fedramp_id: m.fedramp_id,
        organization_id: m.organization_id,
        parent_agency_name: m.parent_agency_name,
        sub_agency_name,
        ato_issuance_date: m.ato_issuance_date,
        ato_expiration_date: m.ato_expiration_date,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn apply_filter(mut q: sea_orm::Select<Entity>, filter: &ProductFilter) -> sea_orm::Select<Entity> {
    if let Some(provider) = &filter.provider_eq {
        q = q.filter(Column::ProviderName.eq(provider));
    }
    if let Some(status) = &filter.status_eq {
        q = q.filter(Column::Status.eq(status));
    }
    if let Some(has_ai) = filter.has_ai {
        // AI 能力挂在 service_analyses 上，用子查询过滤
        let sub = Query::select()
            .column(AnalysisCol::FedrampId)
            .from(AnalysisEntity)
            .and_where(AnalysisCol::HasAiFeatures.eq(true))
            .to_owned();
        if has_ai {
            q = q.filter(Column::FedrampId.in_subquery(sub));
        } else {
            q = q.filter(Column::FedrampId.not_in_subquery(sub));
        }
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        q = q.filter(
            Condition::any()
                .add(Column::ProviderName.contains(search))
                .add(Column::OfferingName.contains(search))
                .add(Column::FedrampId.contains(search)),
        );
    }
    q
}

impl RecordStore {
    // ---- products ----

    pub async fn upsert_product(&self, row: &ProductRow) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let am = product::ActiveModel {
            id: Set(row.id.clone()),
            fedramp_id: Set(row.fedramp_id.clone()),
            provider_name: Set(row.provider_name.clone()),
            offering_name: Set(row.offering_name.clone()),
            service_model: Set(row.service_model.clone()),
            status: Set(row.status.clone()),
            authorization_date: Set(row.authorization_date.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Entity::insert(am)
            .on_conflict(
                OnConflict::column(Column::FedrampId)
                    .update_columns([
                        Column::ProviderName,
                        Column::OfferingName,
                        Column::ServiceModel,
                        Column::Status,
                        Column::AuthorizationDate,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db())
            .await?;
        Ok(())
    }

    pub async fn get_product_by_fedramp_id(&self, fedramp_id: &str) -> Result<Option<ProductRow>> {
        let model = Entity::find()
            .filter(Column::FedrampId.eq(fedramp_id))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        direction: SortDirection,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ProductRow>> {
        let order: Order = direction.into();
        let mut q = apply_filter(Entity::find(), filter).order_by(sort.column(), order);
        if limit != usize::MAX {
            q = q.limit(limit as u64).offset(offset as u64);
        }
        let rows = q.all(self.db()).await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_products(&self, filter: &ProductFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    // ---- service_analyses ----

    pub async fn upsert_service_analysis(&self, row: &ServiceAnalysisRow) -> Result<()> {
        let am = service_analysis::ActiveModel {
            id: Set(row.id.clone()),
            fedramp_id: Set(row.fedramp_id.clone()),
            has_ai_features: Set(row.has_ai_features),
            has_llm: Set(row.has_llm),
            has_chatbot: Set(row.has_chatbot),
            has_classic_ml: Set(row.has_classic_ml),
            ai_summary: Set(row.ai_summary.clone()),
            analyzed_at: Set(row.analyzed_at.fixed_offset()),
        };
        AnalysisEntity::insert(am)
            .on_conflict(
                OnConflict::column(AnalysisCol::FedrampId)
                    .update_columns([
                        AnalysisCol::HasAiFeatures,
                        AnalysisCol::HasLlm,
                        AnalysisCol::HasChatbot,
                        AnalysisCol::HasClassicMl,
                        AnalysisCol::AiSummary,
                        AnalysisCol::AnalyzedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db())
            .await?;
        Ok(())
    }

    pub async fn get_service_analysis(&self, fedramp_id: &str) -> Result<Option<ServiceAnalysisRow>> {
        let model = AnalysisEntity::find()
            .filter(AnalysisCol::FedrampId.eq(fedramp_id))
            .one(self.db())
            .await?;
        Ok(model.map(analysis_to_row))
    }

    // ---- product_authorizations ----

    pub async fn upsert_authorization(&self, row: &AuthorizationRow) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let am = authorization::ActiveModel {
            id: Set(row.id.clone()),
            fedramp_id: Set(row.fedramp_id.clone()),
            organization_id: Set(row.organization_id.clone()),
            parent_agency_name: Set(row.parent_agency_name.clone()),
            sub_agency_name: Set(row.sub_agency_name.clone().unwrap_or_default()),
            ato_issuance_date: Set(row.ato_issuance_date.clone()),
            ato_expiration_date: Set(row.ato_expiration_date.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        AuthEntity::insert(am)
            .on_conflict(
                OnConflict::columns([
                    AuthCol::FedrampId,
                    AuthCol::ParentAgencyName,
                    AuthCol::SubAgencyName,
                ])
                .update_columns([
                    AuthCol::OrganizationId,
                    AuthCol::AtoIssuanceDate,
                    AuthCol::AtoExpirationDate,
                    AuthCol::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(self.db())
            .await?;
        Ok(())
    }

    pub async fn list_authorizations_for_product(
        &self,
        fedramp_id: &str,
    ) -> Result<Vec<AuthorizationRow>> {
        let rows = AuthEntity::find()
            .filter(AuthCol::FedrampId.eq(fedramp_id))
            .order_by(AuthCol::ParentAgencyName, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(auth_to_row).collect())
    }

    pub async fn count_authorizations(&self) -> Result<u64> {
        Ok(AuthEntity::find().count(self.db()).await?)
    }

    pub async fn list_all_authorizations(&self) -> Result<Vec<AuthorizationRow>> {
        let rows = AuthEntity::find()
            .order_by(AuthCol::Id, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(auth_to_row).collect())
    }

    pub async fn list_all_service_analyses(&self) -> Result<Vec<ServiceAnalysisRow>> {
        let rows = AnalysisEntity::find()
            .order_by(AnalysisCol::Id, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(analysis_to_row).collect())
    }

    pub async fn product_summary(&self) -> Result<ProductSummary> {
        let sql = "SELECT
                (SELECT COUNT(*) FROM products) AS total,
                (SELECT COUNT(*) FROM service_analyses WHERE has_ai_features = 1) AS with_ai,
                (SELECT COUNT(DISTINCT provider_name) FROM products) AS providers,
                (SELECT COUNT(*) FROM product_authorizations) AS authorizations";
        let rows = self
            .db()
            .query_all(Statement::from_string(
                self.db().get_database_backend(),
                sql.to_string(),
            ))
            .await?;
        if let Some(row) = rows.into_iter().next() {
            let total: i64 = row.try_get("", "total")?;
            let with_ai: i64 = row.try_get("", "with_ai")?;
            let providers: i64 = row.try_get("", "providers")?;
            let authorizations: i64 = row.try_get("", "authorizations")?;
            Ok(ProductSummary {
                total: total as u64,
                with_ai_features: with_ai as u64,
                distinct_providers: providers as u64,
                authorizations: authorizations as u64,
            })
        } else {
            Ok(ProductSummary::default())
        }
    }
}
