use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::use_case::{self, Column, Entity};
use crate::entities::use_case_detail::{self, Entity as DetailEntity};
use crate::store::{RecordStore, SortDirection};

/// AI 用例数据行（来自 ai_use_cases 表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseCaseRow {
    pub id: String,
    pub use_case_name: String,
    pub agency: String,
    pub agency_abbreviation: Option<String>,
    pub bureau: Option<String>,
    pub topic_area: Option<String>,
    pub intended_purpose: Option<String>,
    pub outputs: Option<String>,
    pub stage_of_development: Option<String>,
    pub rights_safety_impacting: Option<String>,
    pub domain_category: Option<String>,
    pub date_initiated: Option<String>,
    pub date_implemented: Option<String>,
    pub date_retired: Option<String>,
    pub has_llm: bool,
    pub has_genai: bool,
    pub has_chatbot: bool,
    pub has_coding_assistant: bool,
    pub has_coding_agent: bool,
    pub has_classic_ml: bool,
    pub has_rpa: bool,
    pub has_rules: bool,
    pub providers_detected: Vec<String>,
    pub commercial_product: Option<String>,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 用例扩展信息（use_case_details 表，1:1）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UseCaseDetailRow {
    pub development_approach: Option<String>,
    pub procurement_instrument: Option<String>,
    pub supports_hisp: Option<String>,
    pub disseminates_to_public: Option<String>,
    pub involves_pii: Option<String>,
    pub privacy_assessed: Option<String>,
    pub has_custom_code: Option<String>,
    pub code_link: Option<String>,
    pub has_ato: Option<String>,
    pub system_name: Option<String>,
    pub impact_assessment: Option<String>,
    pub operational_testing: Option<String>,
    pub key_risks: Option<String>,
    pub performance_monitoring: Option<String>,
    pub autonomous_decision: Option<String>,
    pub fallback_process: Option<String>,
    pub opt_out_mechanism: Option<String>,
    pub search_text: Option<String>,
}

/// 用例列表过滤器。提供的条件之间取 AND；search 在固定多列上取 OR。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UseCaseFilter {
    pub agency_eq: Option<String>,
    pub bureau_eq: Option<String>,
    pub domain_eq: Option<String>,
    pub stage_eq: Option<String>,
    pub search: Option<String>,
    pub has_llm: Option<bool>,
    pub has_genai: Option<bool>,
    pub has_chatbot: Option<bool>,
    pub has_coding_assistant: Option<bool>,
    pub has_coding_agent: Option<bool>,
    pub has_classic_ml: Option<bool>,
    pub has_rpa: Option<bool>,
    pub has_rules: Option<bool>,
}

/// 用例列表允许的排序字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCaseSort {
    #[default]
    Name,
    Agency,
    Stage,
    DateImplemented,
    CreatedAt,
}

impl UseCaseSort {
    fn column(self) -> Column {
        match self {
            UseCaseSort::Name => Column::UseCaseName,
            UseCaseSort::Agency => Column::Agency,
            UseCaseSort::Stage => Column::StageOfDevelopment,
            UseCaseSort::DateImplemented => Column::DateImplemented,
            UseCaseSort::CreatedAt => Column::CreatedAt,
        }
    }
}

/// 同步任务用的能力标记更新
#[derive(Debug, Clone, PartialEq)]
pub struct UseCaseUpdate {
    pub has_llm: bool,
    pub has_genai: bool,
    pub has_chatbot: bool,
    pub has_coding_assistant: bool,
    pub has_coding_agent: bool,
    pub has_classic_ml: bool,
    pub has_rpa: bool,
    pub has_rules: bool,
    pub providers_detected: Vec<String>,
}

impl UseCaseUpdate {
    /// 与现有行比较，判断是否需要写库。
    pub fn differs_from(&self, row: &UseCaseRow) -> bool {
        self.has_llm != row.has_llm
            || self.has_genai != row.has_genai
            || self.has_chatbot != row.has_chatbot
            || self.has_coding_assistant != row.has_coding_assistant
            || self.has_coding_agent != row.has_coding_agent
            || self.has_classic_ml != row.has_classic_ml
            || self.has_rpa != row.has_rpa
            || self.has_rules != row.has_rules
            || self.providers_detected != row.providers_detected
    }
}

/// 用例总体统计（仪表盘用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UseCaseSummary {
    pub total: u64,
    pub genai: u64,
    pub llm: u64,
    pub chatbot: u64,
    pub classic_ml: u64,
    pub distinct_agencies: u64,
    pub distinct_domains: u64,
}

fn to_row(m: use_case::Model) -> UseCaseRow {
    // 存储中的 providers JSON 防御性解析：坏数据当空列表
    let providers: Vec<String> = serde_json::from_str(&m.providers_detected).unwrap_or_default();
    UseCaseRow {
        id: m.id,
        use_case_name: m.use_case_name,
        agency: m.agency,
        agency_abbreviation: m.agency_abbreviation,
        bureau: m.bureau,
        topic_area: m.topic_area,
        intended_purpose: m.intended_purpose,
        outputs: m.outputs,
        stage_of_development: m.stage_of_development,
        rights_safety_impacting: m.rights_safety_impacting,
        domain_category: m.domain_category,
        date_initiated: m.date_initiated,
        date_implemented: m.date_implemented,
        date_retired: m.date_retired,
        has_llm: m.has_llm,
        has_genai: m.has_genai,
        has_chatbot: m.has_chatbot,
        has_coding_assistant: m.has_coding_assistant,
        has_coding_agent: m.has_coding_agent,
        has_classic_ml: m.has_classic_ml,
        has_rpa: m.has_rpa,
        has_rules: m.has_rules,
        providers_detected: providers,
        commercial_product: m.commercial_product,
        slug: m.slug,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn detail_to_row(m: use_case_detail::Model) -> UseCaseDetailRow {
    UseCaseDetailRow {
        development_approach: m.development_approach,
        procurement_instrument: m.procurement_instrument,
        supports_hisp: m.supports_hisp,
        disseminates_to_public: m.disseminates_to_public,
        involves_pii: m.involves_pii,
        privacy_assessed: m.privacy_assessed,
        has_custom_code: m.has_custom_code,
        code_link: m.code_link,
        has_ato: m.has_ato,
        system_name: m.system_name,
        impact_assessment: m.impact_assessment,
        operational_testing: m.operational_testing,
        key_risks: m.key_risks,
        performance_monitoring: m.performance_monitoring,
        autonomous_decision: m.autonomous_decision,
        fallback_process: m.fallback_process,
        opt_out_mechanism: m.opt_out_mechanism,
        search_text: m.search_text,
    }
}

fn apply_filter(
    mut q: sea_orm::Select<Entity>,
    filter: &UseCaseFilter,
) -> sea_orm::Select<Entity> {
    if let Some(agency) = &filter.agency_eq {
        q = q.filter(Column::Agency.eq(agency));
    }
    if let Some(bureau) = &filter.bureau_eq {
        q = q.filter(Column::Bureau.eq(bureau));
    }
    if let Some(domain) = &filter.domain_eq {
        q = q.filter(Column::DomainCategory.eq(domain));
    }
    if let Some(stage) = &filter.stage_eq {
        q = q.filter(Column::StageOfDevelopment.eq(stage));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        q = q.filter(
            Condition::any()
                .add(Column::UseCaseName.contains(search))
                .add(Column::Agency.contains(search))
                .add(Column::Bureau.contains(search))
                .add(Column::IntendedPurpose.contains(search))
                .add(Column::Outputs.contains(search)),
        );
    }
    let flags = [
        (filter.has_llm, Column::HasLlm),
        (filter.has_genai, Column::HasGenai),
        (filter.has_chatbot, Column::HasChatbot),
        (filter.has_coding_assistant, Column::HasCodingAssistant),
        (filter.has_coding_agent, Column::HasCodingAgent),
        (filter.has_classic_ml, Column::HasClassicMl),
        (filter.has_rpa, Column::HasRpa),
        (filter.has_rules, Column::HasRules),
    ];
    for (value, column) in flags {
        if let Some(v) = value {
            q = q.filter(column.eq(v));
        }
    }
    q
}

async fn insert_use_case_on<C: ConnectionTrait>(
    conn: &C,
    row: &UseCaseRow,
    detail: Option<&UseCaseDetailRow>,
) -> Result<use_case::Model> {
    let now = Utc::now().fixed_offset();
    let providers_json = serde_json::to_string(&row.providers_detected)?;
    let am = use_case::ActiveModel {
        id: Set(row.id.clone()),
        use_case_name: Set(row.use_case_name.clone()),
        agency: Set(row.agency.clone()),
        agency_abbreviation: Set(row.agency_abbreviation.clone()),
        bureau: Set(row.bureau.clone()),
        topic_area: Set(row.topic_area.clone()),
        intended_purpose: Set(row.intended_purpose.clone()),
        outputs: Set(row.outputs.clone()),
        stage_of_development: Set(row.stage_of_development.clone()),
        rights_safety_impacting: Set(row.rights_safety_impacting.clone()),
        domain_category: Set(row.domain_category.clone()),
        date_initiated: Set(row.date_initiated.clone()),
        date_implemented: Set(row.date_implemented.clone()),
        date_retired: Set(row.date_retired.clone()),
        has_llm: Set(row.has_llm),
        has_genai: Set(row.has_genai),
        has_chatbot: Set(row.has_chatbot),
        has_coding_assistant: Set(row.has_coding_assistant),
        has_coding_agent: Set(row.has_coding_agent),
        has_classic_ml: Set(row.has_classic_ml),
        has_rpa: Set(row.has_rpa),
        has_rules: Set(row.has_rules),
        providers_detected: Set(providers_json),
        commercial_product: Set(row.commercial_product.clone()),
        slug: Set(row.slug.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let model = am.insert(conn).await?;
    if let Some(d) = detail {
        let dm = use_case_detail::ActiveModel {
            use_case_id: Set(model.id.clone()),
            development_approach: Set(d.development_approach.clone()),
            procurement_instrument: Set(d.procurement_instrument.clone()),
            supports_hisp: Set(d.supports_hisp.clone()),
            disseminates_to_public: Set(d.disseminates_to_public.clone()),
            involves_pii: Set(d.involves_pii.clone()),
            privacy_assessed: Set(d.privacy_assessed.clone()),
            has_custom_code: Set(d.has_custom_code.clone()),
            code_link: Set(d.code_link.clone()),
            has_ato: Set(d.has_ato.clone()),
            system_name: Set(d.system_name.clone()),
            impact_assessment: Set(d.impact_assessment.clone()),
            operational_testing: Set(d.operational_testing.clone()),
            key_risks: Set(d.key_risks.clone()),
            performance_monitoring: Set(d.performance_monitoring.clone()),
            autonomous_decision: Set(d.autonomous_decision.clone()),
            fallback_process: Set(d.fallback_process.clone()),
            opt_out_mechanism: Set(d.opt_out_mechanism.clone()),
            search_text: Set(d.search_text.clone()),
        };
        dm.insert(conn).await?;
    }
    Ok(model)
}

impl RecordStore {
    pub async fn insert_use_case(
        &self,
        row: &UseCaseRow,
        detail: Option<&UseCaseDetailRow>,
    ) -> Result<UseCaseRow> {
        let txn = self.db().begin().await?;
        let model = insert_use_case_on(&txn, row, detail).await?;
        txn.commit().await?;
        Ok(to_row(model))
    }

    /// 库间迁移的批量写入：整批行与断点在同一事务内提交，
    /// 中途失败整批回滚，重跑从上一个断点之后继续，不产生重复行。
    pub async fn insert_use_case_batch_checkpointed(
        &self,
        batch: &[(UseCaseRow, Option<UseCaseDetailRow>)],
        migrated_total: i64,
    ) -> Result<()> {
        let Some((last, _)) = batch.last() else {
            return Ok(());
        };
        let txn = self.db().begin().await?;
        for (row, detail) in batch {
            insert_use_case_on(&txn, row, detail.as_ref()).await?;
        }
        crate::store::checkpoint::upsert_checkpoint_on(
            &txn,
            "ai_use_cases",
            &last.id,
            migrated_total,
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn get_use_case_by_slug(&self, slug: &str) -> Result<Option<UseCaseRow>> {
        let model = Entity::find()
            .filter(Column::Slug.eq(slug))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn get_use_case_by_id(&self, id: &str) -> Result<Option<UseCaseRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn get_use_case_detail(&self, use_case_id: &str) -> Result<Option<UseCaseDetailRow>> {
        let model = DetailEntity::find_by_id(use_case_id).one(self.db()).await?;
        Ok(model.map(detail_to_row))
    }

    pub async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let count = Entity::find()
            .filter(Column::Slug.eq(slug))
            .count(self.db())
            .await?;
        Ok(count > 0)
    }

    pub async fn list_use_cases(
        &self,
        filter: &UseCaseFilter,
        sort: UseCaseSort,
        direction: SortDirection,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UseCaseRow>> {
        let order: Order = direction.into();
        let mut q = apply_filter(Entity::find(), filter).order_by(sort.column(), order);
        if limit != usize::MAX {
            q = q.limit(limit as u64).offset(offset as u64);
        }
        let rows = q.all(self.db()).await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_use_cases(&self, filter: &UseCaseFilter) -> Result<u64> {
        Ok(apply_filter(Entity::find(), filter).count(self.db()).await?)
    }

    pub async fn update_use_case_flags(
        &self,
        id: &str,
        update: &UseCaseUpdate,
    ) -> Result<Option<UseCaseRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        if let Some(m) = model {
            let now = Utc::now().fixed_offset();
            let providers_json = serde_json::to_string(&update.providers_detected)?;
            let mut am: use_case::ActiveModel = m.into();
            am.has_llm = Set(update.has_llm);
            am.has_genai = Set(update.has_genai);
            am.has_chatbot = Set(update.has_chatbot);
            am.has_coding_assistant = Set(update.has_coding_assistant);
            am.has_coding_agent = Set(update.has_coding_agent);
            am.has_classic_ml = Set(update.has_classic_ml);
            am.has_rpa = Set(update.has_rpa);
            am.has_rules = Set(update.has_rules);
            am.providers_detected = Set(providers_json);
            am.updated_at = Set(now);
            let updated = am.update(self.db()).await?;
            Ok(Some(to_row(updated)))
        } else {
            Ok(None)
        }
    }

    pub async fn use_case_summary(&self) -> Result<UseCaseSummary> {
        let sql = "SELECT
                COUNT(*) AS total,
                SUM(has_genai) AS genai,
                SUM(has_llm) AS llm,
                SUM(has_chatbot) AS chatbot,
                SUM(has_classic_ml) AS classic_ml,
                COUNT(DISTINCT agency) AS agencies,
                COUNT(DISTINCT CASE WHEN domain_category IS NOT NULL AND domain_category != '' THEN domain_category END) AS domains
             FROM ai_use_cases";
        let rows = self
            .db()
            .query_all(Statement::from_string(
                self.db().get_database_backend(),
                sql.to_string(),
            ))
            .await?;
        if let Some(row) = rows.into_iter().next() {
            let total: i64 = row.try_get("", "total")?;
            let genai: Option<i64> = row.try_get("", "genai")?;
            let llm: Option<i64> = row.try_get("", "llm")?;
            let chatbot: Option<i64> = row.try_get("", "chatbot")?;
            let classic_ml: Option<i64> = row.try_get("", "classic_ml")?;
            let agencies: i64 = row.try_get("", "agencies")?;
            let domains: i64 = row.try_get("", "domains")?;
            Ok(UseCaseSummary {
                total: total as u64,
                genai: genai.unwrap_or(0) as u64,
                llm: llm.unwrap_or(0) as u64,
                chatbot: chatbot.unwrap_or(0) as u64,
                classic_ml: classic_ml.unwrap_or(0) as u64,
                distinct_agencies: agencies as u64,
                distinct_domains: domains as u64,
            })
        } else {
            Ok(UseCaseSummary::default())
        }
    }
}
