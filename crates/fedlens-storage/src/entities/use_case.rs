use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ai_use_cases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
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
    pub providers_detected: String,
    pub commercial_product: Option<String>,
    #[sea_orm(unique)]
    pub slug: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::use_case_detail::Entity")]
    Detail,
}

impl Related<super::use_case_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Detail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
