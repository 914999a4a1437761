use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "use_case_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub use_case_id: String,
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::use_case::Entity",
        from = "Column::UseCaseId",
        to = "super::use_case::Column::Id"
    )]
    UseCase,
}

impl Related<super::use_case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UseCase.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
