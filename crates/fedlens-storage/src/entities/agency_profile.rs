use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "agency_ai_profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub agency_name: String,
    pub abbreviation: Option<String>,
    #[sea_orm(unique)]
    pub slug: String,
    pub department_level_name: Option<String>,
    pub parent_abbreviation: Option<String>,
    pub organization_id: Option<String>,
    pub deployment_status: String,
    pub has_staff_chatbot: bool,
    pub has_coding_assistant: bool,
    pub has_document_automation: bool,
    pub tool_count: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::agency_tool::Entity")]
    Tools,
}

impl Related<super::agency_tool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tools.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
