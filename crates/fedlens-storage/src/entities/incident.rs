use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "incidents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub occurred_on: Option<String>,
    pub deployers: String,
    pub developers: String,
    pub harmed_parties: String,
    pub source_url: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::incident_security::Entity")]
    Security,
}

impl Related<super::incident_security::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Security.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
