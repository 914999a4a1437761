use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "agency_ai_tools")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub agency_profile_id: String,
    pub product_name: String,
    pub product_type: String,
    pub slug: String,
    pub available_to_all_staff: Option<String>,
    pub is_pilot_or_limited: bool,
    pub internal_or_sensitive_data: Option<String>,
    pub citation_chicago: Option<String>,
    pub citation_accessed_date: Option<String>,
    pub citation_url: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::agency_profile::Entity",
        from = "Column::AgencyProfileId",
        to = "super::agency_profile::Column::Id"
    )]
    Profile,
}

impl Related<super::agency_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
