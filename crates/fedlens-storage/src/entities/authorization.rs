use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "product_authorizations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub fedramp_id: String,
    pub organization_id: Option<String>,
    pub parent_agency_name: String,
    /// 空串表示没有子机构；UNIQUE 三元组里 NULL 会互不相等，所以不用 NULL
    pub sub_agency_name: String,
    pub ato_issuance_date: Option<String>,
    pub ato_expiration_date: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
