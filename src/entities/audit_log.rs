use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub timestamp: String,

    /// Empty for anonymous events (e.g. failed logins).
    pub actor: String,

    /// Encrypted field token
    pub description: String,

    /// Encrypted field token
    pub details: Option<String>,

    pub suspicious: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
