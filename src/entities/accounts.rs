use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Encrypted username token. The AEAD is non-deterministic, so
    /// case-insensitive identity matching happens in the repository,
    /// not via a column constraint.
    pub username_cipher: String,

    /// Argon2id password hash (PHC string)
    pub password_hash: String,

    pub role: String,

    pub first_name: String,

    pub last_name: String,

    pub registered_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
