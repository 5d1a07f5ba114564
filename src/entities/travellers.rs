use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "travellers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub customer_id: String,

    pub first_name: String,

    pub last_name: String,

    pub birthday: String,

    pub gender: String,

    /// Encrypted field token
    pub street_cipher: String,

    /// Encrypted field token
    pub house_number_cipher: String,

    pub zip_code: String,

    pub city: String,

    /// Encrypted field token
    pub email_cipher: String,

    /// Encrypted field token
    pub phone_cipher: String,

    pub driving_licence: String,

    pub registered_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
