use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scooters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub serial_number: String,

    pub brand: String,

    pub model: String,

    /// km/h
    pub top_speed: i32,

    /// Wh
    pub battery_capacity: i32,

    /// Percent
    pub state_of_charge: i32,

    pub target_soc_min: i32,

    pub target_soc_max: i32,

    /// "lat,long" with five decimals
    pub location: String,

    pub out_of_service: bool,

    pub mileage: f64,

    pub last_maintenance_date: Option<String>,

    pub in_service_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
