pub use super::accounts::Entity as Accounts;
pub use super::audit_log::Entity as AuditLog;
pub use super::restore_codes::Entity as RestoreCodes;
pub use super::scooters::Entity as Scooters;
pub use super::travellers::Entity as Travellers;
