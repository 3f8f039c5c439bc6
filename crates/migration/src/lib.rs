//! Migrator for the user key/value schema.
pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_user_key_value;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240601_000001_create_user_key_value::Migration)]
    }
}
