//! Create `user_key_value` table.
//!
//! One row per `(identity_id, key_name)`. Key names are unique per identity
//! regardless of case, while the stored casing is whatever the last upsert used.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserKeyValue::Table)
                    .if_not_exists()
                    .col(string_len(UserKeyValue::IdentityId, 255).not_null())
                    .col(string_len(UserKeyValue::KeyName, 50).not_null())
                    .col(json_binary(UserKeyValue::KeyValue).not_null())
                    .col(
                        timestamp_with_time_zone(UserKeyValue::UpsertedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(UserKeyValue::IdentityId)
                            .col(UserKeyValue::KeyName),
                    )
                    .to_owned(),
            )
            .await?;

        // Expression index; the upsert statements name it as their conflict target.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uniq_user_key_value_identity_lower_key \
                 ON user_key_value (identity_id, lower(key_name))",
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserKeyValue::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserKeyValue {
    Table,
    IdentityId,
    KeyName,
    KeyValue,
    UpsertedAt,
}
