use sea_orm::{entity::prelude::*, ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::errors;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_key_value")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub identity_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub key_name: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub key_value: Json,
    pub upserted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Every record owned by `identity_id`, ordered by key name.
pub async fn list_for_identity<C: ConnectionTrait>(db: &C, identity_id: &str) -> Result<Vec<Model>, errors::ModelError> {
    if identity_id.is_empty() {
        return Err(errors::ModelError::Validation("identity required".into()));
    }
    let rows = Entity::find()
        .filter(Column::IdentityId.eq(identity_id))
        .order_by_asc(Column::KeyName)
        .all(db)
        .await?;
    Ok(rows)
}
