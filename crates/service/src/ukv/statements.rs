//! Parameterized SQL for `user_key_value`.
//!
//! Key names and values only ever travel as bound parameters. Batch statements
//! are generated with exactly as many placeholders as bound values.

use sea_orm::{DbBackend, Statement, Value};

use super::domain::KeyValue;
use crate::errors::KvError;

const SELECT_ONE: &str = "SELECT identity_id, key_name, key_value FROM user_key_value \
     WHERE identity_id = $1 AND lower(key_name) = lower($2)";

const DELETE_ONE: &str = "DELETE FROM user_key_value WHERE identity_id = $1 AND lower(key_name) = lower($2)";

const UPSERT_CONFLICT: &str = " ON CONFLICT (identity_id, lower(key_name)) DO UPDATE SET \
     key_name = EXCLUDED.key_name, key_value = EXCLUDED.key_value, upserted_at = now()";

/// SQL text plus its bound values.
#[derive(Debug, Clone)]
pub struct BuiltStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

impl BuiltStatement {
    pub fn placeholder_count(&self) -> usize {
        self.values.len()
    }

    pub fn into_statement(self) -> Statement {
        Statement::from_sql_and_values(DbBackend::Postgres, self.sql, self.values)
    }
}

pub fn select_key_value(identity: &str, key: &str) -> BuiltStatement {
    BuiltStatement { sql: SELECT_ONE.to_string(), values: vec![identity.into(), key.into()] }
}

pub fn delete_key_value(identity: &str, key: &str) -> BuiltStatement {
    BuiltStatement { sql: DELETE_ONE.to_string(), values: vec![identity.into(), key.into()] }
}

/// Identity in `$1`, then one placeholder per key.
///
/// Every requested key comes back as a row; `key_name`/`key_value` are NULL
/// when nothing matched it, and unmatched rows keep request order. Case
/// folding happens here only.
pub fn select_named_key_values<S: AsRef<str>>(identity: &str, keys: &[S]) -> Result<BuiltStatement, KvError> {
    if keys.is_empty() {
        return Err(KvError::Worker("named lookup built with no keys".into()));
    }
    let requested: Vec<String> = (2..keys.len() + 2).map(|n| format!("(${n}, {})", n - 1)).collect();
    let sql = format!(
        "SELECT r.requested, k.key_name, k.key_value FROM (VALUES {}) AS r(requested, ord) \
         LEFT JOIN user_key_value k ON k.identity_id = $1 AND lower(k.key_name) = lower(r.requested) \
         ORDER BY k.key_name, r.ord",
        requested.join(", ")
    );
    let mut values: Vec<Value> = Vec::with_capacity(keys.len() + 1);
    values.push(identity.into());
    values.extend(keys.iter().map(|k| Value::from(k.as_ref())));
    Ok(BuiltStatement { sql, values })
}

/// One `(identity, key, value)` tuple per pair, all bound to the same identity.
///
/// Pairs whose keys fold to the same `lower()` collapse to the last one, so
/// the upsert never touches a row twice.
pub fn upsert_key_values(identity: &str, pairs: &[KeyValue]) -> Result<BuiltStatement, KvError> {
    if pairs.is_empty() {
        return Err(KvError::Worker("upsert built with no pairs".into()));
    }
    let tuples: Vec<String> = (0..pairs.len())
        .map(|i| {
            let base = i * 3;
            format!("(${}, ${}, ${}, {})", base + 1, base + 2, base + 3, i + 1)
        })
        .collect();
    let sql = format!(
        "INSERT INTO user_key_value (identity_id, key_name, key_value, upserted_at) \
         SELECT DISTINCT ON (lower(v.key_name)) v.identity_id, v.key_name, v.key_value, now() \
         FROM (VALUES {}) AS v(identity_id, key_name, key_value, ord) \
         ORDER BY lower(v.key_name), v.ord DESC{}",
        tuples.join(", "),
        UPSERT_CONFLICT
    );
    let mut values: Vec<Value> = Vec::with_capacity(pairs.len() * 3);
    for pair in pairs {
        values.push(identity.into());
        values.push(pair.key.as_str().into());
        values.push(pair.value.clone().into());
    }
    Ok(BuiltStatement { sql, values })
}

pub fn upsert_key_value(identity: &str, key: &str, value: &serde_json::Value) -> BuiltStatement {
    let sql = format!(
        "INSERT INTO user_key_value (identity_id, key_name, key_value, upserted_at) VALUES ($1, $2, $3, now()){}",
        UPSERT_CONFLICT
    );
    BuiltStatement { sql, values: vec![identity.into(), key.into(), value.clone().into()] }
}
