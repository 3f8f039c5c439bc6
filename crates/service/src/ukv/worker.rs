use std::collections::HashSet;
use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, FromQueryResult, QueryResult, Statement, TransactionTrait};
use serde_json::Value;
use tracing::{error, info, instrument, warn, Span};

use super::domain::{InboundRequest, KeyValue, MAX_BATCH_ENTRIES};
use super::identity::{IdentityRejection, IdentityResolver};
use super::payload::{self, Shape};
use super::{keys, statements};
use crate::errors::KvError;

#[derive(Debug, FromQueryResult)]
struct KeyValueRow {
    key_name: String,
    key_value: Value,
}

impl From<KeyValueRow> for KeyValue {
    fn from(r: KeyValueRow) -> Self {
        Self { key: r.key_name, value: r.key_value }
    }
}

/// One row per requested key from the named lookup; NULL columns mean no match.
#[derive(Debug, FromQueryResult)]
struct RequestedKeyRow {
    requested: String,
    key_name: Option<String>,
    key_value: Option<Value>,
}

/// Per-identity key/value operations against the store.
///
/// Reads run on a pooled connection; writes run in a transaction that is
/// committed on success and rolled back on any failure. Input is validated
/// before the store is touched.
pub struct PersistenceWorker {
    db: DatabaseConnection,
    identity: Arc<dyn IdentityResolver>,
}

impl PersistenceWorker {
    pub fn new(db: DatabaseConnection, identity: Arc<dyn IdentityResolver>) -> Self {
        Self { db, identity }
    }

    #[cfg(test)]
    pub(crate) fn into_db(self) -> DatabaseConnection {
        self.db
    }

    async fn identity_for(&self, req: &InboundRequest) -> Result<String, KvError> {
        let identity = self.identity.resolve(req).await.map_err(KvError::Identity)?;
        if identity.is_empty() {
            error!("identity resolver returned an empty identity");
            return Err(KvError::Identity(IdentityRejection::internal("Unable to retrieve identity for user.")));
        }
        Span::current().record("identity", identity.as_str());
        Ok(identity)
    }

    /// Value stored under `key` for the caller.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use sea_orm::{DatabaseBackend, MockDatabase};
    /// use service::ukv::{InboundRequest, PersistenceWorker, StaticIdentityResolver};
    /// let db = MockDatabase::new(DatabaseBackend::Postgres)
    ///     .append_query_results([Vec::<models::user_key_value::Model>::new()])
    ///     .into_connection();
    /// let worker = PersistenceWorker::new(db, Arc::new(StaticIdentityResolver::new("U1")));
    /// let err = tokio_test::block_on(worker.get_key_value(&InboundRequest::default(), "a")).unwrap_err();
    /// assert!(err.is_not_found());
    /// ```
    #[instrument(skip(self, req), fields(identity = tracing::field::Empty))]
    pub async fn get_key_value(&self, req: &InboundRequest, key: &str) -> Result<Value, KvError> {
        keys::validate_key(key)?;
        let identity = self.identity_for(req).await?;

        let stmt = statements::select_key_value(&identity, key).into_statement();
        let rows = self.db.query_all(stmt).await.map_err(|e| {
            store_failure("get_key_value", &identity, &e, format!("Unexpected error retrieving key '{key}'."))
        })?;
        match rows.as_slice() {
            [] => Err(KvError::KeyNotFound(format!("Unable to find key '{key}' for user '{identity}'."))),
            [row] => {
                let row = decode_row(row, &identity)
                    .map_err(|_| KvError::DataStoreQuery(format!("Unexpected error retrieving key '{key}'.")))?;
                Ok(row.value)
            }
            many => {
                error!(identity = %identity, key, rows = many.len(), "more than one row for a key");
                Err(KvError::Worker(format!("Retrieval of key '{key}' matched {} rows.", many.len())))
            }
        }
    }

    /// Values for every key named in the JSON array body.
    ///
    /// All or nothing: if any requested key is absent the call fails with the
    /// exact list of missing keys.
    #[instrument(skip(self, req), fields(identity = tracing::field::Empty))]
    pub async fn find_named_key_values(&self, req: &InboundRequest) -> Result<Vec<KeyValue>, KvError> {
        let identity = self.identity_for(req).await?;
        let requested = payload::key_list(payload::extract(req, &[Shape::StringArray])?)?;
        ensure_batch_size(requested.len())?;
        keys::validate_key_list(&requested)?;

        let stmt = statements::select_named_key_values(&identity, &requested)?.into_statement();
        let rows = self.db.query_all(stmt).await.map_err(|e| {
            store_failure(
                "find_named_key_values",
                &identity,
                &e,
                "Unexpected error finding named key/value data for user.".into(),
            )
        })?;
        let decode_failed = || KvError::DataStoreQuery("Unexpected error finding named key/value data for user.".into());

        let mut seen: HashSet<String> = HashSet::new();
        let mut found: Vec<KeyValue> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for row in &rows {
            let row = RequestedKeyRow::from_query_result(row, "").map_err(|e| {
                error!(identity = %identity, error = %e, "unexpected row shape");
                decode_failed()
            })?;
            match (row.key_name, row.key_value) {
                (Some(key), Some(value)) => {
                    if seen.insert(key.clone()) {
                        found.push(KeyValue { key, value });
                    }
                }
                (None, _) => missing.push(row.requested),
                (Some(key), None) => {
                    error!(identity = %identity, key = %key, "stored row without a value");
                    return Err(decode_failed());
                }
            }
        }
        if !missing.is_empty() {
            info!(identity = %identity, missing = missing.len(), "requested keys not found");
            return Err(KvError::RequestedKeysNotFound { missing });
        }
        Ok(found)
    }

    /// Every key/value pair stored for the caller, ordered by key.
    #[instrument(skip(self, req), fields(identity = tracing::field::Empty))]
    pub async fn get_all_key_values(&self, req: &InboundRequest) -> Result<Vec<KeyValue>, KvError> {
        let identity = self.identity_for(req).await?;
        let rows = models::user_key_value::list_for_identity(&self.db, &identity).await.map_err(|e| {
            error!(operation = "get_all_key_values", identity = %identity, error = %e, "database failure");
            KvError::DataStoreQuery("Unexpected error retrieving all key/value data for user.".into())
        })?;
        if rows.is_empty() {
            return Err(KvError::KeyNotFound(format!("Unable to find any key/value data for user '{identity}'.")));
        }
        Ok(rows.into_iter().map(KeyValue::from).collect())
    }

    /// Store the JSON object/array body under `key`, replacing any value whose
    /// key matches case-insensitively. The stored key takes the new casing.
    #[instrument(skip(self, req), fields(identity = tracing::field::Empty))]
    pub async fn upsert_key_value(&self, req: &InboundRequest, key: &str) -> Result<String, KvError> {
        keys::validate_key(key)?;
        let identity = self.identity_for(req).await?;
        let value = payload::extract(req, &[Shape::Object, Shape::Array])?;

        let stmt = statements::upsert_key_value(&identity, key, &value).into_statement();
        self.execute_write("upsert_key_value", &identity, stmt, |_| Ok(()))
            .await
            .map_err(|e| e.or_message(format!("Failed to store value for key '{key}'.")))?;
        Ok(format!("Value stored as '{key}' for user '{identity}'."))
    }

    /// Store every `{key, value}` pair in the body in one statement. Nothing is
    /// written unless every pair is valid and the whole statement commits.
    /// Keys that differ only in case collapse to the last one; the confirmation
    /// counts rows the store wrote.
    #[instrument(skip(self, req), fields(identity = tracing::field::Empty))]
    pub async fn upsert_key_values(&self, req: &InboundRequest) -> Result<String, KvError> {
        let identity = self.identity_for(req).await?;
        let pairs = payload::key_value_pairs(payload::extract(req, &[Shape::KeyValueArray])?)?;
        ensure_batch_size(pairs.len())?;
        let names: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();
        keys::validate_key_list(&names)?;

        let stmt = statements::upsert_key_values(&identity, &pairs)?.into_statement();
        let count = self
            .execute_write("upsert_key_values", &identity, stmt, |_| Ok(()))
            .await
            .map_err(|e| e.or_message("Failed to store values for keys.".into()))?;
        Ok(format!("Stored {count} key/value pairs for user."))
    }

    #[instrument(skip(self, req), fields(identity = tracing::field::Empty))]
    pub async fn delete_key_value(&self, req: &InboundRequest, key: &str) -> Result<String, KvError> {
        keys::validate_key(key)?;
        let identity = self.identity_for(req).await?;

        let stmt = statements::delete_key_value(&identity, key).into_statement();
        let not_found = format!("Unable to find key '{key}' for user '{identity}'.");
        self.execute_write("delete_key_value", &identity, stmt, |rows| match rows {
            0 => Err(KvError::KeyNotFound(not_found)),
            1 => Ok(()),
            n => {
                error!(key, rows = n, "delete matched more than one row");
                Err(KvError::Worker(format!("Deletion of key '{key}' resulted in {n} deletions.")))
            }
        })
        .await
        .map_err(|e| e.or_message(format!("Failed to delete key '{key}'.")))?;
        Ok(format!("Deleted value stored as '{key}' for user '{identity}'."))
    }

    /// Round-trip a probe through the store; never fails.
    pub async fn test_connection(&self) -> bool {
        models::db::ping(&self.db).await
    }

    /// Run one write statement in its own transaction.
    ///
    /// `accept` sees the affected row count before commit; an error from it
    /// rolls the write back.
    async fn execute_write<F>(&self, operation: &'static str, identity: &str, stmt: Statement, accept: F) -> Result<u64, WriteError>
    where
        F: FnOnce(u64) -> Result<(), KvError>,
    {
        let txn = self.db.begin().await.map_err(|e| WriteError::store(operation, identity, &e))?;
        let rows = match txn.execute(stmt).await {
            Ok(res) => res.rows_affected(),
            Err(e) => {
                let err = WriteError::store(operation, identity, &e);
                rollback(txn, operation).await;
                return Err(err);
            }
        };
        if let Err(e) = accept(rows) {
            rollback(txn, operation).await;
            return Err(WriteError::Rejected(e));
        }
        txn.commit().await.map_err(|e| WriteError::store(operation, identity, &e))?;
        Ok(rows)
    }
}

/// Write failures before they get an operation-specific message.
enum WriteError {
    Store,
    Rejected(KvError),
}

impl WriteError {
    fn store(operation: &'static str, identity: &str, err: &DbErr) -> Self {
        error!(operation, identity, error = %err, "database failure caused rollback");
        WriteError::Store
    }

    fn or_message(self, message: String) -> KvError {
        match self {
            WriteError::Store => KvError::DataStoreQuery(message),
            WriteError::Rejected(e) => e,
        }
    }
}

async fn rollback(txn: DatabaseTransaction, operation: &'static str) {
    if let Err(e) = txn.rollback().await {
        warn!(operation, error = %e, "rollback failed");
    }
}

fn store_failure(operation: &'static str, identity: &str, err: &DbErr, message: String) -> KvError {
    error!(operation, identity, error = %err, "database failure");
    KvError::DataStoreQuery(message)
}

fn decode_row(row: &QueryResult, identity: &str) -> Result<KeyValue, DbErr> {
    KeyValueRow::from_query_result(row, "").map(KeyValue::from).map_err(|e| {
        error!(identity, error = %e, "unexpected row shape");
        e
    })
}

fn ensure_batch_size(len: usize) -> Result<(), KvError> {
    if len > MAX_BATCH_ENTRIES {
        return Err(KvError::ValueFormat(format!(
            "Invalid input, at most {MAX_BATCH_ENTRIES} entries are accepted per request, got {len}."
        )));
    }
    Ok(())
}


#[cfg(test)]
mod live_tests {
    use super::*;
    use crate::test_support::get_db;
    use crate::ukv::identity::StaticIdentityResolver;
    use serde_json::json;
    use uuid::Uuid;

    async fn live_worker() -> Option<PersistenceWorker> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return None;
        }
        let db = get_db().await.ok()?;
        let identity = format!("svc_ukv_{}", Uuid::new_v4());
        Some(PersistenceWorker::new(db, Arc::new(StaticIdentityResolver::new(identity))))
    }

    #[tokio::test]
    async fn round_trip_and_case_insensitive_lookup() -> Result<(), anyhow::Error> {
        let Some(w) = live_worker().await else { return Ok(()) };
        let none = InboundRequest::default();

        w.upsert_key_value(&InboundRequest::json(r#"{"x":1}"#), "a").await?;
        assert_eq!(w.get_key_value(&none, "a").await?, json!({"x": 1}));

        w.upsert_key_value(&InboundRequest::json(r#"[true]"#), "Foo").await?;
        let found = w.find_named_key_values(&InboundRequest::json(r#"["foo"]"#)).await?;
        assert_eq!(found[0].key, "Foo");
        let all = w.get_all_key_values(&none).await?;
        assert!(all.iter().any(|kv| kv.key == "Foo"));

        match w.find_named_key_values(&InboundRequest::json(r#"["a","Foo","c"]"#)).await {
            Err(KvError::RequestedKeysNotFound { missing }) => assert_eq!(missing, vec!["c".to_string()]),
            other => panic!("expected missing list, got {other:?}"),
        }

        w.delete_key_value(&none, "a").await?;
        assert!(w.delete_key_value(&none, "a").await.unwrap_err().is_not_found());
        w.delete_key_value(&none, "FOO").await?;
        Ok(())
    }

    #[tokio::test]
    async fn failed_batch_persists_nothing() -> Result<(), anyhow::Error> {
        let Some(w) = live_worker().await else { return Ok(()) };
        let req = InboundRequest::json(r#"[{"key":"a","value":1},{"key":"bad key","value":2}]"#);
        assert!(w.upsert_key_values(&req).await.is_err());
        assert!(w.get_key_value(&InboundRequest::default(), "a").await.unwrap_err().is_not_found());

        let req = InboundRequest::json(r#"[{"key":"a","value":1},{"key":"b","value":{"n":2}}]"#);
        assert_eq!(w.upsert_key_values(&req).await?, "Stored 2 key/value pairs for user.");
        assert_eq!(w.get_all_key_values(&InboundRequest::default()).await?.len(), 2);
        w.delete_key_value(&InboundRequest::default(), "a").await?;
        w.delete_key_value(&InboundRequest::default(), "b").await?;
        Ok(())
    }
}
