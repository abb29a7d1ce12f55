//! Sqlite storage backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;
use rusqlite::types::Value;

use wordlette_config::DatabaseSettings;

use crate::ast::{Group, ScalarValue};
use crate::driver::DatabaseDriver;
use crate::model::{FieldType, ModelRegistry, ModelSchema, Record};
use crate::sql;
use crate::status::{DbStatus, DriverError, capture};

/// Driver backed by a single rusqlite connection.
///
/// The connection lives behind a mutex; each operation takes the lock for
/// its full duration, so statements from concurrent tasks serialize.
#[derive(Default)]
pub struct SqliteDriver {
    conn: Mutex<Option<Connection>>,
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_conn<T>(&self, op: impl FnOnce(&Connection) -> DbStatus<T>) -> DbStatus<T> {
        let guard = self.conn.lock();
        match guard.as_ref() {
            Some(conn) => op(conn),
            None => DbStatus::Error(DriverError::NotConnected),
        }
    }

    fn write_records(
        &self,
        records: &[Record],
        plan_for: fn(&ModelSchema) -> Result<sql::CompiledWrite, DriverError>,
    ) -> DbStatus<()> {
        self.with_conn(|conn| {
            for record in records {
                let plan = match plan_for(record.schema()) {
                    Ok(plan) => plan,
                    Err(e) => return DbStatus::Error(e),
                };
                let values = record.to_values();
                let params = rusqlite::params_from_iter(plan.columns.iter().map(|column| {
                    values
                        .get(column)
                        .map(to_sql_value)
                        .unwrap_or(Value::Null)
                }));
                if let DbStatus::Error(e) = capture(conn.execute(&plan.sql, params)) {
                    return DbStatus::Error(e);
                }
            }
            DbStatus::Success(())
        })
    }
}

fn to_sql_value(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Int(i) => Value::Integer(*i),
        ScalarValue::Real(r) => Value::Real(*r),
        ScalarValue::Text(s) => Value::Text(s.clone()),
        // Sqlite has no boolean affinity; booleans live as 0/1 integers.
        ScalarValue::Bool(b) => Value::Integer(i64::from(*b)),
        ScalarValue::Null => Value::Null,
    }
}

fn from_sql_value(value: Value, ty: FieldType) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Null,
        Value::Integer(i) if ty == FieldType::Bool => ScalarValue::Bool(i != 0),
        Value::Integer(i) => ScalarValue::Int(i),
        Value::Real(r) => ScalarValue::Real(r),
        Value::Text(s) => ScalarValue::Text(s),
        Value::Blob(_) => ScalarValue::Null,
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    async fn connect(&self, settings: &DatabaseSettings) -> DbStatus<()> {
        let opened = capture(Connection::open(&settings.path));
        match opened {
            DbStatus::Success(conn) => {
                tracing::info!(path = %settings.path, "sqlite connection opened");
                *self.conn.lock() = Some(conn);
                DbStatus::Success(())
            }
            DbStatus::Error(e) => {
                tracing::error!(path = %settings.path, error = %e, "sqlite connection failed");
                DbStatus::Error(e)
            }
        }
    }

    async fn disconnect(&self) -> DbStatus<()> {
        if self.conn.lock().take().is_some() {
            tracing::info!("sqlite connection closed");
        }
        DbStatus::Success(())
    }

    fn connected(&self) -> bool {
        self.conn.lock().is_some()
    }

    async fn sync_schema(&self, registry: &ModelRegistry) -> DbStatus<()> {
        self.with_conn(|conn| {
            for schema in registry.iter() {
                let ddl = match sql::create_table(schema) {
                    Ok(ddl) => ddl,
                    Err(e) => return DbStatus::Error(e),
                };
                tracing::debug!(table = %schema.table, "syncing table");
                if let DbStatus::Error(e) = capture(conn.execute(&ddl, [])) {
                    return DbStatus::Error(e);
                }
            }
            DbStatus::Success(())
        })
    }

    async fn add(&self, records: &[Record]) -> DbStatus<()> {
        self.write_records(records, sql::insert)
    }

    async fn update(&self, records: &[Record]) -> DbStatus<()> {
        self.write_records(records, sql::update)
    }

    async fn delete(&self, records: &[Record]) -> DbStatus<()> {
        self.with_conn(|conn| {
            for record in records {
                let plan = match sql::delete(record.schema()) {
                    Ok(plan) => plan,
                    Err(e) => return DbStatus::Error(e),
                };
                let values = record.to_values();
                let params = rusqlite::params_from_iter(plan.columns.iter().map(|column| {
                    values
                        .get(column)
                        .map(to_sql_value)
                        .unwrap_or(Value::Null)
                }));
                if let DbStatus::Error(e) = capture(conn.execute(&plan.sql, params)) {
                    return DbStatus::Error(e);
                }
            }
            DbStatus::Success(())
        })
    }

    async fn fetch(&self, schema: &ModelSchema, filter: Option<&Group>) -> DbStatus<Vec<Record>> {
        let query = match sql::select(schema, filter) {
            Ok(query) => query,
            Err(e) => return DbStatus::Error(e),
        };
        let shared = Arc::new(schema.clone());
        self.with_conn(|conn| {
            let run = || -> rusqlite::Result<Vec<Record>> {
                let mut stmt = conn.prepare(&query.sql)?;
                let params = rusqlite::params_from_iter(query.params.iter().map(to_sql_value));
                let mut rows = stmt.query(params)?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut values = BTreeMap::new();
                    for field in &shared.fields {
                        let raw: Value = row.get(field.name.as_str())?;
                        values.insert(field.name.clone(), from_sql_value(raw, field.ty));
                    }
                    out.push(Record::from_values(Arc::clone(&shared), values));
                }
                Ok(out)
            };
            capture(run())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, FieldRef, compare, when};
    use crate::model::FieldDef;

    fn pages_registry() -> (ModelRegistry, Arc<ModelSchema>) {
        let mut registry = ModelRegistry::new();
        let schema = registry.register(ModelSchema::new(
            "pages",
            vec![
                FieldDef::new("id", FieldType::Int),
                FieldDef::new("title", FieldType::Text),
                FieldDef::new("published", FieldType::Bool),
            ],
        ));
        (registry, schema)
    }

    async fn memory_driver() -> (SqliteDriver, ModelRegistry, Arc<ModelSchema>) {
        let driver = SqliteDriver::new();
        let settings = DatabaseSettings {
            driver: "sqlite".into(),
            path: ":memory:".into(),
        };
        assert!(driver.connect(&settings).await.is_success());
        let (registry, schema) = pages_registry();
        assert!(driver.sync_schema(&registry).await.is_success());
        (driver, registry, schema)
    }

    fn page(schema: &Arc<ModelSchema>, id: i64, title: &str, published: bool) -> Record {
        let mut record = Record::new(Arc::clone(schema));
        record.set("id", id).set("title", title).set("published", published);
        record
    }

    #[tokio::test]
    async fn test_operations_before_connect_report_not_connected() {
        let driver = SqliteDriver::new();
        let (registry, schema) = pages_registry();
        assert_eq!(
            driver.sync_schema(&registry).await.err(),
            Some(DriverError::NotConnected)
        );
        assert!(driver.fetch(&schema, None).await.is_error());
        assert!(!driver.connected());
    }

    #[tokio::test]
    async fn test_fetch_empty_table_is_success() {
        let (driver, _registry, schema) = memory_driver().await;
        let status = driver.fetch(&schema, None).await;
        assert_eq!(status, DbStatus::Success(Vec::new()));
    }

    #[tokio::test]
    async fn test_add_then_fetch_round_trip() {
        let (driver, _registry, schema) = memory_driver().await;
        let record = page(&schema, 1, "home", true);
        assert!(driver.add(std::slice::from_ref(&record)).await.is_success());

        let fetched = driver.fetch(&schema, None).await.ok().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].get("title").value().unwrap(), ScalarValue::Text("home".into()));
        assert_eq!(fetched[0].get("published").value().unwrap(), ScalarValue::Bool(true));
    }

    #[tokio::test]
    async fn test_fetch_with_filter() {
        let (driver, _registry, schema) = memory_driver().await;
        let records = vec![
            page(&schema, 1, "home", true),
            page(&schema, 2, "draft", false),
        ];
        assert!(driver.add(&records).await.is_success());

        let filter = when([compare(
            FieldRef::new("pages", "published"),
            CompareOp::Eq,
            true,
        )]);
        let fetched = driver.fetch(&schema, Some(&filter)).await.ok().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].get("id").value().unwrap(), ScalarValue::Int(1));
    }

    #[tokio::test]
    async fn test_update_rewrites_by_key() {
        let (driver, _registry, schema) = memory_driver().await;
        let mut record = page(&schema, 1, "home", false);
        assert!(driver.add(std::slice::from_ref(&record)).await.is_success());

        record.set("title", "front page").set("published", true);
        assert!(driver.update(std::slice::from_ref(&record)).await.is_success());

        let fetched = driver.fetch(&schema, None).await.ok().unwrap();
        assert_eq!(
            fetched[0].get("title").value().unwrap(),
            ScalarValue::Text("front page".into())
        );
    }

    #[tokio::test]
    async fn test_delete_removes_by_key() {
        let (driver, _registry, schema) = memory_driver().await;
        let records = vec![
            page(&schema, 1, "home", true),
            page(&schema, 2, "about", true),
        ];
        assert!(driver.add(&records).await.is_success());
        assert!(driver.delete(&records[..1]).await.is_success());

        let fetched = driver.fetch(&schema, None).await.ok().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].get("id").value().unwrap(), ScalarValue::Int(2));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (driver, _registry, _schema) = memory_driver().await;
        assert!(driver.connected());
        assert!(driver.disconnect().await.is_success());
        assert!(!driver.connected());
        assert!(driver.disconnect().await.is_success());
    }

    #[tokio::test]
    async fn test_file_backed_database_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.db");
        let settings = DatabaseSettings {
            driver: "sqlite".into(),
            path: path.to_string_lossy().into_owned(),
        };
        let (registry, schema) = pages_registry();

        let driver = SqliteDriver::new();
        assert!(driver.connect(&settings).await.is_success());
        assert!(driver.sync_schema(&registry).await.is_success());
        assert!(driver.add(&[page(&schema, 1, "home", true)]).await.is_success());
        assert!(driver.disconnect().await.is_success());

        let reopened = SqliteDriver::new();
        assert!(reopened.connect(&settings).await.is_success());
        let fetched = reopened.fetch(&schema, None).await.ok().unwrap();
        assert_eq!(fetched.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_into_missing_table_is_engine_error() {
        let driver = SqliteDriver::new();
        let settings = DatabaseSettings {
            driver: "sqlite".into(),
            path: ":memory:".into(),
        };
        assert!(driver.connect(&settings).await.is_success());
        // No sync_schema: the table does not exist.
        let (_registry, schema) = pages_registry();
        let status = driver.add(&[page(&schema, 1, "home", true)]).await;
        assert!(matches!(status.err(), Some(DriverError::Engine(_))));
    }
}
