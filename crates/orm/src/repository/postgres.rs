//! PostgreSQL repository - one table per record kind, via sqlx
//!
//! Rows map to records column by column. Writes are upserts keyed on the
//! primary column so a record with a key is updated in place and one
//! without is inserted with a generated key.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};

use super::criteria::Criteria;
use super::{FindOne, Repository, SaveOptions};
use crate::config::{ConfigError, EnvConfig};
use crate::error::{OrmError, OrmResult};
use crate::record::{KindId, Record};
use crate::relationships::metadata::DEFAULT_PRIMARY_COLUMN;
use crate::security::{escape_identifier, validate_identifier};

/// Repository storing one kind in one PostgreSQL table
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    kind: KindId,
    table: String,
    primary_column: String,
}

impl PostgresRepository {
    pub fn new(pool: PgPool, kind: impl Into<KindId>, table: &str) -> OrmResult<Self> {
        validate_identifier(table)?;
        Ok(Self {
            pool,
            kind: kind.into(),
            table: table.to_string(),
            primary_column: DEFAULT_PRIMARY_COLUMN.to_string(),
        })
    }

    pub fn with_primary_column(mut self, column: &str) -> OrmResult<Self> {
        validate_identifier(column)?;
        self.primary_column = column.to_string();
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, criteria: &Criteria, limit_one: bool) -> OrmResult<Vec<Record>> {
        let (sql, params) = select_sql(&self.table, criteria, limit_one)?;
        tracing::debug!("Executing query for kind '{}': {}", self.kind, sql);

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = bind_json_value(query, param);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|row| row_to_record(&self.kind, row)).collect()
    }

    async fn upsert(&self, mut record: Record, options: SaveOptions) -> OrmResult<Record> {
        if record.kind() != &self.kind {
            return Err(OrmError::Query(format!(
                "Cannot save record of kind '{}' into table '{}' for '{}'",
                record.kind(),
                self.table,
                self.kind
            )));
        }

        let mut fields = record.fields().clone();
        // A null key means "generate one", so let the column default apply.
        if matches!(fields.get(&self.primary_column), Some(Value::Null)) {
            fields.remove(&self.primary_column);
        }

        let (sql, params) = upsert_sql(&self.table, &self.primary_column, &fields)?;
        tracing::debug!("Executing save for kind '{}': {}", self.kind, sql);

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = bind_json_value(query, param);
        }

        let row = query.fetch_one(&self.pool).await?;
        let stored = row_to_record(&self.kind, &row)?;

        if options.reload {
            record.merge_fields(stored.fields());
        } else if let Some(key) = stored.get(&self.primary_column) {
            record.set(&self.primary_column, key.clone());
        }
        Ok(record)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    fn kind(&self) -> &KindId {
        &self.kind
    }

    fn primary_column(&self) -> &str {
        &self.primary_column
    }

    async fn find(&self, criteria: &Criteria) -> OrmResult<Vec<Record>> {
        self.fetch(criteria, false).await
    }

    async fn find_one(&self, query: &FindOne) -> OrmResult<Option<Record>> {
        let criteria = query.to_criteria(&self.primary_column);
        Ok(self.fetch(&criteria, true).await?.into_iter().next())
    }

    async fn create(&self, input: Option<Record>) -> OrmResult<Record> {
        let fields = input.map(Record::into_fields).unwrap_or_default();
        Ok(Record::from_fields(self.kind.clone(), fields))
    }

    async fn save(&self, record: Record, options: SaveOptions) -> OrmResult<Record> {
        self.upsert(record, options).await
    }

    async fn save_many(&self, records: Vec<Record>, options: SaveOptions) -> OrmResult<Vec<Record>> {
        let mut saved = Vec::with_capacity(records.len());
        for record in records {
            saved.push(self.upsert(record, options).await?);
        }
        Ok(saved)
    }

    async fn delete(&self, criteria: &Criteria) -> OrmResult<u64> {
        let (sql, params) = delete_sql(&self.table, criteria)?;
        tracing::debug!("Executing delete for kind '{}': {}", self.kind, sql);

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = bind_json_value(query, param);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn validate_criteria(criteria: &Criteria) -> OrmResult<()> {
    criteria
        .conditions()
        .iter()
        .try_for_each(|condition| validate_identifier(&condition.column))
}

/// `SELECT *` with the criteria's WHERE clause
pub fn select_sql(table: &str, criteria: &Criteria, limit_one: bool) -> OrmResult<(String, Vec<Value>)> {
    validate_criteria(criteria)?;
    let (where_clause, params) = criteria.to_sql(1);
    let mut sql = format!("SELECT * FROM {}{}", escape_identifier(table), where_clause);
    if limit_one {
        sql.push_str(" LIMIT 1");
    }
    Ok((sql, params))
}

pub fn delete_sql(table: &str, criteria: &Criteria) -> OrmResult<(String, Vec<Value>)> {
    validate_criteria(criteria)?;
    let (where_clause, params) = criteria.to_sql(1);
    Ok((format!("DELETE FROM {}{}", escape_identifier(table), where_clause), params))
}

/// Insert, or update on primary key conflict when the key is supplied
pub fn upsert_sql(
    table: &str,
    primary_column: &str,
    fields: &Map<String, Value>,
) -> OrmResult<(String, Vec<Value>)> {
    let table = escape_identifier(table);
    if fields.is_empty() {
        return Ok((format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table), Vec::new()));
    }

    let mut columns = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    let mut params = Vec::with_capacity(fields.len());

    for (index, (column, value)) in fields.iter().enumerate() {
        validate_identifier(column)?;
        columns.push(escape_identifier(column));
        placeholders.push(format!("${}", index + 1));
        params.push(value.clone());
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );

    if fields.contains_key(primary_column) {
        let updates: Vec<String> = columns
            .iter()
            .map(|column| format!("{} = EXCLUDED.{}", column, column))
            .collect();
        sql.push_str(&format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            escape_identifier(primary_column),
            updates.join(", ")
        ));
    }

    sql.push_str(" RETURNING *");
    Ok((sql, params))
}

/// Bind a JSON value as the closest PostgreSQL parameter type
fn bind_json_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(value.clone())),
    }
}

fn row_to_record(kind: &KindId, row: &PgRow) -> OrmResult<Record> {
    let mut fields = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        fields.insert(column.name().to_string(), column_value(row, index)?);
    }
    Ok(Record::from_fields(kind.clone(), fields))
}

fn column_value(row: &PgRow, index: usize) -> OrmResult<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let type_name = row.columns()[index].type_info().name();
    let value = match type_name {
        "BOOL" => Value::from(row.try_get::<bool, _>(index)?),
        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => Value::from(row.try_get::<f32, _>(index)?),
        "FLOAT8" => Value::from(row.try_get::<f64, _>(index)?),
        "UUID" => Value::from(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        "TIMESTAMPTZ" => Value::from(row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)?.to_rfc3339()),
        "TIMESTAMP" => Value::from(row.try_get::<chrono::NaiveDateTime, _>(index)?.to_string()),
        "DATE" => Value::from(row.try_get::<chrono::NaiveDate, _>(index)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<sqlx::types::Json<Value>, _>(index)?.0,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => Value::from(row.try_get::<String, _>(index)?),
        other => {
            return Err(OrmError::Serialization(format!(
                "Unsupported column type '{}' for column '{}'",
                other,
                row.columns()[index].name()
            )))
        }
    };
    Ok(value)
}

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl PoolConfig {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),
            max_lifetime: Some(1800),
            test_before_acquire: true,
        }
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: String, expected: &str) -> Result<T, ConfigError> {
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        expected: expected.to_string(),
    })
}

impl EnvConfig for PoolConfig {
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingRequired {
            field: "DATABASE_URL".to_string(),
            hint: "Set DATABASE_URL to a postgres:// connection string".to_string(),
        })?;

        let mut config = Self::new(&database_url);

        if let Some(value) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = parse_env("DATABASE_MAX_CONNECTIONS", value, "positive integer")?;
        }
        if let Some(value) = lookup("DATABASE_MIN_CONNECTIONS") {
            config.min_connections = parse_env("DATABASE_MIN_CONNECTIONS", value, "non-negative integer")?;
        }
        if let Some(value) = lookup("DATABASE_ACQUIRE_TIMEOUT") {
            config.acquire_timeout = parse_env("DATABASE_ACQUIRE_TIMEOUT", value, "seconds")?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.database_url).map_err(|e| ConfigError::InvalidValue {
            field: "DATABASE_URL".to_string(),
            value: self.database_url.clone(),
            expected: format!("valid URL ({})", e),
        })?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_URL".to_string(),
                value: self.database_url.clone(),
                expected: "postgres:// or postgresql:// scheme".to_string(),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "max_connections must be greater than zero".to_string(),
            });
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::ValidationFailed {
                message: format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Open a PostgreSQL pool with the given configuration
pub async fn create_pool(config: &PoolConfig) -> OrmResult<PgPool> {
    config.validate()?;
    tracing::debug!(
        "Creating database pool: max={}, min={}, timeout={}s",
        config.max_connections,
        config.min_connections,
        config.acquire_timeout
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .test_before_acquire(config.test_before_acquire);

    if let Some(idle_timeout) = config.idle_timeout {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }
    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(Duration::from_secs(max_lifetime));
    }

    let pool = options.connect(&config.database_url).await.map_err(|e| {
        tracing::error!("Failed to create database pool: {}", e);
        OrmError::Database(format!("Failed to create database pool: {}", e))
    })?;

    tracing::info!("Database pool created with {} max connections", config.max_connections);
    Ok(pool)
}
