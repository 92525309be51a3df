use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{error, info};

use super::{Projection, RunFilter, RunStore, StoreError, ID_FIELD, NAME_FIELD, NUMBER_FIELD};
use crate::config::StoreConfig;

/// Run collection stored as a PostgreSQL table of JSONB documents.
///
/// Each row holds one run document in a `doc jsonb` column. The collection name
/// maps to the table name and is validated before it reaches any SQL text.
pub struct PgRunStore {
    pool: PgPool,
    table: String,
    description: String,
    query_timeout: Duration,
}

impl PgRunStore {
    /// Open a pooled connection for the collection named in `config`
    pub async fn connect(url: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        if !Self::is_valid_collection_name(&config.collection) {
            return Err(StoreError::InvalidCollection(config.collection.clone()));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let description = format!("{}/{}", redact_url(url), config.collection);
        info!("Connected run store: {}", description);

        Ok(Self {
            pool,
            table: config.collection.clone(),
            description,
            query_timeout: Duration::from_millis(config.query_timeout_ms),
        })
    }

    /// Collection names become table names: `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes
    fn is_valid_collection_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Quote SQL identifier to prevent injection
    fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// SELECT for one projected document. `$1` is the projected field name,
    /// `$2` the filter value.
    fn build_find_sql(table: &str, filter: &RunFilter, projection: &Projection) -> String {
        let predicate = match filter {
            RunFilter::Id(_) => format!(
                "lower(COALESCE(doc -> '{id}' ->> '$oid', doc ->> '{id}')) = $2",
                id = ID_FIELD
            ),
            RunFilter::Number(_) => format!(
                "((doc -> '{n}') = to_jsonb($2::bigint) OR (doc -> '{n}' ->> '$numberLong') = $2::bigint::text)",
                n = NUMBER_FIELD
            ),
            RunFilter::Name(_) => format!("(doc ->> '{}') = $2", NAME_FIELD),
        };

        let projected = if projection.include_id && projection.field != ID_FIELD {
            format!(
                "CASE WHEN doc ? $1 THEN jsonb_build_object($1, doc -> $1, '{id}', doc -> '{id}') \
                 ELSE jsonb_build_object('{id}', doc -> '{id}') END",
                id = ID_FIELD
            )
        } else {
            "CASE WHEN doc ? $1 THEN jsonb_build_object($1, doc -> $1) ELSE '{}'::jsonb END"
                .to_string()
        };

        format!(
            "SELECT {} AS doc FROM {} WHERE {} LIMIT 1",
            projected,
            Self::quote_identifier(table),
            predicate
        )
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn find_one(
        &self,
        filter: &RunFilter,
        projection: &Projection,
    ) -> Result<Option<Value>, StoreError> {
        let sql = Self::build_find_sql(&self.table, filter, projection);
        let query = sqlx::query(&sql).bind(projection.field.as_str());
        let query = match filter {
            RunFilter::Id(id) => query.bind(id.as_str()),
            RunFilter::Number(n) => query.bind(*n),
            RunFilter::Name(name) => query.bind(name.as_str()),
        };

        let row = tokio::time::timeout(self.query_timeout, query.fetch_optional(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout(self.query_timeout.as_millis() as u64))?
            .map_err(|e| {
                error!("Run store query failed: {}", e);
                StoreError::Sqlx(e)
            })?;

        match row {
            Some(row) => Ok(Some(row.try_get::<Value, _>("doc")?)),
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        tokio::time::timeout(self.query_timeout, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout(self.query_timeout.as_millis() as u64))??;
        Ok(())
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Strip credentials from a connection URL before it is logged or exposed
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.into()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
