//! PostgreSQL source for the training relation.
//!
//! The relation's column types are read from `information_schema` first, so
//! the frame handed to feature selection carries declared dtypes rather than
//! whatever the driver happens to decode. Each column is cast server-side to
//! one of four wire types (see [`ColumnKind`]).

use super::{DataSource, RawDataset};
use crate::error::{Result, TrainerError};
use crate::pipeline::PipelineConfig;
use polars::prelude::*;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Row};
use std::time::Instant;
use tracing::{debug, info};

/// Schema-qualified relation name (`schema.table`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationName {
    pub schema: String,
    pub table: String,
}

impl RelationName {
    /// Parse `table` or `schema.table`; the schema defaults to `public`.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim().split('.').collect();
        let (schema, table) = match parts.as_slice() {
            [table] => ("public", *table),
            [schema, table] => (*schema, *table),
            _ => {
                return Err(TrainerError::Configuration(format!(
                    "invalid relation name '{}'",
                    raw
                )))
            }
        };

        if schema.is_empty() || table.is_empty() {
            return Err(TrainerError::Configuration(format!(
                "invalid relation name '{}'",
                raw
            )));
        }

        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    /// Quoted form usable in a FROM clause
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl std::fmt::Display for RelationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Wire type a column is cast to before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    /// Map an `information_schema.columns.data_type` value
    pub fn from_pg_type(data_type: &str) -> Self {
        match data_type {
            "smallint" | "integer" | "bigint" => ColumnKind::Integer,
            "real" | "double precision" | "numeric" | "decimal" => ColumnKind::Float,
            "boolean" => ColumnKind::Boolean,
            _ => ColumnKind::Text,
        }
    }

    fn select_expr(&self, column: &str) -> String {
        let quoted = quote_ident(column);
        match self {
            ColumnKind::Integer => format!("{quoted}::int8 AS {quoted}"),
            ColumnKind::Float => format!("{quoted}::float8 AS {quoted}"),
            ColumnKind::Boolean => quoted,
            ColumnKind::Text => format!("{quoted}::text AS {quoted}"),
        }
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Reads the training relation from PostgreSQL in one query
#[derive(Clone)]
pub struct PostgresSource {
    database_url: String,
    relation: RelationName,
}

impl std::fmt::Debug for PostgresSource {
    // the URL carries credentials
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSource")
            .field("relation", &self.relation)
            .finish_non_exhaustive()
    }
}

impl PostgresSource {
    pub fn new(database_url: impl Into<String>, relation: &str) -> Result<Self> {
        let database_url = database_url.into();
        if database_url.trim().is_empty() {
            return Err(TrainerError::Configuration(
                "DATABASE_URL is empty".to_string(),
            ));
        }
        Ok(Self {
            database_url,
            relation: RelationName::parse(relation)?,
        })
    }

    /// Build from the pipeline configuration. Fails before any I/O when the
    /// connection descriptor is absent.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            TrainerError::Configuration(
                "DATABASE_URL is not set; cannot reach the training store".to_string(),
            )
        })?;
        Self::new(url, &config.source_relation)
    }

    pub fn relation(&self) -> &RelationName {
        &self.relation
    }

    async fn fetch_async(&self) -> Result<DataFrame> {
        let mut conn = PgConnection::connect(&self.database_url)
            .await
            .map_err(|e| TrainerError::Connectivity(format!("failed to connect: {e}")))?;

        let columns = describe_relation(&mut conn, &self.relation).await?;
        if columns.is_empty() {
            if let Err(e) = conn.close().await {
                debug!(error = %e, "Closing connection after empty describe failed");
            }
            return Err(TrainerError::Connectivity(format!(
                "relation {} does not exist or exposes no columns",
                self.relation
            )));
        }

        let select_list: Vec<String> = columns
            .iter()
            .map(|(name, kind)| kind.select_expr(name))
            .collect();
        let sql = format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            self.relation.quoted()
        );
        debug!(sql = %sql, "Reading training relation");

        let rows = sqlx::query(&sql)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| TrainerError::Connectivity(format!("read of {} failed: {e}", self.relation)))?;

        conn.close()
            .await
            .map_err(|e| TrainerError::Connectivity(format!("failed to close connection: {e}")))?;

        rows_to_frame(&columns, &rows)
    }
}

impl DataSource for PostgresSource {
    fn describe(&self) -> String {
        format!("postgres relation {}", self.relation)
    }

    fn fetch(&self) -> Result<RawDataset> {
        let start = Instant::now();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TrainerError::Connectivity(format!("failed to start I/O runtime: {e}")))?;

        let frame = runtime.block_on(self.fetch_async())?;
        info!(
            relation = %self.relation,
            rows = frame.height(),
            cols = frame.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched training relation"
        );
        RawDataset::new(frame)
    }
}

async fn describe_relation(
    conn: &mut PgConnection,
    relation: &RelationName,
) -> Result<Vec<(String, ColumnKind)>> {
    let rows = sqlx::query(
        "SELECT column_name::text AS column_name, data_type::text AS data_type
         FROM information_schema.columns
         WHERE table_schema = $1 AND table_name = $2
         ORDER BY ordinal_position",
    )
    .bind(&relation.schema)
    .bind(&relation.table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| TrainerError::Connectivity(format!("failed to describe {relation}: {e}")))?;

    rows.iter()
        .map(|row| -> Result<(String, ColumnKind)> {
            let name: String = row
                .try_get("column_name")
                .map_err(|e| decode_error("column_name", e))?;
            let data_type: String = row
                .try_get("data_type")
                .map_err(|e| decode_error("data_type", e))?;
            Ok((name, ColumnKind::from_pg_type(&data_type)))
        })
        .collect()
}

fn rows_to_frame(columns: &[(String, ColumnKind)], rows: &[PgRow]) -> Result<DataFrame> {
    let frame_columns = columns
        .iter()
        .enumerate()
        .map(|(idx, (name, kind))| -> Result<Column> {
            let name: PlSmallStr = name.as_str().into();
            let column = match kind {
                ColumnKind::Integer => {
                    let values = decode_column::<i64>(rows, idx, &name)?;
                    Column::new(name, values)
                }
                ColumnKind::Float => {
                    let values = decode_column::<f64>(rows, idx, &name)?;
                    Column::new(name, values)
                }
                ColumnKind::Boolean => {
                    let values = decode_column::<bool>(rows, idx, &name)?;
                    Column::new(name, values)
                }
                ColumnKind::Text => {
                    let values = decode_column::<String>(rows, idx, &name)?;
                    Column::new(name, values)
                }
            };
            Ok(column)
        })
        .collect::<Result<Vec<Column>>>()?;

    Ok(DataFrame::new(frame_columns)?)
}

fn decode_column<T>(rows: &[PgRow], idx: usize, name: &str) -> Result<Vec<Option<T>>>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    rows.iter()
        .map(|row| row.try_get::<Option<T>, _>(idx).map_err(|e| decode_error(name, e)))
        .collect()
}

/// A value the driver cannot read as the column's declared type
fn decode_error(column: &str, err: sqlx::Error) -> TrainerError {
    TrainerError::Schema(format!("column '{}' could not be decoded: {}", column, err))
}
