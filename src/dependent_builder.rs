use std::fmt;

use async_trait::async_trait;
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::prelude::FromRow;
use sqlx_postgres::PgPool;
use tracing::debug;

use crate::error::ResolutionError;
use crate::queries::*;
use crate::resolver::DependencyResolver;

// plain or double-quoted identifier, optionally schema-qualified
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:[A-Za-z_][A-Za-z0-9_$]*|"(?:[^"]|"")+")(?:\.(?:[A-Za-z_][A-Za-z0-9_$]*|"(?:[^"]|"")+"))?$"#,
    )
    .expect("identifier pattern is valid")
});

static BARE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("bare identifier pattern is valid"));

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Quotes `ident` the way Postgres' `quote_ident` does: lower-case names stay
/// bare, anything else is wrapped in double quotes with inner quotes doubled.
pub fn quote_ident(ident: &str) -> String {
    if BARE_IDENTIFIER.is_match(ident) {
        return ident.to_string();
    }
    return format!("\"{}\"", ident.replace('"', "\"\""));
}

#[derive(FromRow, Debug)]
struct DependentView {
    view_name: String,
}

/// Definition data for a view or materialized view.
#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
pub struct ViewData {
    pub schema_name: String,
    pub view_name: String,
    pub view_owner: String,
    pub definition: String,
}

impl ViewData {
    pub fn get_full_name(&self) -> String {
        return format!("{}.{}", &self.schema_name, &self.view_name);
    }

    /// Schema-qualified name, quoted where needed, safe to splice into SQL.
    pub fn get_qualified_name(&self) -> String {
        return format!(
            "{}.{}",
            quote_ident(&self.schema_name),
            quote_ident(&self.view_name)
        );
    }
}

impl fmt::Display for ViewData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} owned by {}",
            self.get_full_name().bold().bright_magenta(),
            self.view_owner.bold().blue()
        )
    }
}

#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
pub struct ViewGrant {
    pub grantee: String,
    /// Comma separated privilege types, e.g. `DELETE, INSERT, SELECT`.
    pub privileges: String,
}

/// Postgres session used to resolve dependents and read view definitions.
/// Cloning is cheap and clones share the pool.
#[derive(Clone, Debug)]
pub struct DependentBuilder {
    pub pool: PgPool,
}

impl DependentBuilder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `None` when `name` is not a view (a table, or nothing at all).
    pub async fn get_view_data(&self, name: &str) -> Result<Option<ViewData>, sqlx::Error> {
        let row: Option<ViewData> = sqlx::query_as(GET_VIEW_DATA)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        return Ok(row);
    }

    pub async fn get_view_grants(&self, view: &ViewData) -> Result<Vec<ViewGrant>, sqlx::Error> {
        let rows: Vec<ViewGrant> = sqlx::query_as(GET_VIEW_GRANTS)
            .bind(&view.schema_name)
            .bind(&view.view_name)
            .fetch_all(&self.pool)
            .await?;

        return Ok(rows);
    }
}

#[async_trait]
impl DependencyResolver for DependentBuilder {
    async fn dependents(&self, name: &str) -> Result<Vec<String>, ResolutionError> {
        if !is_valid_identifier(name) {
            return Err(ResolutionError::InvalidIdentifier(name.to_string()));
        }

        let rows: Vec<DependentView> = sqlx::query_as(GET_DEPENDENT_VIEWS)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| ResolutionError::Query {
                name: name.to_string(),
                source,
            })?;

        debug!(name, rows = rows.len(), "fetched dependent views");
        return Ok(rows.into_iter().map(|row| row.view_name).collect());
    }
}
