//! # Location Repository
//!
//! Registration and lookup of shops and warehouses. The registration forms
//! themselves live outside the core; this is the data layer they commit to.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use caravel_core::validation::validate_name;
use caravel_core::{CoreError, Location, LocationKind};

use crate::error::{DbError, DbResult};

/// Repository for location database operations.
#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    /// Creates a new LocationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    /// Registers a shop or warehouse.
    pub async fn create(&self, name: &str, kind: LocationKind) -> DbResult<Location> {
        validate_name("location name", name).map_err(CoreError::from)?;

        let location = Location {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            kind,
            created_at: Utc::now(),
        };

        debug!(id = %location.id, name = %location.name, ?kind, "Registering location");

        sqlx::query(
            r#"
            INSERT INTO locations (id, name, kind, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&location.id)
        .bind(&location.name)
        .bind(location.kind)
        .bind(location.created_at)
        .execute(&self.pool)
        .await?;

        Ok(location)
    }

    /// Gets a location by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, name, kind, created_at
            FROM locations
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    /// Lists all locations, optionally filtered by kind.
    pub async fn list(&self, kind: Option<LocationKind>) -> DbResult<Vec<Location>> {
        let locations = match kind {
            Some(kind) => {
                sqlx::query_as::<_, Location>(
                    r#"
                    SELECT id, name, kind, created_at
                    FROM locations
                    WHERE kind = ?1
                    ORDER BY name
                    "#,
                )
                .bind(kind)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Location>(
                    r#"
                    SELECT id, name, kind, created_at
                    FROM locations
                    ORDER BY name
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(locations)
    }
}

/// Fetches a location inside an open transaction.
pub(crate) async fn get_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Location> {
    sqlx::query_as::<_, Location>(
        r#"
        SELECT id, name, kind, created_at
        FROM locations
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("Location", id))
}
