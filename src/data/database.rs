//! SQLite database operations
//!
//! All database access goes through this module.

use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get a user by local id
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user by identity-provider subject id
    pub async fn get_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_id = ?")
            .bind(google_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Insert a user unless one with the same `google_id` already exists.
    ///
    /// A duplicate `email` under a different `google_id` is still a
    /// constraint violation and surfaces as `AppError::Database`.
    ///
    /// # Returns
    /// `true` if inserted, `false` if the external id was already known.
    pub async fn insert_user_if_absent(&self, user: &User) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                id, google_id, name, email, profile_picture, role, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(google_id) DO NOTHING
            "#,
        )
        .bind(&user.id)
        .bind(&user.google_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.profile_picture)
        .bind(&user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Replace a user's profile picture
    pub async fn update_user_picture(
        &self,
        id: &str,
        profile_picture: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET profile_picture = ?, updated_at = ? WHERE id = ?")
            .bind(profile_picture)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Change a user's role
    ///
    /// # Returns
    /// `false` if no such user exists
    pub async fn update_user_role(&self, id: &str, role: Role) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Promote every user whose email is in `emails` to admin
    ///
    /// # Returns
    /// Number of users whose role changed
    pub async fn promote_users_by_email(&self, emails: &[String]) -> Result<u64, AppError> {
        if emails.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET role = ");
        builder.push_bind(Role::Admin.as_str());
        builder.push(", updated_at = ");
        builder.push_bind(Utc::now());
        builder.push(" WHERE role != ");
        builder.push_bind(Role::Admin.as_str());
        builder.push(" AND email IN (");
        let mut separated = builder.separated(", ");
        for email in emails {
            separated.push_bind(email);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// List all users, oldest first
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Insert a listing together with its viewing schedule
    pub async fn insert_listing(&self, listing: &Listing) -> Result<(), AppError> {
        let details = &listing.details;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO listings (
                id, property_type, neighborhood, municipality, department,
                property_address, longitude, latitude, property_size,
                property_bedrooms, property_bathrooms, property_floors,
                property_parking, property_furnished, property_description,
                property_price, availability, seller_id, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&listing.id)
        .bind(&details.property_type)
        .bind(&details.neighborhood)
        .bind(&details.municipality)
        .bind(&details.department)
        .bind(&details.property_address)
        .bind(details.longitude)
        .bind(details.latitude)
        .bind(&details.property_size)
        .bind(&details.property_bedrooms)
        .bind(&details.property_bathrooms)
        .bind(&details.property_floors)
        .bind(details.property_parking)
        .bind(&details.property_furnished)
        .bind(&details.property_description)
        .bind(&details.property_price)
        .bind(&details.availability)
        .bind(&listing.seller)
        .bind(listing.status)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, slot) in details.schedule_viewing.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO listing_viewings (
                    listing_id, position, day, start_hour, start_minute,
                    finish_hour, finish_minute
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&listing.id)
            .bind(position as i64)
            .bind(&slot.day)
            .bind(&slot.start_hour)
            .bind(&slot.start_minute)
            .bind(&slot.finish_hour)
            .bind(&slot.finish_minute)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get one listing with its viewing schedule
    pub async fn get_listing(&self, id: &str) -> Result<Option<Listing>, AppError> {
        let Some(row) = sqlx::query_as::<_, ListingRow>("SELECT * FROM listings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let schedule = sqlx::query_as::<_, ViewingRow>(
            "SELECT * FROM listing_viewings WHERE listing_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ViewingSlot::from)
        .collect();

        Ok(Some(row.into_listing(schedule)))
    }

    /// List all listings, oldest first
    pub async fn list_listings(&self) -> Result<Vec<Listing>, AppError> {
        let rows = sqlx::query_as::<_, ListingRow>(
            "SELECT * FROM listings ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut schedules: HashMap<String, Vec<ViewingSlot>> = HashMap::new();
        let viewings = sqlx::query_as::<_, ViewingRow>(
            "SELECT * FROM listing_viewings ORDER BY listing_id, position",
        )
        .fetch_all(&self.pool)
        .await?;
        for viewing in viewings {
            schedules
                .entry(viewing.listing_id.clone())
                .or_default()
                .push(viewing.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let schedule = schedules.remove(&row.id).unwrap_or_default();
                row.into_listing(schedule)
            })
            .collect())
    }
}
