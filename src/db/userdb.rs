use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;
use super::DbError;
use crate::models::{
    clientmodel::Client,
    labourmodel::{Labour, NewLabour},
    usermodel::{NewUser, User},
};

const USER_COLUMNS: &str = "id, email, phone, password, role, verified, created_at, updated_at";

#[async_trait]
pub trait UserExt {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DbError>;

    /// Finds the user whose email or phone matches either of the given values.
    async fn find_user_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<User>, DbError>;

    async fn save_user(&self, user: NewUser) -> Result<User, DbError>;

    /// Creates the user and its client profile as one unit.
    async fn create_client_account(
        &self,
        user: NewUser,
        name: String,
        company: Option<String>,
    ) -> Result<(User, Client), DbError>;

    /// Creates the user and its (pending) labour profile as one unit.
    async fn create_labour_account(
        &self,
        user: NewUser,
        profile: NewLabour,
    ) -> Result<(User, Labour), DbError>;
}

async fn insert_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user: NewUser,
) -> Result<User, DbError> {
    if !user.has_contact() {
        return Err(DbError::InvalidRecord(
            "either email or phone must be provided".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, email, phone, password, role, verified)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user.email)
    .bind(user.phone)
    .bind(user.password_hash)
    .bind(user.role)
    .bind(user.verified)
    .fetch_one(&mut **tx)
    .await?;

    Ok(user)
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<User>, DbError> {
        if email.is_none() && phone.is_none() {
            return Ok(None);
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::text IS NOT NULL AND email = $1)
               OR ($2::text IS NOT NULL AND phone = $2)
            ORDER BY created_at
            LIMIT 1
            "#
        ))
        .bind(email)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn save_user(&self, user: NewUser) -> Result<User, DbError> {
        let mut tx = self.pool.begin().await?;
        let user = insert_user(&mut tx, user).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn create_client_account(
        &self,
        user: NewUser,
        name: String,
        company: Option<String>,
    ) -> Result<(User, Client), DbError> {
        let mut tx = self.pool.begin().await?;

        let user = insert_user(&mut tx, user).await?;

        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, user_id, name, company)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, company, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(name)
        .bind(company)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((user, client))
    }

    async fn create_labour_account(
        &self,
        user: NewUser,
        profile: NewLabour,
    ) -> Result<(User, Labour), DbError> {
        let mut tx = self.pool.begin().await?;

        let user = insert_user(&mut tx, user).await?;

        let labour = sqlx::query_as::<_, Labour>(&format!(
            r#"
            INSERT INTO labours (id, user_id, name, category_ids, hourly_rate, city)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            super::labourdb::LABOUR_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(profile.name)
        .bind(profile.category_ids)
        .bind(profile.hourly_rate)
        .bind(profile.city)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((user, labour))
    }
}
