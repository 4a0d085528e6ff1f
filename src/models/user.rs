use sqlx::PgPool;
use uuid::Uuid;

/// The core only ever needs to know who a user is and whether they may
/// trade; the rest of the user record (email, role, credentials) is
/// owned by the surrounding system.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub active: bool,
}

impl User {
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT id, active FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
