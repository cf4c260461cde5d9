/// Authentication and authorization
///
/// - [`password`]: Argon2id password hashing and strength checks
/// - [`jwt`]: HS256 access/refresh tokens bound to a session
/// - [`session`]: login, refresh with rotation, logout
/// - [`middleware`]: Axum bearer-token middleware producing [`middleware::AuthContext`]
/// - [`authorization`]: the Permission Gate and seeded permission names
///
/// # Example
///
/// ```no_run
/// use bizdir_shared::auth::authorization::{perms, require_permission};
/// use bizdir_shared::auth::password::hash_password;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, caller: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Sup3r-secret!")?;
/// require_permission(&pool, caller, perms::USERS_CREATE).await?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;
