/// Startup provisioning of the first platform administrator
///
/// A fresh database has roles and permissions but no users, so nobody could
/// pass the Permission Gate. When `BOOTSTRAP_ADMIN_EMAIL` and
/// `BOOTSTRAP_ADMIN_PASSWORD` are set, the server makes sure that user exists
/// and holds the seeded `superuser` role. Existing users keep their password.

use bizdir_shared::auth::password::{hash_password, validate_password_strength};
use bizdir_shared::models::role::SUPERUSER_ROLE;
use bizdir_shared::models::user::{CreateUser, User};
use bizdir_shared::models::user_role::UserRole;
use sqlx::PgPool;

use crate::config::BootstrapAdmin;

/// Ensures the configured admin exists and is a platform admin
pub async fn ensure_platform_admin(pool: &PgPool, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    let user = match User::find_by_email(pool, &admin.email).await? {
        Some(user) => user,
        None => {
            validate_password_strength(&admin.password)
                .map_err(|msg| anyhow::anyhow!("BOOTSTRAP_ADMIN_PASSWORD is too weak: {msg}"))?;

            let user = User::create(
                pool,
                CreateUser {
                    email: admin.email.clone(),
                    phone: None,
                    name: Some("Platform Admin".to_string()),
                    password_hash: hash_password(&admin.password)?,
                },
            )
            .await?;
            tracing::info!(user_id = %user.id, "Bootstrap admin created");
            user
        }
    };

    if !user.is_active {
        anyhow::bail!("bootstrap admin {} is deactivated", admin.email);
    }

    if UserRole::assign(pool, user.id, SUPERUSER_ROLE).await? {
        tracing::info!(user_id = %user.id, role = SUPERUSER_ROLE, "Bootstrap admin granted platform role");
    }
    Ok(())
}
