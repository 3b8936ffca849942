//! Seeds the default admin accounts.
//!
//! Usage:
//!   DATABASE_URL=... ./seed-admins [--password <PASSWORD>]
//!
//! Upserts `admin` (SUPER) and `test` (NORMAL) with a bcrypt hash of the
//! given password and clears any outstanding refresh token. Safe to re-run.

use anyhow::{Context, Result};
use clap::Parser;

use booking_api::{db, models::principal::Role, services::password::hash_password};

#[derive(Debug, Parser)]
#[command(name = "seed-admins", about = "Create or reset the default admin accounts")]
struct Args {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Password set on every seeded account
    #[arg(long, env = "SEED_PASSWORD", default_value = "123456")]
    password: String,

    #[arg(long, env = "BCRYPT_COST", default_value_t = 10)]
    bcrypt_cost: u32,
}

const ACCOUNTS: [(&str, Role); 2] = [("admin", Role::Super), ("test", Role::Normal)];

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let pool = db::create_pool(&args.database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool).await?;

    for (username, role) in ACCOUNTS {
        let hash = hash_password(&args.password, args.bcrypt_cost)?;
        sqlx::query(
            "INSERT INTO admins (username, password_hash, role)
             VALUES ($1, $2, $3)
             ON CONFLICT (username) DO UPDATE
             SET password_hash = EXCLUDED.password_hash,
                 role = EXCLUDED.role,
                 refresh_token_hash = NULL,
                 updated_at = NOW()",
        )
        .bind(username)
        .bind(&hash)
        .bind(role.to_string())
        .execute(&pool)
        .await
        .with_context(|| format!("Failed to seed {username}"))?;

        println!("  {username} ({role})");
    }

    println!("Seeded {} accounts", ACCOUNTS.len());
    Ok(())
}
