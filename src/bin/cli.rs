use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use annotation_rbac::authz::{Role, RoleRegistry};
use annotation_rbac::db::{self, SqliteMembershipStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "annotation-rbac administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Give a user a role in a project
    AddMember {
        project: Uuid,
        /// Email of the user to add
        email: String,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Change the role of an existing member
    SetRole {
        project: Uuid,
        email: String,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Remove a user from a project
    RemoveMember { project: Uuid, email: String },
    /// List the members of a project
    ListMembers { project: Uuid },
    /// Print the effective permission table, including AUTHZ_* overrides
    Policy,
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse::<Role>().map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // fall back to the crate-local `.env` when run outside the repo root
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            db::init().await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            print_status(&pool, &sqlx::migrate!()).await?;
        }
        Commands::AddMember { project, email, role } => {
            let pool = db::init().await?;
            let user_id = user_id_by_email(&pool, &email).await?;
            let membership = SqliteMembershipStore::new(pool).add(project, user_id, role).await?;
            println!("{} is now {} in {}", email, membership.role, project);
        }
        Commands::SetRole { project, email, role } => {
            let pool = db::init().await?;
            let user_id = user_id_by_email(&pool, &email).await?;
            let updated = SqliteMembershipStore::new(pool)
                .change_role(project, user_id, role)
                .await?
                .with_context(|| format!("{email} is not a member of {project}"))?;
            println!("{} is now {} in {}", email, updated.role, project);
        }
        Commands::RemoveMember { project, email } => {
            let pool = db::init().await?;
            let user_id = user_id_by_email(&pool, &email).await?;
            if !SqliteMembershipStore::new(pool).remove_member(project, user_id).await? {
                anyhow::bail!("{email} is not a member of {project}");
            }
            println!("Removed {} from {}", email, project);
        }
        Commands::ListMembers { project } => {
            let pool = db::init().await?;
            let members = SqliteMembershipStore::new(pool.clone()).members_of(project).await?;

            println!("{:<40} {}", "Email", "Role");
            for member in members {
                let email = email_by_user_id(&pool, member.user_id).await?;
                println!("{:<40} {}", email, member.role.as_str());
            }
        }
        Commands::Policy => {
            let registry = RoleRegistry::from_env()?;
            println!("{:<10} {:<10} {}", "Resource", "Operation", "Roles");
            for (kind, operation, roles) in registry.iter() {
                let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
                println!("{:<10} {:<10} {}", kind.as_str(), operation.as_str(), names.join(", "));
            }
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn user_id_by_email(pool: &SqlitePool, email: &str) -> anyhow::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no user with email {email}"))
}

async fn email_by_user_id(pool: &SqlitePool, user_id: Uuid) -> anyhow::Result<String> {
    sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no user with id {user_id}"))
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}
