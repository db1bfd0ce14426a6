//! Shared fixtures for database-backed tests.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::lifecycle::{self, LifecycleEvent};
use crate::models::{Freelancer, NewFreelancer, NewProject, Project};

/// Fresh in-memory database with migrations applied.  Capped at one
/// connection: every connection to `sqlite::memory:` opens its own database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

pub async fn seed_freelancer(pool: &SqlitePool) -> Freelancer {
    db::insert_freelancer(
        pool,
        &NewFreelancer {
            user_id: Uuid::new_v4().to_string(),
            business_name: Some("Studio Vidi".to_string()),
            subdomain: None,
        },
    )
    .await
    .expect("seed freelancer")
}

pub async fn seed_project(pool: &SqlitePool, freelancer_id: &str, price_minor: i64) -> Project {
    db::insert_project(
        pool,
        &NewProject {
            freelancer_id: freelancer_id.to_string(),
            client_email: "client@example.com".to_string(),
            client_name: Some("Client".to_string()),
            title: "Logo animation".to_string(),
            description: Some("30s intro".to_string()),
            category: Some("motion".to_string()),
            price_minor,
            deadline: None,
        },
    )
    .await
    .expect("seed project")
}

/// Seed a project and walk it to `approved`.
pub async fn approved_project(pool: &SqlitePool, freelancer_id: &str, price_minor: i64) -> Project {
    let project = seed_project(pool, freelancer_id, price_minor).await;
    lifecycle::transition_project(pool, &project.id, LifecycleEvent::SendPreview)
        .await
        .expect("send preview");
    lifecycle::transition_project(pool, &project.id, LifecycleEvent::Approve)
        .await
        .expect("approve")
}
