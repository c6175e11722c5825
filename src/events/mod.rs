use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub severity: Severity,
    pub payload: Value,
}

pub type EventBus = broadcast::Sender<DomainEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<DomainEvent>) {
    broadcast::channel(1024)
}

/// Publishes `<entity_type>.<action>` for `entity`. Delivery is best effort:
/// with no listener attached the event is dropped.
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    project_id: Option<Uuid>,
    entity: &T,
) {
    let event = DomainEvent {
        id: Uuid::new_v4(),
        name: format!("{}.{}", T::entity_type(), action),
        occurred_at: Utc::now(),
        actor_id,
        subject_id: Some(entity.subject_id()),
        project_id,
        severity: entity.severity_for_action(action),
        payload: serde_json::to_value(entity).unwrap_or_default(),
    };

    if event_bus.send(event).is_err() {
        tracing::debug!("activity event dropped: no listener");
    }
}

fn describe(name: &str) -> &'static str {
    match name {
        "project.created" => "Project created",
        "project.deleted" => "Project deleted",
        "tag.created" => "Tag created",
        "tag.deleted" => "Tag deleted",
        "membership.added" => "Member added",
        "membership.updated" => "Member role changed",
        "membership.removed" => "Member removed",
        _ => "System event",
    }
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<DomainEvent>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, project_id, occurred_at, severity, properties)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(describe(&event.name))
        .bind(event.actor_id)
        .bind(event.subject_id)
        .bind(event.project_id)
        .bind(event.occurred_at)
        .bind(event.severity.as_str())
        .bind(event.payload.to_string())
        .execute(&pool)
        .await;

        if let Err(e) = result {
            tracing::error!("failed to save activity log: {}", e);
        }
    }
    tracing::info!("activity listener stopped");
}
