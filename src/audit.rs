use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Request metadata captured for audit entries: HTTP method, endpoint
/// path and the caller IP (first hop of x-forwarded-for when present).
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub method: String,
    pub endpoint: String,
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let ip_address = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_string());

        Ok(RequestMeta {
            ip_address,
            method: parts.method.to_string(),
            endpoint: parts.uri.path().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub method: String,
    pub endpoint: String,
    pub status: String,
}

impl AuditEntry {
    pub fn success(
        meta: &RequestMeta,
        user_id: Option<Uuid>,
        action: &str,
        description: impl Into<String>,
    ) -> Self {
        Self::with_status(meta, user_id, action, description, "success")
    }

    pub fn failed(
        meta: &RequestMeta,
        user_id: Option<Uuid>,
        action: &str,
        description: impl Into<String>,
    ) -> Self {
        Self::with_status(meta, user_id, action, description, "failed")
    }

    fn with_status(
        meta: &RequestMeta,
        user_id: Option<Uuid>,
        action: &str,
        description: impl Into<String>,
        status: &str,
    ) -> Self {
        Self {
            user_id,
            action: action.to_string(),
            description: description.into(),
            ip_address: meta.ip_address.clone(),
            method: meta.method.clone(),
            endpoint: meta.endpoint.clone(),
            status: status.to_string(),
        }
    }
}

pub async fn log_audit(pool: &DbPool, entry: &AuditEntry) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, description, ip_address, method, endpoint, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(id)
    .bind(entry.user_id)
    .bind(&entry.action)
    .bind(&entry.description)
    .bind(&entry.ip_address)
    .bind(&entry.method)
    .bind(&entry.endpoint)
    .bind(&entry.status)
    .execute(pool)
    .await?;

    Ok(())
}

/// Detached best-effort append. The write runs on its own task and is
/// never awaited on the request path; failures are only traced.
pub fn record(pool: &DbPool, entry: AuditEntry) {
    let pool = pool.clone();
    tokio::spawn(async move {
        if let Err(err) = log_audit(&pool, &entry).await {
            tracing::warn!(error = %err, action = %entry.action, "audit log failed");
        }
    });
}
