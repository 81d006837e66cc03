//! Audit trail: append-only records of every state-changing action.

use rusqlite::Connection;
use strum::{AsRefStr, EnumString};

use crate::context::RequestContext;
use crate::db::queries;
use crate::error::Result;
use crate::models::{ActorType, AuditLog, NewAuditLog, TransactionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    MerchantCreated,
    CustomerCreated,
    PaymentMethodCreated,
    PaymentIntentCreated,
    PaymentAuthorized,
    PaymentAuthorizationFailed,
    PaymentCaptured,
    PaymentCaptureFailed,
    PaymentVoided,
    PaymentVoidFailed,
    PaymentRefunded,
    PaymentRefundFailed,
    ChargebackOpened,
}

impl AuditAction {
    /// Action recorded for a state-machine operation outcome.
    pub fn for_operation(kind: TransactionKind, succeeded: bool) -> Self {
        match (kind, succeeded) {
            (TransactionKind::Authorize, true) => Self::PaymentAuthorized,
            (TransactionKind::Authorize, false) => Self::PaymentAuthorizationFailed,
            (TransactionKind::Capture, true) => Self::PaymentCaptured,
            (TransactionKind::Capture, false) => Self::PaymentCaptureFailed,
            (TransactionKind::Void, true) => Self::PaymentVoided,
            (TransactionKind::Void, false) => Self::PaymentVoidFailed,
            (TransactionKind::Refund, true) => Self::PaymentRefunded,
            (TransactionKind::Refund, false) => Self::PaymentRefundFailed,
        }
    }
}

/// Builder for audit log entries.
///
/// ```ignore
/// AuditLogBuilder::new(&tx, ctx)
///     .actor(ActorType::Merchant, Some(&merchant_id))
///     .action(AuditAction::PaymentCaptured)
///     .resource("transaction", &txn.id)
///     .metadata(serde_json::json!({ "amount_cents": txn.amount_cents }))
///     .save()?;
/// ```
pub struct AuditLogBuilder<'a> {
    conn: &'a Connection,
    ctx: &'a RequestContext,
    merchant_id: Option<&'a str>,
    actor_type: ActorType,
    actor_id: Option<&'a str>,
    action: Option<AuditAction>,
    resource_type: &'a str,
    resource_id: &'a str,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl<'a> AuditLogBuilder<'a> {
    pub fn new(conn: &'a Connection, ctx: &'a RequestContext) -> Self {
        Self {
            conn,
            ctx,
            merchant_id: None,
            actor_type: ActorType::System,
            actor_id: None,
            action: None,
            resource_type: "",
            resource_id: "",
            metadata: serde_json::Map::new(),
        }
    }

    /// Attribute the entry to a merchant acting on its own resources.
    pub fn merchant(mut self, merchant_id: &'a str) -> Self {
        self.merchant_id = Some(merchant_id);
        self.actor_type = ActorType::Merchant;
        self.actor_id = Some(merchant_id);
        self
    }

    pub fn actor(mut self, actor_type: ActorType, actor_id: Option<&'a str>) -> Self {
        self.actor_type = actor_type;
        self.actor_id = actor_id;
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn resource(mut self, resource_type: &'a str, resource_id: &'a str) -> Self {
        self.resource_type = resource_type;
        self.resource_id = resource_id;
        self
    }

    /// Merge fields into the metadata. Non-object values are ignored.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = metadata {
            self.metadata.extend(map);
        }
        self
    }

    /// Save the entry, stamping `request_id` and `timestamp` into the metadata.
    pub fn save(mut self) -> Result<AuditLog> {
        let action = self.action.ok_or_else(|| {
            crate::error::AppError::Internal("audit entry saved without an action".into())
        })?;

        self.metadata.insert(
            "request_id".into(),
            serde_json::Value::String(self.ctx.request_id.clone()),
        );
        self.metadata.insert(
            "timestamp".into(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );

        queries::create_audit_log(
            self.conn,
            &NewAuditLog {
                merchant_id: self.merchant_id.map(String::from),
                actor_type: self.actor_type,
                actor_id: self.actor_id.map(String::from),
                action: action.as_ref().to_string(),
                auditable_type: self.resource_type.to_string(),
                auditable_id: self.resource_id.to_string(),
                metadata: serde_json::Value::Object(self.metadata),
            },
        )
    }
}
