//! Inbound payment notifications
//!
//! Handling a notification is three explicit steps:
//!
//! 1. parse a generic key/value record into an [`InboundNotification`]
//!    ([`InboundNotification::from_fields`], or [`parse_notification_body`]
//!    for a raw HTTP body),
//! 2. check its `notify_sig` with a [`NotificationVerifier`],
//! 3. run the caller's [`NotificationHandler`] through [`dispatch`].
//!
//! [`handle_notification`] chains the three for serving layers that only
//! need an outcome to turn into an HTTP status.

use crate::error::BoxError;
use crate::signature::{self, ComparisonMode, FieldSource, Operation};
use crate::types::{fields, Credentials, PaymentState};
use crate::{PayssionError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Keys every notification must carry
pub const REQUIRED_FIELDS: &[&str] = &[
    fields::PM_ID,
    fields::AMOUNT,
    fields::CURRENCY,
    fields::ORDER_ID,
    fields::STATE,
    fields::NOTIFY_SIG,
];

/// A payment notification posted by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Payment method id, e.g. `alipay_cn`
    pub pm_id: String,
    /// Gateway transaction id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Merchant order id
    pub order_id: String,
    pub amount: String,
    /// Amount actually paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid: Option<String>,
    /// Amount after fees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: String,
    /// Signature claimed by the sender
    pub notify_sig: String,
    /// Keys not covered above
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl InboundNotification {
    /// Build a notification from a key/value record.
    ///
    /// Fails with `MalformedNotification` listing every missing required key.
    pub fn from_fields(mut record: HashMap<String, String>) -> Result<Self> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|key| !record.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(PayssionError::malformed_notification(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let mut take = |key: &str| record.remove(key);
        let required = |value: Option<String>| value.unwrap_or_default();

        let notification = Self {
            app_name: take(fields::APP_NAME),
            pm_id: required(take(fields::PM_ID)),
            transaction_id: take(fields::TRANSACTION_ID),
            order_id: required(take(fields::ORDER_ID)),
            amount: required(take(fields::AMOUNT)),
            paid: take(fields::PAID),
            net: take(fields::NET),
            currency: required(take(fields::CURRENCY)),
            description: take(fields::DESCRIPTION),
            state: required(take(fields::STATE)),
            notify_sig: required(take(fields::NOTIFY_SIG)),
            extra: BTreeMap::new(),
        };

        Ok(Self {
            extra: record.into_iter().collect(),
            ..notification
        })
    }

    /// Parsed payment state
    pub fn payment_state(&self) -> PaymentState {
        PaymentState::from(self.state.as_str())
    }
}

impl FieldSource for InboundNotification {
    fn field(&self, name: &str) -> Option<&str> {
        match name {
            fields::APP_NAME => self.app_name.as_deref(),
            fields::PM_ID => Some(&self.pm_id),
            fields::TRANSACTION_ID => self.transaction_id.as_deref(),
            fields::ORDER_ID => Some(&self.order_id),
            fields::AMOUNT => Some(&self.amount),
            fields::PAID => self.paid.as_deref(),
            fields::NET => self.net.as_deref(),
            fields::CURRENCY => Some(&self.currency),
            fields::DESCRIPTION => self.description.as_deref(),
            fields::STATE => Some(&self.state),
            fields::NOTIFY_SIG => Some(&self.notify_sig),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}

/// Parse a raw notification body into a key/value record.
///
/// `application/json` bodies must be an object of string values; anything
/// else is treated as `application/x-www-form-urlencoded`.
pub fn parse_notification_body(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<HashMap<String, String>> {
    let is_json = content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false);

    if !is_json {
        return Ok(url::form_urlencoded::parse(body).into_owned().collect());
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PayssionError::malformed_notification(format!("invalid JSON body: {}", e)))?;
    let Value::Object(map) = value else {
        return Err(PayssionError::malformed_notification(
            "JSON body must be an object",
        ));
    };

    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            other => Err(PayssionError::malformed_notification(format!(
                "field {} must be a string, got {}",
                key, other
            ))),
        })
        .collect()
}

/// Checks `notify_sig` against the locally computed signature
#[derive(Debug, Clone)]
pub struct NotificationVerifier {
    credentials: Credentials,
    comparison: ComparisonMode,
}

impl NotificationVerifier {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self::from_credentials(Credentials::new(api_key, api_secret))
    }

    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            comparison: ComparisonMode::default(),
        }
    }

    /// Choose how signatures are compared
    pub fn with_comparison(mut self, comparison: ComparisonMode) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    pub fn comparison(&self) -> ComparisonMode {
        self.comparison
    }

    /// Signature the sender should have produced for this record.
    ///
    /// `api_key` always comes from our credentials, never from the record.
    pub fn expected_signature<S: FieldSource>(&self, record: &S) -> String {
        let record = record.with_override(fields::API_KEY, &self.credentials.api_key);
        signature::sign(Operation::Notify, &record, &self.credentials.api_secret)
    }

    /// True if the notification's `notify_sig` matches
    pub fn verify(&self, notification: &InboundNotification) -> bool {
        self.verify_record(notification)
    }

    /// Verify an unparsed record; a missing `notify_sig` never matches
    pub fn verify_record<S: FieldSource>(&self, record: &S) -> bool {
        let Some(claimed) = record.field(fields::NOTIFY_SIG) else {
            return false;
        };
        let expected = self.expected_signature(record);
        signature::signatures_match(&expected, claimed, self.comparison)
    }

    /// Like [`verify`](Self::verify) but as a `Result` carrying `Unauthorized`
    pub fn check(&self, notification: &InboundNotification) -> Result<()> {
        if self.verify(notification) {
            Ok(())
        } else {
            warn!(
                order_id = %notification.order_id,
                pm_id = %notification.pm_id,
                "notification signature mismatch"
            );
            Err(PayssionError::Unauthorized)
        }
    }
}

/// Verify a notification with explicit credentials
pub fn verify(notification: &InboundNotification, api_key: &str, api_secret: &str) -> bool {
    NotificationVerifier::new(api_key, api_secret).verify(notification)
}

/// Business logic run for a verified notification
pub trait NotificationHandler: Send + Sync {
    fn handle(&self, notification: &InboundNotification) -> std::result::Result<(), BoxError>;
}

impl<F, E> NotificationHandler for F
where
    F: Fn(&InboundNotification) -> std::result::Result<(), E> + Send + Sync,
    E: Into<BoxError>,
{
    fn handle(&self, notification: &InboundNotification) -> std::result::Result<(), BoxError> {
        self(notification).map_err(Into::into)
    }
}

/// Run the handler for an already verified notification
pub fn dispatch<H>(handler: &H, notification: &InboundNotification) -> Result<()>
where
    H: NotificationHandler + ?Sized,
{
    handler.handle(notification).map_err(|e| {
        warn!(order_id = %notification.order_id, error = %e, "notification handler failed");
        PayssionError::Handler(e)
    })
}

/// Parse, verify, then dispatch.
///
/// Returns the notification on success. The handler runs only when the
/// signature matches, and runs at most once.
pub fn handle_notification<H>(
    verifier: &NotificationVerifier,
    record: HashMap<String, String>,
    handler: &H,
) -> Result<InboundNotification>
where
    H: NotificationHandler + ?Sized,
{
    let notification = InboundNotification::from_fields(record)?;
    debug!(
        order_id = %notification.order_id,
        state = %notification.state,
        "received notification"
    );

    verifier.check(&notification)?;
    dispatch(handler, &notification)?;

    info!(
        order_id = %notification.order_id,
        state = %notification.state,
        "notification handled"
    );
    Ok(notification)
}
