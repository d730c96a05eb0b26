//! Core types for the Payssion protocol

use crate::signature::FieldSource;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Base URL of the live gateway
pub const LIVE_URL_HOST: &str = "https://www.payssion.com";

/// Base URL of the sandbox gateway
pub const SANDBOX_URL_HOST: &str = "https://sandbox.payssion.com";

/// Path of the create-payment endpoint
pub const CREATE_PAYMENT_PATH: &str = "/api/v1/payment/create";

/// Content type of outbound request bodies
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// `result_code` the gateway uses for a successful call
pub const RESULT_CODE_SUCCESS: i64 = 200;

/// Field names used on the wire
pub mod fields {
    pub const API_KEY: &str = "api_key";
    pub const API_SIG: &str = "api_sig";
    pub const PM_ID: &str = "pm_id";
    pub const AMOUNT: &str = "amount";
    pub const CURRENCY: &str = "currency";
    pub const DESCRIPTION: &str = "description";
    pub const ORDER_ID: &str = "order_id";
    pub const RETURN_URL: &str = "return_url";
    pub const PAYER_EMAIL: &str = "payer_email";
    pub const PAYER_NAME: &str = "payer_name";
    pub const APP_NAME: &str = "app_name";
    pub const TRANSACTION_ID: &str = "transaction_id";
    pub const PAID: &str = "paid";
    pub const NET: &str = "net";
    pub const STATE: &str = "state";
    pub const NOTIFY_SIG: &str = "notify_sig";
}

/// Gateway environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production gateway
    Live,
    /// Test gateway
    #[default]
    Sandbox,
}

impl Environment {
    /// Pick an environment from a `live` flag
    pub fn from_live(live: bool) -> Self {
        if live {
            Environment::Live
        } else {
            Environment::Sandbox
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Environment::Live)
    }

    /// Base URL of the gateway for this environment
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Live => LIVE_URL_HOST,
            Environment::Sandbox => SANDBOX_URL_HOST,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Live => f.write_str("live"),
            Environment::Sandbox => f.write_str("sandbox"),
        }
    }
}

/// API key and secret issued by the gateway.
///
/// The secret is only ever used as signature input and is redacted from
/// `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Open set of outbound request fields.
///
/// Keys are kept sorted so the encoded body is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentFields(BTreeMap<String, String>);

impl PaymentFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder-style `set`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode as `application/x-www-form-urlencoded`, keys in sorted order
    pub fn to_form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

impl FieldSource for PaymentFields {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PaymentFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for PaymentFields {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for PaymentFields {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Typed create-payment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Payment method id, e.g. `alipay_cn`
    pub pm_id: String,
    /// Amount as the gateway expects it, e.g. `"1.00"`
    pub amount: String,
    /// ISO currency code
    pub currency: String,
    /// Merchant order id
    pub order_id: String,
    pub description: Option<String>,
    /// Where the payer is sent after paying
    pub return_url: Option<String>,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    /// Additional fields passed through as-is
    pub extra: BTreeMap<String, String>,
}

impl PaymentRequest {
    /// Create a new payment request
    pub fn new(
        pm_id: impl Into<String>,
        amount: impl Into<String>,
        currency: impl Into<String>,
        order_id: impl Into<String>,
    ) -> Self {
        Self {
            pm_id: pm_id.into(),
            amount: amount.into(),
            currency: currency.into(),
            order_id: order_id.into(),
            description: None,
            return_url: None,
            payer_email: None,
            payer_name: None,
            extra: BTreeMap::new(),
        }
    }

    /// Set the order description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the return URL
    pub fn with_return_url(mut self, return_url: impl Into<String>) -> Self {
        self.return_url = Some(return_url.into());
        self
    }

    /// Set the payer email
    pub fn with_payer_email(mut self, payer_email: impl Into<String>) -> Self {
        self.payer_email = Some(payer_email.into());
        self
    }

    /// Set the payer name
    pub fn with_payer_name(mut self, payer_name: impl Into<String>) -> Self {
        self.payer_name = Some(payer_name.into());
        self
    }

    /// Add an arbitrary extra field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Flatten into the open field set the client signs and sends
    pub fn into_fields(self) -> PaymentFields {
        let mut out = PaymentFields::from(self.extra);
        out.set(fields::PM_ID, self.pm_id)
            .set(fields::AMOUNT, self.amount)
            .set(fields::CURRENCY, self.currency)
            .set(fields::ORDER_ID, self.order_id);

        let optional = [
            (fields::DESCRIPTION, self.description),
            (fields::RETURN_URL, self.return_url),
            (fields::PAYER_EMAIL, self.payer_email),
            (fields::PAYER_NAME, self.payer_name),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                out.set(key, value);
            }
        }
        out
    }
}

impl From<PaymentRequest> for PaymentFields {
    fn from(request: PaymentRequest) -> Self {
        request.into_fields()
    }
}

/// Decoded create-payment response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub result_code: i64,
    /// Transaction object, kept open since the gateway adds keys over time
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub redirect_url: String,
    /// Unknown top-level keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CreatePaymentResult {
    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_CODE_SUCCESS
    }

    /// Gateway transaction id, if the response carried one
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction
            .get(fields::TRANSACTION_ID)
            .and_then(Value::as_str)
    }

    /// Payment state reported in the transaction object
    pub fn state(&self) -> Option<PaymentState> {
        self.transaction
            .get(fields::STATE)
            .and_then(Value::as_str)
            .map(PaymentState::from)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Payment state as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentState {
    Pending,
    Completed,
    PaidPartial,
    Failed,
    Cancelled,
    Expired,
    Refunded,
    RefundPending,
    Chargeback,
    /// Any state this crate does not know about
    Other(String),
}

impl PaymentState {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Completed => "completed",
            PaymentState::PaidPartial => "paid_partial",
            PaymentState::Failed => "failed",
            PaymentState::Cancelled => "cancelled",
            PaymentState::Expired => "expired",
            PaymentState::Refunded => "refunded",
            PaymentState::RefundPending => "refund_pending",
            PaymentState::Chargeback => "chargeback",
            PaymentState::Other(other) => other,
        }
    }

    /// True once the full amount has been paid
    pub fn is_completed(&self) -> bool {
        matches!(self, PaymentState::Completed)
    }
}

impl From<&str> for PaymentState {
    fn from(state: &str) -> Self {
        match state {
            "pending" => PaymentState::Pending,
            "completed" => PaymentState::Completed,
            "paid_partial" => PaymentState::PaidPartial,
            "failed" => PaymentState::Failed,
            "cancelled" => PaymentState::Cancelled,
            "expired" => PaymentState::Expired,
            "refunded" => PaymentState::Refunded,
            "refund_pending" => PaymentState::RefundPending,
            "chargeback" => PaymentState::Chargeback,
            other => PaymentState::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
