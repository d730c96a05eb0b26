//! # payssion - Payssion payment gateway client
//!
//! Creates signed payments against the Payssion HTTP API and verifies the
//! signed notifications the gateway posts back.
//!
//! Both directions share one signature scheme: the lowercase hex MD5 of a
//! fixed, operation-specific list of field values joined by `|`, with the
//! API secret as the last element. See [`signature`].
//!
//! ```no_run
//! use payssion::{PaymentRequest, PayssionClient};
//!
//! # async fn run() -> payssion::Result<()> {
//! let client = PayssionClient::new("your_api_key", "your_secret_key")?;
//! let result = client
//!     .create_payment(PaymentRequest::new("alipay_cn", "1", "CNY", "order-1"))
//!     .await?;
//! println!("redirect to {}", result.redirect_url);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod notification;
pub mod signature;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::PayssionClient;
pub use config::ClientConfig;
pub use error::{PayssionError, Result};
pub use notification::{
    dispatch, handle_notification, parse_notification_body, verify, InboundNotification,
    NotificationHandler, NotificationVerifier,
};
pub use signature::{ComparisonMode, FieldSource, Operation};
pub use transport::DebugSink;
pub use types::*;

// Feature-gated framework support
#[cfg(feature = "axum")]
pub mod axum;

/// Current version of the payssion library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
