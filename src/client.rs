//! HTTP client for the Payssion gateway

use crate::config::ClientConfig;
use crate::notification::NotificationVerifier;
use crate::signature::{self, Operation};
use crate::transport::{DebugSink, DebugTransport};
use crate::types::{
    fields, CreatePaymentResult, Environment, PaymentFields, PaymentRequest, CREATE_PAYMENT_PATH,
};
use crate::{PayssionError, Result};
use reqwest::Client;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Client for creating payments.
///
/// Holds no per-request state; one instance can serve concurrent callers.
/// The configuration is an immutable snapshot that can be replaced as a
/// whole, and each request uses a single snapshot from start to finish.
#[derive(Debug)]
pub struct PayssionClient {
    transport: DebugTransport,
    config: RwLock<Arc<ClientConfig>>,
}

impl PayssionClient {
    /// Create a sandbox client with the given credentials
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(api_key, api_secret))
    }

    /// Create a client from a full configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .build()
            .map_err(|e| PayssionError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_http_client(config, client))
    }

    /// Create a client that reuses an existing `reqwest` client
    pub fn with_http_client(config: ClientConfig, client: Client) -> Self {
        Self {
            transport: DebugTransport::new(client),
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Arc<ClientConfig> {
        match self.config.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Replace the configuration snapshot
    pub fn replace_config(&self, config: ClientConfig) -> Result<()> {
        self.update_config(|_| config)
    }

    /// Derive a new snapshot from the current one and swap it in.
    ///
    /// The write lock is held from read to swap, so concurrent updates are
    /// applied one after the other and none is lost. `update` must not call
    /// back into this client's configuration methods.
    pub fn update_config<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(ClientConfig) -> ClientConfig,
    {
        let mut guard = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let next = update(ClientConfig::clone(&guard));
        next.validate()?;
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn environment(&self) -> Environment {
        self.config().environment
    }

    /// Switch between live and sandbox
    pub fn set_environment(&self, environment: Environment) -> Result<()> {
        self.update_config(|config| config.with_environment(environment))
    }

    pub fn set_live(&self, live: bool) -> Result<()> {
        self.set_environment(Environment::from_live(live))
    }

    /// Send request/response dumps to `sink`
    pub fn set_debug_sink(&self, sink: DebugSink) -> Result<()> {
        self.update_config(|config| config.with_debug_sink(sink))
    }

    /// Base URL requests currently go to
    pub fn api_host(&self) -> String {
        self.config().api_host().to_string()
    }

    /// Verifier for inbound notifications using this client's credentials
    pub fn notification_verifier(&self) -> NotificationVerifier {
        NotificationVerifier::from_credentials(self.config().credentials.clone())
    }

    /// Create a payment from an open field set.
    ///
    /// `params` is augmented in place with `api_key` and `api_sig`. The
    /// body is encoded from the same borrow right after signing, so the
    /// signed values cannot change before they are sent.
    pub async fn create(&self, params: &mut PaymentFields) -> Result<CreatePaymentResult> {
        if params.is_empty() {
            return Err(PayssionError::invalid_argument(
                "payment fields cannot be empty",
            ));
        }

        let config = self.config();
        let credentials = &config.credentials;

        params.set(fields::API_KEY, credentials.api_key.as_str());
        let api_sig = signature::sign(Operation::Create, &*params, &credentials.api_secret);
        params.set(fields::API_SIG, api_sig);
        let body = params.to_form_body();

        let url = config.endpoint_url(CREATE_PAYMENT_PATH);
        debug!(
            url = %url,
            order_id = params.get(fields::ORDER_ID).unwrap_or_default(),
            pm_id = params.get(fields::PM_ID).unwrap_or_default(),
            environment = %config.environment,
            "creating payment"
        );

        let raw = self.transport.post_form(&config, &url, body).await?;
        let result: CreatePaymentResult = serde_json::from_str(&raw)?;

        info!(
            result_code = result.result_code,
            transaction_id = result.transaction_id().unwrap_or_default(),
            "payment create returned"
        );
        Ok(result)
    }

    /// Create a payment from a typed request
    pub async fn create_payment(&self, request: PaymentRequest) -> Result<CreatePaymentResult> {
        let mut params = request.into_fields();
        self.create(&mut params).await
    }
}

impl Clone for PayssionClient {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: RwLock::new(self.config()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = PayssionClient::new("ak1", "sk1").unwrap();
        assert_eq!(client.environment(), Environment::Sandbox);
        assert_eq!(client.api_host(), "https://sandbox.payssion.com");
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let err = PayssionClient::new("", "sk1").unwrap_err();
        assert!(matches!(err, PayssionError::Config { .. }));
    }

    #[test]
    fn test_set_live_switches_host_only() {
        let client = PayssionClient::new("ak1", "sk1").unwrap();
        let before = client.config();

        client.set_live(true).unwrap();
        assert_eq!(client.environment(), Environment::Live);
        assert_eq!(client.api_host(), "https://www.payssion.com");

        let after = client.config();
        assert_eq!(after.credentials, before.credentials);
        assert_eq!(after.timeout, before.timeout);

        // the old snapshot is untouched
        assert_eq!(before.environment, Environment::Sandbox);

        client.set_environment(Environment::Sandbox).unwrap();
        assert_eq!(client.api_host(), "https://sandbox.payssion.com");
    }

    #[test]
    fn test_replace_config_validates() {
        let client = PayssionClient::new("ak1", "sk1").unwrap();
        assert!(client.replace_config(ClientConfig::new("ak1", "")).is_err());
        assert_eq!(client.config().credentials.api_secret, "sk1");
    }

    #[test]
    fn test_concurrent_setters_both_apply() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let client = PayssionClient::new("ak1", "sk1").unwrap();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            let slow = s.spawn(|| {
                client.update_config(move |config| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    config.with_debug_sink(DebugSink::stdout())
                })
            });

            entered_rx.recv().unwrap();
            let fast = s.spawn(|| client.set_live(true));

            // give the second setter time to contend for the lock
            thread::sleep(Duration::from_millis(50));
            release_tx.send(()).unwrap();

            slow.join().unwrap().unwrap();
            fast.join().unwrap().unwrap();
        });

        let config = client.config();
        assert_eq!(config.environment, Environment::Live);
        assert!(config.debug_sink.is_enabled());
    }

    #[test]
    fn test_clone_takes_independent_snapshot() {
        let client = PayssionClient::new("ak1", "sk1").unwrap();
        let cloned = client.clone();
        client.set_live(true).unwrap();
        assert_eq!(cloned.environment(), Environment::Sandbox);
    }

    #[tokio::test]
    async fn test_create_with_empty_fields_is_invalid_argument() {
        let client = PayssionClient::new("ak1", "sk1").unwrap();
        let mut fields = PaymentFields::new();

        let err = client.create(&mut fields).await.unwrap_err();
        assert!(matches!(err, PayssionError::InvalidArgument { .. }));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_notification_verifier_uses_client_credentials() {
        let client = PayssionClient::new("ak1", "sk1").unwrap();
        let verifier = client.notification_verifier();
        assert_eq!(verifier.api_key(), "ak1");
    }
}
