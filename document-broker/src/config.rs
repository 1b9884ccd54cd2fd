//! Broker topology and Kafka client configuration.

use std::env;
use std::time::Duration;

use rdkafka::config::ClientConfig;

const DEFAULT_EXCHANGE: &str = "docs.exchange";
const DEFAULT_UPLOAD_QUEUE: &str = "docs.uploaded.q";
const DEFAULT_ROUTING_KEY: &str = "document.uploaded";
const DEFAULT_DEAD_LETTER_EXCHANGE: &str = "docs.dlx";
const DEFAULT_DEAD_LETTER_QUEUE: &str = "docs.uploaded.dlq";
const DEFAULT_SUMMARY_QUEUE: &str = "summary-results";

/// Number of deliveries after which a requeued message is dead-lettered.
pub const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 3;

const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 5000;

/// Suffix appended to the upload routing key to route dead letters.
const DEAD_LETTER_SUFFIX: &str = ".dlq";

/// Names of the exchanges, queues and routing keys of the pipeline.
///
/// Upload events flow `exchange --routing_key--> upload_queue`. Messages the
/// upload consumer gives up on flow `dead_letter_exchange --<routing_key>.dlq-->
/// dead_letter_queue`. Summary messages go through the default exchange
/// straight to `summary_queue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerTopology {
    pub exchange: String,
    pub upload_queue: String,
    pub routing_key: String,
    pub dead_letter_exchange: String,
    pub dead_letter_queue: String,
    pub summary_queue: String,
    pub max_delivery_attempts: u32,
}

impl Default for BrokerTopology {
    fn default() -> Self {
        Self {
            exchange: DEFAULT_EXCHANGE.to_string(),
            upload_queue: DEFAULT_UPLOAD_QUEUE.to_string(),
            routing_key: DEFAULT_ROUTING_KEY.to_string(),
            dead_letter_exchange: DEFAULT_DEAD_LETTER_EXCHANGE.to_string(),
            dead_letter_queue: DEFAULT_DEAD_LETTER_QUEUE.to_string(),
            summary_queue: DEFAULT_SUMMARY_QUEUE.to_string(),
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
        }
    }
}

impl BrokerTopology {
    /// Create a BrokerTopology from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BROKER_EXCHANGE` (default: docs.exchange)
    /// - `BROKER_UPLOAD_QUEUE` (default: docs.uploaded.q)
    /// - `BROKER_ROUTING_KEY` (default: document.uploaded)
    /// - `BROKER_DEAD_LETTER_EXCHANGE` (default: docs.dlx)
    /// - `BROKER_DEAD_LETTER_QUEUE` (default: docs.uploaded.dlq)
    /// - `BROKER_SUMMARY_QUEUE` (default: summary-results)
    /// - `BROKER_MAX_DELIVERY_ATTEMPTS` (default: 3)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            exchange: env::var("BROKER_EXCHANGE").unwrap_or(defaults.exchange),
            upload_queue: env::var("BROKER_UPLOAD_QUEUE").unwrap_or(defaults.upload_queue),
            routing_key: env::var("BROKER_ROUTING_KEY").unwrap_or(defaults.routing_key),
            dead_letter_exchange: env::var("BROKER_DEAD_LETTER_EXCHANGE")
                .unwrap_or(defaults.dead_letter_exchange),
            dead_letter_queue: env::var("BROKER_DEAD_LETTER_QUEUE")
                .unwrap_or(defaults.dead_letter_queue),
            summary_queue: env::var("BROKER_SUMMARY_QUEUE").unwrap_or(defaults.summary_queue),
            max_delivery_attempts: env::var("BROKER_MAX_DELIVERY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_delivery_attempts),
        }
    }

    /// Routing key under which dead letters of the upload queue are published.
    pub fn dead_letter_routing_key(&self) -> String {
        format!("{}{}", self.routing_key, DEAD_LETTER_SUFFIX)
    }
}

/// Configuration for the Kafka transport.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Kafka broker addresses (e.g., "localhost:9092")
    pub brokers: String,
    /// Consumer group prefix; each subscribed queue gets `<group_id>.<queue>`
    pub group_id: String,
    /// Client ID for produced messages
    pub client_id: String,
    /// SASL username (enables SASL/SSL if set)
    pub username: Option<String>,
    /// SASL password (required if username is set)
    pub password: Option<String>,
    /// Custom CA certificate in PEM format
    pub ssl_ca_pem: Option<String>,
    /// Time to wait for the broker to acknowledge a produced message
    pub publish_timeout: Duration,
}

impl KafkaConfig {
    /// Create a KafkaConfig with the given brokers and client id.
    pub fn new(brokers: impl Into<String>, client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            brokers: brokers.into(),
            group_id: client_id.clone(),
            client_id,
            username: None,
            password: None,
            ssl_ca_pem: None,
            publish_timeout: Duration::from_millis(DEFAULT_PUBLISH_TIMEOUT_MS),
        }
    }

    /// Create a KafkaConfig from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `KAFKA_BROKER` - Broker address (uses provided default if not set)
    /// - `KAFKA_GROUP_ID` - Consumer group prefix (defaults to the client id)
    /// - `KAFKA_USERNAME` - SASL username (optional)
    /// - `KAFKA_PASSWORD` - SASL password (optional)
    /// - `KAFKA_SSL_CA_PEM` - Custom CA cert in PEM format (optional)
    /// - `KAFKA_PUBLISH_TIMEOUT_MS` - Produce acknowledgement timeout (default: 5000)
    pub fn from_env(default_broker: &str, client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            brokers: env::var("KAFKA_BROKER").unwrap_or_else(|_| default_broker.to_string()),
            group_id: env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| client_id.clone()),
            client_id,
            username: env::var("KAFKA_USERNAME").ok(),
            password: env::var("KAFKA_PASSWORD").ok(),
            ssl_ca_pem: env::var("KAFKA_SSL_CA_PEM").ok(),
            publish_timeout: Duration::from_millis(
                env::var("KAFKA_PUBLISH_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_PUBLISH_TIMEOUT_MS),
            ),
        }
    }

    /// Set SASL credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Base client configuration shared by producers, consumers and the admin client.
    pub(crate) fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id);

        // SASL/SSL for managed Kafka, plaintext otherwise
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);

            if let Some(ca_pem) = &self.ssl_ca_pem {
                client_config.set("ssl.ca.pem", ca_pem);
            }
        }

        client_config
    }
}
