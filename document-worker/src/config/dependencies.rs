//! Dependency initialization and wiring for the worker.

use std::env;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use document_broker::{
    BrokerTopology, EventPublisher, KafkaConfig, KafkaTransport, SummaryPublisher,
};
use document_manager::DocumentService;
use document_repository::{run_migrations, DatabaseConfig, PostgresDocumentRepository};
use document_search::{OpenSearchProvider, SearchConfig, SearchIndexProvider};
use document_storage::{create_storage, StorageConfig};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::errors::WorkerError;
use crate::extract::ExtractiveSummarizer;
use crate::handlers::{SummaryHandler, UploadHandler};
use crate::orchestrator::Orchestrator;

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka client and consumer group ID.
const DEFAULT_KAFKA_CLIENT_ID: &str = "document-worker";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// How start-up reacts to an unreachable backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry the connection at a fixed interval until it succeeds.
    Retry,
}

impl ConnectionMode {
    /// Parse connection mode from the `CONNECTION_MODE` environment variable.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive)
    /// Defaults to "retry" if not set or invalid.
    pub fn from_env() -> Self {
        Self::parse(&env::var("CONNECTION_MODE").unwrap_or_else(|_| "retry".to_string()))
    }

    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Run `attempt` until it succeeds, or once in fail-fast mode.
async fn connect_with_retry<T, E, F, Fut>(
    backend: &str,
    mode: ConnectionMode,
    retry_interval: Duration,
    mut attempt: F,
) -> Result<T, WorkerError>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => match mode {
                ConnectionMode::FailFast => {
                    return Err(WorkerError::config(format!(
                        "Failed to connect to {}: {}",
                        backend, e
                    )));
                }
                ConnectionMode::Retry => {
                    warn!(
                        backend,
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "Connection failed, retrying..."
                    );
                    sleep(retry_interval).await;
                }
            },
        }
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// Reads `WorkerConfig`, `BrokerTopology`, `KafkaConfig`, `StorageConfig`,
    /// `DatabaseConfig` and `SearchConfig` from their variables, plus:
    ///
    /// - `CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `CONNECTION_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(WorkerError)` - If initialization fails (connections only in fail-fast mode)
    pub async fn new() -> Result<Self, WorkerError> {
        let worker_config = WorkerConfig::from_env();
        let topology = BrokerTopology::from_env();
        let kafka_config = KafkaConfig::from_env(DEFAULT_KAFKA_BROKER, DEFAULT_KAFKA_CLIENT_ID);
        let storage_config = StorageConfig::from_env()?;
        let database_config = DatabaseConfig::from_env();
        let search_config = SearchConfig::from_env();
        let connection_mode = ConnectionMode::from_env();
        let retry_interval = Duration::from_secs(
            env::var("CONNECTION_RETRY_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS),
        );

        info!(
            kafka_broker = %kafka_config.brokers,
            opensearch_url = %search_config.url,
            index = %search_config.index_name,
            connection_mode = ?connection_mode,
            retry_interval_secs = retry_interval.as_secs(),
            upload_consumer = worker_config.run_upload_consumer,
            summary_consumer = worker_config.run_summary_consumer,
            "Initializing dependencies"
        );

        let pool = connect_with_retry("PostgreSQL", connection_mode, retry_interval, || {
            database_config.connect()
        })
        .await?;
        run_migrations(&pool).await?;
        let documents = Arc::new(PostgresDocumentRepository::new(pool));

        let storage = create_storage(&storage_config).await?;
        info!(backend = ?storage_config.backend, "Object storage ready");

        let search = Arc::new(OpenSearchProvider::new(&search_config)?);
        connect_with_retry("OpenSearch", connection_mode, retry_interval, || {
            search.ensure_index_exists()
        })
        .await?;
        info!("OpenSearch connection established");

        let transport = Arc::new(KafkaTransport::new(kafka_config)?);
        info!("Kafka transport created");

        let document_service = Arc::new(
            DocumentService::new(
                documents.clone(),
                storage.clone(),
                EventPublisher::new(transport.clone(), &topology),
            )
            .with_search_index(search.clone()),
        );

        let mut orchestrator = Orchestrator::new(transport.clone(), topology.clone(), search.clone())
            .with_progress_interval(worker_config.progress_interval);

        if worker_config.run_upload_consumer {
            let handler = UploadHandler::new(
                documents,
                storage,
                search.clone(),
                Arc::new(ExtractiveSummarizer::new(worker_config.summary_chars)),
                SummaryPublisher::new(transport.clone(), &topology),
            )
            .with_persist_text(worker_config.persist_text);
            orchestrator =
                orchestrator.with_consumer("upload", topology.upload_queue.clone(), Arc::new(handler));
        }

        if worker_config.run_summary_consumer {
            let handler = SummaryHandler::new(document_service, search);
            orchestrator = orchestrator.with_consumer(
                "summary",
                topology.summary_queue.clone(),
                Arc::new(handler),
            );
        }

        Ok(Self { orchestrator })
    }
}
