//! Message broker access.
//!
//! The consumer loop only needs two operations from the broker: wait for the
//! next message and mark a message as processed. `MessageSource` is that
//! seam; `KafkaSource` is the production implementation.

use crate::config::KafkaSettings;
use async_trait::async_trait;
use rdkafka::{
    ClientConfig, Message, Offset, TopicPartitionList,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaError,
};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::info;

/// How long startup waits for topic metadata before giving up.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("failed to create consumer: {0}")]
    Create(#[source] KafkaError),
    #[error("failed to subscribe to topic '{topic}': {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: KafkaError,
    },
    #[error("broker unreachable or topic '{topic}' unavailable: {source}")]
    Unreachable {
        topic: String,
        #[source]
        source: KafkaError,
    },
    #[error("failed to receive message: {0}")]
    Receive(#[source] KafkaError),
    #[error("failed to commit offset {offset} on {topic}[{partition}]: {source}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: KafkaError,
    },
}

/// A message detached from the broker client, owned by the loop for the
/// duration of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// `None` for tombstones.
    pub payload: Option<Vec<u8>>,
}

#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next message. Must be safe to drop mid-wait.
    async fn next_message(&mut self) -> Result<InboundMessage, BrokerError>;

    /// Marks `message` (and everything before it on its partition) as processed.
    async fn commit(&mut self, message: &InboundMessage) -> Result<(), BrokerError>;
}

/// Consumes a single Kafka topic with manual offset commits.
pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSource {
    /// Creates the consumer, subscribes, and verifies the brokers answer for
    /// the topic. Any failure here is fatal to the process.
    pub async fn connect(settings: &KafkaSettings) -> Result<Self, BrokerError> {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", &settings.brokers)
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", &settings.auto_offset_reset)
            .set("fetch.max.bytes", settings.fetch_max_bytes.to_string())
            .set(
                "max.partition.fetch.bytes",
                settings.fetch_max_bytes.to_string(),
            )
            .set("security.protocol", &settings.security_protocol);

        if settings.uses_sasl() {
            client.set("sasl.mechanism", &settings.sasl_mechanism);
            if let Some(username) = &settings.username {
                client.set("sasl.username", username);
            }
            if let Some(password) = &settings.password {
                client.set("sasl.password", password.expose_secret());
            }
        }
        if !settings.ssl_verify {
            client.set("enable.ssl.certificate.verification", "false");
        }

        let consumer: StreamConsumer = client.create().map_err(BrokerError::Create)?;
        consumer
            .subscribe(&[settings.topic.as_str()])
            .map_err(|source| BrokerError::Subscribe {
                topic: settings.topic.clone(),
                source,
            })?;

        // Metadata lookup blocks on the network; it is what surfaces bad
        // credentials or unreachable brokers before the loop starts.
        let metadata = tokio::task::block_in_place(|| {
            consumer.fetch_metadata(Some(settings.topic.as_str()), METADATA_TIMEOUT)
        })
        .map_err(|source| BrokerError::Unreachable {
            topic: settings.topic.clone(),
            source,
        })?;
        let partitions = metadata
            .topics()
            .iter()
            .find(|t| t.name() == settings.topic)
            .map(|t| t.partitions().len())
            .unwrap_or_default();

        info!(
            brokers = %settings.brokers,
            topic = %settings.topic,
            group = %settings.group_id,
            partitions,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: settings.topic.clone(),
        })
    }

    /// Leaves the consumer group so partitions are reassigned promptly.
    pub fn close(self) {
        self.consumer.unsubscribe();
        info!(topic = %self.topic, "Kafka consumer closed");
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn next_message(&mut self) -> Result<InboundMessage, BrokerError> {
        let message = self.consumer.recv().await.map_err(BrokerError::Receive)?;
        Ok(InboundMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec),
        })
    }

    async fn commit(&mut self, message: &InboundMessage) -> Result<(), BrokerError> {
        let commit_err = |source| BrokerError::Commit {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            source,
        };

        // The committed offset is the next one to read.
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(commit_err)?;

        tokio::task::block_in_place(|| self.consumer.commit(&tpl, CommitMode::Sync))
            .map_err(commit_err)
    }
}
