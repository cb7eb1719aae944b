//! Kafka-backed broker clients (feature `kafka`).
//!
//! The consumer joins `group_id` with auto-commit enabled: an offset counts as
//! consumed as soon as it is read, matching the in-process broker's
//! one-read-one-message contract.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::Message;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer as _, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{Consumer, Producer};
use crate::config::BrokerSettings;
use crate::utils::{Error, Result};

const SEND_QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

fn client_config(settings: &BrokerSettings) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", settings.addresses.join(","));
    config
}

fn classify(op: &'static str, err: KafkaError) -> Error {
    Error::unavailable(op, err.to_string()).with_source(err)
}

pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(settings: &BrokerSettings) -> Result<Self> {
        info!(brokers = ?settings.addresses, "Initializing Kafka producer");
        let producer: FutureProducer = client_config(settings)
            .set("message.timeout.ms", "10000")
            .create()
            .map_err(|e| classify("connect producer", e))?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl Producer for KafkaProducer {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        let record = FutureRecord::<(), [u8]>::to(channel).payload(payload.as_slice());
        self.producer
            .send(record, SEND_QUEUE_TIMEOUT)
            .await
            .map_err(|(e, _)| classify("publish", e))?;
        Ok(())
    }
}

pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaConsumer {
    /// Join the consumer group and subscribe to `settings.channel_name`.
    pub fn new(settings: &BrokerSettings) -> Result<Self> {
        info!(
            topic = %settings.channel_name,
            group = %settings.group_id,
            "Initializing Kafka consumer"
        );
        let consumer: StreamConsumer = client_config(settings)
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("allow.auto.create.topics", "true")
            .create()
            .map_err(|e| classify("connect consumer", e))?;

        consumer
            .subscribe(&[settings.channel_name.as_str()])
            .map_err(|e| classify("subscribe", e))?;

        Ok(Self {
            consumer,
            topic: settings.channel_name.clone(),
        })
    }
}

#[async_trait]
impl Consumer for KafkaConsumer {
    async fn consume(&self, channel: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        if channel != self.topic {
            return Err(Error::invalid_input(
                "consume",
                format!("consumer is subscribed to '{}', not '{channel}'", self.topic),
            ));
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::cancelled("consume")),
            message = self.consumer.recv() => match message {
                Ok(message) => Ok(message.payload().map(<[u8]>::to_vec).unwrap_or_default()),
                Err(e) => {
                    error!(error = %e, "Kafka consumer error");
                    Err(classify("consume", e))
                }
            },
        }
    }
}
