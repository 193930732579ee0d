//! Publish side of the telemetry pipeline.
//!
//! Delivery is fire-and-forget: [`Publisher`] logs failed publishes and
//! carries on, so a broken transport never stalls generation or
//! persistence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::errors::TransportError;
use crate::models::{AggregateMetrics, CoordinatesUpdate, PlayerId, TelemetrySample};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        (**self).publish(topic, payload).await
    }
}

/// Topic layout for one deployment, rooted at a configurable prefix.
#[derive(Debug, Clone)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn sensors(&self, player_id: PlayerId) -> String {
        format!("{}/players/{player_id}/sensors", self.prefix)
    }

    pub fn coordinates(&self, player_id: PlayerId) -> String {
        format!("{}/players/{player_id}/sensors/coordinates", self.prefix)
    }

    pub fn impact_alerts(&self, player_id: PlayerId) -> String {
        format!("{}/players/{player_id}/alerts/impact", self.prefix)
    }

    pub fn metrics(&self, player_id: PlayerId) -> String {
        format!("{}/players/{player_id}/realtime/metrics", self.prefix)
    }
}

/// POSTs each payload to `<base_url>/<topic>` on an HTTP bridge.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fails unless the bridge answers at all within the client timeout.
    ///
    /// Any HTTP status counts as reachable; the bridge may not route its
    /// base URL.
    pub async fn check(&self) -> Result<(), TransportError> {
        self.client
            .head(&self.base_url)
            .send()
            .await
            .map_err(|source| TransportError::Unreachable {
                url: self.base_url.clone(),
                source,
            })?;
        Ok(())
    }

    fn url_for(&self, topic: &str) -> String {
        format!("{}/{}", self.base_url, topic.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.url_for(topic))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Rejected {
                topic: topic.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// A message seen by [`ChannelTransport`] subscribers.
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
}

/// In-process fan-out over a tokio broadcast channel.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: broadcast::Sender<Message>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let message = Message {
            topic: topic.to_string(),
            payload,
        };
        self.tx
            .send(message)
            .map(|_| ())
            .map_err(|_| TransportError::NoSubscribers(topic.to_string()))
    }
}

/// Encodes domain records and publishes them on their topics, best-effort.
pub struct Publisher<T> {
    transport: T,
    topics: Topics,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T, topics: Topics) -> Self {
        Self { transport, topics }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Publishes `value` as JSON. Returns false if the publish failed.
    pub async fn publish_json<V: Serialize + Sync + ?Sized>(
        &self,
        topic: &str,
        value: &V,
    ) -> bool {
        let payload = match serde_json::to_vec(value) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                tracing::warn!("Failed to encode payload for {topic}: {e}");
                return false;
            }
        };

        match self.transport.publish(topic, payload).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Publish to {topic} failed: {e}");
                false
            }
        }
    }

    pub async fn publish_sample(&self, sample: &TelemetrySample) -> bool {
        let topic = self.topics.sensors(sample.player_id);
        self.publish_json(&topic, sample).await
    }

    pub async fn publish_coordinates(&self, sample: &TelemetrySample) -> bool {
        let topic = self.topics.coordinates(sample.player_id);
        self.publish_json(&topic, &CoordinatesUpdate::from(sample)).await
    }

    pub async fn publish_impact_alert(&self, sample: &TelemetrySample) -> bool {
        let topic = self.topics.impact_alerts(sample.player_id);
        self.publish_json(&topic, sample).await
    }

    /// Publishes one metrics message per player, in the map's key order.
    /// Returns the number of failed publishes.
    pub async fn publish_metrics<'a, I>(&self, metrics: I) -> usize
    where
        I: IntoIterator<Item = (&'a PlayerId, &'a AggregateMetrics)>,
    {
        let mut failures = 0;
        for (player_id, data) in metrics {
            let topic = self.topics.metrics(*player_id);
            if self.publish_json(&topic, data).await {
                tracing::debug!("Published metrics for player {player_id}");
            } else {
                failures += 1;
            }
        }
        failures
    }
}
