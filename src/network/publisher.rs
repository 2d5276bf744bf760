// MQTT publish seam - the announcer talks to this, not to a concrete client

pub use embedded_svc::mqtt::client::QoS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// No broker session right now
    NotConnected,
    /// Client refused the message (outbox full, topic too long, ...)
    Rejected(String),
}

impl core::fmt::Display for PublishError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PublishError::NotConnected => f.write_str("not connected"),
            PublishError::Rejected(detail) => write!(f, "publish rejected: {}", detail),
        }
    }
}

impl std::error::Error for PublishError {}

pub trait Publisher {
    fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), PublishError> {
        (**self).publish(topic, qos, retain, payload)
    }
}

/// Log-only publisher for host runs: exercises topic and document building without a broker
#[derive(Debug, Default)]
pub struct LogPublisher {
    pub published: usize,
}

impl Publisher for LogPublisher {
    fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), PublishError> {
        let qos_str = match qos {
            QoS::AtMostOnce => "QoS0",
            QoS::AtLeastOnce => "QoS1",
            QoS::ExactlyOnce => "QoS2",
        };
        log::info!(
            "mqtt(LOG): topic='{}' len={} {} retain={} payload={}",
            topic,
            payload.len(),
            qos_str,
            retain,
            String::from_utf8_lossy(payload)
        );
        self.published += 1;
        Ok(())
    }
}
