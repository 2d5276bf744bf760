use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration};

use crate::config::Config;
use crate::network::{AnnouncementTopics, PublishError, Publisher, QoS, OFFLINE_PAYLOAD};

const MQTT_THREAD_STACK: usize = 6 * 1024;

#[derive(Debug)]
pub enum MqttEvent {
    Connected,
    Disconnected,
    Message { topic: String, payload: Vec<u8> },
}

/// `Publisher` over the ESP-IDF client. Messages are queued in the client outbox.
pub struct EspPublisher {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
}

impl EspPublisher {
    pub fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.client.subscribe(topic, QoS::AtMostOnce)?;
        log::info!("Subscribed to {}", topic);
        Ok(())
    }
}

impl Publisher for EspPublisher {
    fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), PublishError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(PublishError::NotConnected);
        }
        self.client
            .enqueue(topic, qos, retain, payload)
            .map(|_| ())
            .map_err(|e| PublishError::Rejected(format!("{:?}", e)))
    }
}

/// Start the client with an `offline` last will on the status topic.
/// Connection state changes and inbound messages arrive on the returned channel.
pub fn connect(config: &Config, client_id: &str, topics: &AnnouncementTopics) -> Result<(EspPublisher, Receiver<MqttEvent>)> {
    let url = format!("mqtt://{}:{}", config.mqtt_host, config.mqtt_port);

    let conf = MqttClientConfiguration {
        client_id: Some(client_id),
        username: if config.mqtt_user.is_empty() {
            None
        } else {
            Some(config.mqtt_user.as_str())
        },
        password: if config.mqtt_password.is_empty() {
            None
        } else {
            Some(config.mqtt_password.as_str())
        },
        lwt: Some(LwtConfiguration {
            topic: &topics.status,
            payload: OFFLINE_PAYLOAD,
            qos: QoS::AtMostOnce,
            retain: true,
        }),
        ..Default::default()
    };

    let (client, mut conn) = EspMqttClient::new(&url, &conf)?;
    log::info!("MQTT client started for {}", url);

    let connected = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let flag = connected.clone();
    thread::Builder::new()
        .name("mqtt-poll".to_string())
        .stack_size(MQTT_THREAD_STACK)
        .spawn(move || {
            while let Ok(event) = conn.next() {
                let forwarded = match event.payload() {
                    EventPayload::Connected(_) => {
                        flag.store(true, Ordering::Release);
                        Some(MqttEvent::Connected)
                    }
                    EventPayload::Disconnected => {
                        flag.store(false, Ordering::Release);
                        Some(MqttEvent::Disconnected)
                    }
                    EventPayload::Received { topic, data, .. } => topic.map(|topic| MqttEvent::Message {
                        topic: topic.to_string(),
                        payload: data.to_vec(),
                    }),
                    EventPayload::Error(e) => {
                        log::warn!("MQTT error: {:?}", e);
                        None
                    }
                    _ => None,
                };

                if let Some(event) = forwarded {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
            log::warn!("MQTT connection loop ended");
        })?;

    Ok((EspPublisher { client, connected }, rx))
}
