// Home-automation discovery documents
//
// Every capability is a row in a static table: which component it registers as, which object id
// it uses and which fields it carries. The catalog renders the enabled rows once per identity and
// the announcer only ever republishes the cached bytes.

use serde_json::{json, Map, Value};

use crate::system::DeviceIdentity;

pub const DISCOVERY_PREFIX: &str = "homeassistant";
pub const DISCOVERY_PAYLOAD_CAPACITY: usize = 1200;

pub type DiscoveryPayload = heapless::Vec<u8, DISCOVERY_PAYLOAD_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Connectivity,
    Motion,
    MaxDistance,
    Weather,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Connectivity,
        Capability::Motion,
        Capability::MaxDistance,
        Capability::Weather,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Capability::Connectivity => "connectivity",
            Capability::Motion => "motion",
            Capability::MaxDistance => "max_distance",
            Capability::Weather => "weather",
        }
    }

    fn entities(&self) -> &'static [Entity] {
        match self {
            Capability::Connectivity => CONNECTIVITY,
            Capability::Motion => MOTION,
            Capability::MaxDistance => MAX_DISTANCE,
            Capability::Weather => WEATHER,
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Rendered document does not fit the payload buffer
    Oversize { topic: String, len: usize },
    Serialize(String),
}

impl core::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DiscoveryError::Oversize { topic, len } => write!(
                f,
                "discovery document for {} is {} bytes (limit {})",
                topic, len, DISCOVERY_PAYLOAD_CAPACITY
            ),
            DiscoveryError::Serialize(detail) => write!(f, "discovery serialization failed: {}", detail),
        }
    }
}

impl std::error::Error for DiscoveryError {}

#[derive(Debug, Clone, Copy)]
enum FieldValue {
    Text(&'static str),
    Flag(bool),
    /// `{root}/{room}`, what `~` expands to on the hub side
    RoomsRoot,
    /// `{brand} {room}` with an optional trailing word
    Name {
        brand: &'static str,
        suffix: Option<&'static str>,
    },
    /// Hardware address plus suffix
    UniqueId(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Field {
    key: &'static str,
    value: FieldValue,
}

const fn text(key: &'static str, value: &'static str) -> Field {
    Field {
        key,
        value: FieldValue::Text(value),
    }
}

#[derive(Debug)]
struct Entity {
    component: &'static str,
    /// Node id prefix, the weather sensors have always been registered under a different spelling
    node: &'static str,
    object_id: &'static str,
    fields: &'static [Field],
}

const ROOT: Field = Field {
    key: "~",
    value: FieldValue::RoomsRoot,
};

const CONNECTIVITY: &[Entity] = &[Entity {
    component: "binary_sensor",
    node: "espresense",
    object_id: "connectivity",
    fields: &[
        ROOT,
        Field {
            key: "name",
            value: FieldValue::Name {
                brand: "ESPresense",
                suffix: None,
            },
        },
        Field {
            key: "unique_id",
            value: FieldValue::UniqueId("connectivity"),
        },
        text("json_attr_t", "~/telemetry"),
        text("stat_t", "~/status"),
        Field {
            key: "frc_upd",
            value: FieldValue::Flag(true),
        },
        text("dev_cla", "connectivity"),
        text("pl_on", "online"),
        text("pl_off", "offline"),
    ],
}];

const MOTION: &[Entity] = &[Entity {
    component: "binary_sensor",
    node: "espresense",
    object_id: "motion",
    fields: &[
        ROOT,
        Field {
            key: "name",
            value: FieldValue::Name {
                brand: "ESPresense",
                suffix: Some("Motion"),
            },
        },
        Field {
            key: "unique_id",
            value: FieldValue::UniqueId("motion"),
        },
        text("availability_topic", "~/status"),
        text("stat_t", "~/motion"),
        text("dev_cla", "motion"),
    ],
}];

const MAX_DISTANCE: &[Entity] = &[Entity {
    component: "number",
    node: "espresense",
    object_id: "max_distance",
    fields: &[
        ROOT,
        Field {
            key: "name",
            value: FieldValue::Name {
                brand: "ESPresense",
                suffix: Some("Max Distance"),
            },
        },
        Field {
            key: "unique_id",
            value: FieldValue::UniqueId("max_distance"),
        },
        text("availability_topic", "~/status"),
        text("stat_t", "~/max_distance"),
        text("cmd_t", "~/max_distance/set"),
    ],
}];

const WEATHER: &[Entity] = &[
    Entity {
        component: "sensor",
        node: "espresence",
        object_id: "temperature",
        fields: &[
            ROOT,
            text("unit_of_meas", "°C"),
            text("dev_cla", "temperature"),
            text("stat_t", "~/weather"),
            Field {
                key: "name",
                value: FieldValue::Name {
                    brand: "ESPresence",
                    suffix: Some("Temperature"),
                },
            },
            Field {
                key: "unique_id",
                value: FieldValue::UniqueId("temp"),
            },
            text("avty_t", "~/status"),
            text("value_template", "{{ value_json.temperature }}"),
        ],
    },
    Entity {
        component: "sensor",
        node: "espresence",
        object_id: "humidity",
        fields: &[
            ROOT,
            text("unit_of_meas", "%"),
            text("dev_cla", "humidity"),
            text("stat_t", "~/weather"),
            Field {
                key: "name",
                value: FieldValue::Name {
                    brand: "ESPresence",
                    suffix: Some("Humidity"),
                },
            },
            Field {
                key: "unique_id",
                value: FieldValue::UniqueId("hum"),
            },
            text("avty_t", "~/status"),
            text("value_template", "{{ value_json.humidity }}"),
        ],
    },
    Entity {
        component: "sensor",
        node: "espresence",
        object_id: "pressure",
        fields: &[
            ROOT,
            text("unit_of_meas", "Pa"),
            text("dev_cla", "pressure"),
            text("stat_t", "~/weather"),
            Field {
                key: "name",
                value: FieldValue::Name {
                    brand: "ESPresence",
                    suffix: Some("Pressure"),
                },
            },
            Field {
                key: "unique_id",
                value: FieldValue::UniqueId("pres"),
            },
            text("avty_t", "~/status"),
            text("value_template", "{{ value_json.pressure }}"),
        ],
    },
];

/// One rendered discovery message, ready to publish retained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryDocument {
    pub capability: Capability,
    pub topic: String,
    pub payload: DiscoveryPayload,
}

impl DiscoveryDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }
}

/// All documents for the enabled capabilities, rendered once
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCatalog {
    documents: Vec<DiscoveryDocument>,
    rejected: Vec<Capability>,
}

impl DiscoveryCatalog {
    /// Render every enabled capability. A capability with a document over the payload cap is
    /// left out as a whole and remembered in [`rejected`](Self::rejected); the rest still render.
    pub fn build(identity: &DeviceIdentity, rooms_root: &str, enabled: &[Capability]) -> Result<Self, DiscoveryError> {
        let device = device_block(identity);
        let mut catalog = Self::default();

        for capability in Capability::ALL.iter().filter(|c| enabled.contains(c)) {
            match render_capability(*capability, identity, rooms_root, &device) {
                Ok(documents) => catalog.documents.extend(documents),
                Err(e @ DiscoveryError::Oversize { .. }) => {
                    log::error!("Discovery for {} dropped: {}", capability, e);
                    catalog.rejected.push(*capability);
                }
                Err(e) => return Err(e),
            }
        }

        log::debug!(
            "Discovery catalog ready: {} documents, {} capabilities dropped",
            catalog.documents.len(),
            catalog.rejected.len()
        );
        Ok(catalog)
    }

    /// Capabilities that were enabled but could not be rendered
    pub fn rejected(&self) -> &[Capability] {
        &self.rejected
    }

    /// Documents of one capability, empty when it is not enabled
    pub fn documents_for(&self, capability: Capability) -> impl Iterator<Item = &DiscoveryDocument> {
        self.documents.iter().filter(move |d| d.capability == capability)
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.documents_for(capability).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn render_capability(
    capability: Capability,
    identity: &DeviceIdentity,
    rooms_root: &str,
    device: &Value,
) -> Result<Vec<DiscoveryDocument>, DiscoveryError> {
    capability
        .entities()
        .iter()
        .map(|entity| {
            let topic = format!(
                "{}/{}/{}_{}/{}/config",
                DISCOVERY_PREFIX,
                entity.component,
                entity.node,
                identity.room(),
                entity.object_id
            );
            let payload = render(entity, identity, rooms_root, device, &topic)?;
            Ok(DiscoveryDocument {
                capability,
                topic,
                payload,
            })
        })
        .collect()
}

fn device_block(identity: &DeviceIdentity) -> Value {
    json!({
        "ids": [identity.mac()],
        "cns": [["MAC", identity.mac()]],
        "name": identity.device_name(),
        "sa": identity.room(),
        "mdl": identity.chip_model(),
    })
}

fn render(
    entity: &Entity,
    identity: &DeviceIdentity,
    rooms_root: &str,
    device: &Value,
    topic: &str,
) -> Result<DiscoveryPayload, DiscoveryError> {
    let mut doc = Map::new();
    for field in entity.fields {
        let value = match field.value {
            FieldValue::Text(s) => Value::from(s),
            FieldValue::Flag(b) => Value::from(b),
            FieldValue::RoomsRoot => Value::from(rooms_root),
            FieldValue::Name { brand, suffix: None } => Value::from(format!("{} {}", brand, identity.room())),
            FieldValue::Name {
                brand,
                suffix: Some(suffix),
            } => Value::from(format!("{} {} {}", brand, identity.room(), suffix)),
            FieldValue::UniqueId(suffix) => Value::from(identity.unique_id(suffix)),
        };
        doc.insert(field.key.to_string(), value);
    }
    doc.insert("dev".to_string(), device.clone());

    let bytes = serde_json::to_vec(&Value::Object(doc)).map_err(|e| DiscoveryError::Serialize(e.to_string()))?;
    DiscoveryPayload::from_slice(&bytes).map_err(|_| DiscoveryError::Oversize {
        topic: topic.to_string(),
        len: bytes.len(),
    })
}
