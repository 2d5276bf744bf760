pub mod announcer;
pub mod discovery;
pub mod publisher;
pub mod retry;
pub mod telemetry;
pub mod topics;

pub use announcer::{ConnectivityAnnouncer, OFFLINE_PAYLOAD, ONLINE_PAYLOAD};
pub use discovery::{Capability, DiscoveryCatalog, DiscoveryDocument, DiscoveryError};
pub use publisher::{LogPublisher, PublishError, Publisher, QoS};
pub use retry::RetryBudget;
pub use telemetry::Telemetry;
pub use topics::AnnouncementTopics;
