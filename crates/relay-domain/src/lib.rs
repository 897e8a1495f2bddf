pub mod decode;
pub mod error;
pub mod mapping;
pub mod queue;
pub mod record;
pub mod relay_service;
pub mod sink;
pub mod uplink_worker;

pub use decode::decode;
pub use error::{DecodeError, RelayError, RelayResult};
pub use mapping::{map_fields, FieldMapping, MappingRule};
pub use queue::{record_queue, RecordQueue, RecordQueueReceiver};
pub use record::{OutputRecord, QueuedRecord, SensorMessage};
pub use relay_service::RelayService;
pub use sink::RecordSink;
pub use uplink_worker::UplinkWorker;
