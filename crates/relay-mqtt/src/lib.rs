pub mod subscriber;

pub use subscriber::{run_mqtt_subscriber, MqttSettings};
