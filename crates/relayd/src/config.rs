use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use relay_domain::MappingRule;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // MQTT configuration
    /// Broker endpoint, e.g. `mqtt://broker.local:1883`
    #[serde(default = "default_mqtt_broker_url")]
    pub mqtt_broker_url: String,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    /// Empty username means an anonymous session
    #[serde(default)]
    pub mqtt_username: String,

    #[serde(default)]
    pub mqtt_password: String,

    /// Topic filters to subscribe to (root wildcard plus sub-topics)
    #[serde(default = "default_mqtt_topics")]
    pub mqtt_topics: Vec<String>,

    #[serde(default = "default_mqtt_max_retry_attempts")]
    pub mqtt_max_retry_attempts: u32,

    #[serde(default = "default_mqtt_retry_delay_secs")]
    pub mqtt_retry_delay_secs: u64,

    // Upload endpoint configuration
    #[serde(default = "default_thingspeak_update_url")]
    pub thingspeak_update_url: String,

    /// Channel id, used for log attribution
    #[serde(default)]
    pub thingspeak_channel_id: u64,

    /// Channel write API key
    #[serde(default)]
    pub thingspeak_api_key: String,

    /// Quiescence interval between uploads; the endpoint's rate limit
    #[serde(default = "default_upload_interval_secs")]
    pub upload_interval_secs: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Field-mapping table; overridable via the `relay.toml` file source
    #[serde(default = "relay_domain::mapping::default_rules")]
    pub mapping: Vec<MappingRule>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_mqtt_client_id() -> String {
    "telemetry-relay".to_string()
}

fn default_mqtt_topics() -> Vec<String> {
    vec!["tele/#".to_string()]
}

fn default_mqtt_max_retry_attempts() -> u32 {
    5
}

fn default_mqtt_retry_delay_secs() -> u64 {
    10
}

fn default_thingspeak_update_url() -> String {
    "https://api.thingspeak.com/update".to_string()
}

fn default_upload_interval_secs() -> u64 {
    15
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("relay").required(false))
            .add_source(
                Environment::with_prefix("RELAY")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("mqtt_topics"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn upload_interval(&self) -> Duration {
        Duration::from_secs(self.upload_interval_secs)
    }

    pub fn mqtt_retry_delay(&self) -> Duration {
        Duration::from_secs(self.mqtt_retry_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
