mod config;
mod logging;

use std::sync::Arc;

use config::ServiceConfig;
use relay_domain::{record_queue, FieldMapping, RelayService, UplinkWorker};
use relay_mqtt::{run_mqtt_subscriber, MqttSettings};
use relay_runner::Runner;
use relay_thingspeak::{ThingSpeakSettings, ThingSpeakSink};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = logging::init_logging(&config.log_level) {
        eprintln!("Failed to initialize logging: {err}");
        std::process::exit(1);
    }

    info!(
        broker_url = %config.mqtt_broker_url,
        topics = ?config.mqtt_topics,
        channel_id = config.thingspeak_channel_id,
        upload_interval_secs = config.upload_interval_secs,
        "starting telemetry relay"
    );
    if config.thingspeak_api_key.is_empty() {
        warn!("no channel write API key configured; uploads will be rejected");
    }

    let sink = match ThingSpeakSink::new(ThingSpeakSettings {
        update_url: config.thingspeak_update_url.clone(),
        channel_id: config.thingspeak_channel_id,
        api_key: config.thingspeak_api_key.clone(),
        http_timeout: config.http_timeout(),
    }) {
        Ok(sink) => sink.into_sink(),
        Err(err) => {
            error!(error = %err, "failed to set up upload sink");
            std::process::exit(1);
        }
    };

    let (queue, queue_rx) = record_queue();
    let relay = Arc::new(RelayService::new(
        FieldMapping::new(config.mapping.clone()),
        queue,
    ));
    let worker = UplinkWorker::new(queue_rx, sink, config.upload_interval());

    let mqtt_settings = MqttSettings {
        broker_url: config.mqtt_broker_url.clone(),
        client_id: config.mqtt_client_id.clone(),
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topics: config.mqtt_topics.clone(),
        max_retry_attempts: config.mqtt_max_retry_attempts,
        retry_delay: config.mqtt_retry_delay(),
    };

    let result = Runner::new()
        .with_process("mqtt-subscriber", move |token| {
            run_mqtt_subscriber(mqtt_settings, relay, token)
        })
        .with_process("uplink-worker", move |token| worker.run(token))
        .run()
        .await;

    match result {
        Ok(()) => info!("telemetry relay stopped"),
        Err(err) => {
            error!(error = format!("{err:#}"), "telemetry relay stopped with error");
            std::process::exit(1);
        }
    }
}
