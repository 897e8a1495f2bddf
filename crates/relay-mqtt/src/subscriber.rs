use std::sync::Arc;
use std::time::Duration;

use relay_domain::{RelayError, RelayResult, RelayService};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Span};

/// Transport session settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    /// Broker endpoint: `mqtt://host:port`, `tcp://host:port`, `host:port`
    /// or bare `host` (port defaults to 1883).
    pub broker_url: String,
    pub client_id: String,
    /// Empty username means an anonymous session.
    pub username: String,
    pub password: String,
    /// Topic filters to subscribe to: the root wildcard plus any specific
    /// sub-topics.
    pub topics: Vec<String>,
    pub max_retry_attempts: u32,
    pub retry_delay: Duration,
}

/// Run the MQTT transport session.
///
/// Connects to the broker, subscribes to the configured topic filters, and
/// delivers each published message to the relay service. A connection fault
/// tears the session down and retries with a fixed delay, up to the
/// configured attempt count; exhausting the attempts ends the session with
/// an error so the supervisor can wind the process down.
#[instrument(
    name = "mqtt_subscriber",
    skip_all,
    fields(
        broker_url = %settings.broker_url,
        client_id = %settings.client_id,
    )
)]
pub async fn run_mqtt_subscriber(
    settings: MqttSettings,
    relay: Arc<RelayService>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(
        broker_url = %settings.broker_url,
        client_id = %settings.client_id,
        "starting MQTT subscriber"
    );

    let mut retry_count = 0;

    loop {
        if shutdown.is_cancelled() {
            debug!("MQTT subscriber cancelled before connection");
            break;
        }

        match run_mqtt_connection(&settings, &relay, &shutdown).await {
            Ok(()) => {
                debug!("MQTT subscriber stopped cleanly");
                break;
            }
            Err(err) => {
                error!(error = %err, "MQTT connection error");

                retry_count += 1;
                if retry_count >= settings.max_retry_attempts {
                    error!(
                        max_retries = settings.max_retry_attempts,
                        "max retry attempts reached, stopping MQTT subscriber"
                    );
                    anyhow::bail!("MQTT subscriber gave up after {retry_count} attempts");
                }

                warn!(
                    attempt = retry_count,
                    max_attempts = settings.max_retry_attempts,
                    "retrying MQTT connection"
                );

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(settings.retry_delay) => {}
                }
            }
        }
    }

    info!("MQTT subscriber stopped");
    Ok(())
}

/// Run a single MQTT connection session.
#[instrument(name = "mqtt_connection", skip_all)]
async fn run_mqtt_connection(
    settings: &MqttSettings,
    relay: &RelayService,
    shutdown: &CancellationToken,
) -> RelayResult<()> {
    let (host, port) = parse_broker_url(&settings.broker_url)?;

    let mut mqtt_options = MqttOptions::new(&settings.client_id, host, port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);
    if !settings.username.is_empty() {
        mqtt_options.set_credentials(&settings.username, &settings.password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 100);

    for topic in &settings.topics {
        if let Err(err) = client.subscribe(topic, QoS::AtMostOnce).await {
            let err = RelayError::Subscription {
                topic: topic.clone(),
                reason: err.to_string(),
            };
            // The session keeps running for the remaining topics.
            warn!(error = %err, "subscribe request failed");
        } else {
            info!(topic = %topic, "subscribed to MQTT topic");
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("shutdown signal received");
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        // Each delivered message gets its own root span, not
                        // nested under the connection span.
                        let span = info_span!(
                            parent: Span::none(),
                            "mqtt_message",
                            topic = %publish.topic,
                            payload_size = publish.payload.len(),
                        );
                        span.in_scope(|| {
                            debug!("message received");
                            relay.handle_message(&publish.topic, &publish.payload);
                        });
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Ok(Event::Incoming(Packet::SubAck(suback))) => {
                        if suback
                            .return_codes
                            .iter()
                            .any(|code| matches!(code, SubscribeReasonCode::Failure))
                        {
                            warn!("broker rejected one or more subscriptions");
                        } else {
                            debug!("subscription acknowledged");
                        }
                    }
                    Ok(_) => {
                        // Pings, outgoing packets and the rest are uninteresting.
                    }
                    Err(err) => {
                        return Err(RelayError::ConnectionFault(err.to_string()));
                    }
                }
            }
        }
    }
}

/// Parse a broker URL of the form `mqtt://host:port`, `tcp://host:port` or
/// `host[:port]`.
fn parse_broker_url(url: &str) -> RelayResult<(&str, u16)> {
    let url = url.trim_start_matches("mqtt://");
    let url = url.trim_start_matches("tcp://");

    let parts: Vec<&str> = url.split(':').collect();
    match parts.len() {
        1 => Ok((parts[0], 1883)),
        2 => {
            let port = parts[1].parse::<u16>().map_err(|_| {
                RelayError::ConnectionFault(format!("invalid port in broker URL: {}", parts[1]))
            })?;
            Ok((parts[0], port))
        }
        _ => Err(RelayError::ConnectionFault(format!(
            "invalid broker URL format: {url}"
        ))),
    }
}
