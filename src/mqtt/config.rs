use rumqttc::MqttOptions;

use crate::config::BridgeConfig;

/// Capacity of the request queue between `AsyncClient` and `EventLoop`
pub const REQUEST_CAPACITY: usize = 100;

pub fn mqtt_options(config: &BridgeConfig) -> MqttOptions {
    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.broker_host.clone(),
        config.broker_port,
    );
    options
        .set_keep_alive(config.keep_alive())
        .set_clean_session(true);
    options
}
