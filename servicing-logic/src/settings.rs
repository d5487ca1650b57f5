use serde::Deserialize;
use servicing_api::domain::AchOriginator;
use servicing_api::{ServicingError, ServicingResult};
use validator::Validate;

/// Per-queue prefetch: validators run wide, posters narrow, the cycle
/// strictly serial.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct PrefetchSettings {
    #[validate(range(min = 1, max = 1000))]
    pub payment_validation: u16,
    #[validate(range(min = 1, max = 100))]
    pub payment_processing: u16,
    #[validate(range(min = 1, max = 100))]
    pub reconcile: u16,
    #[validate(range(min = 1, max = 1000))]
    pub audit_log: u16,
    #[validate(range(min = 1, max = 10))]
    pub servicing_cycle: u16,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            payment_validation: 20,
            payment_processing: 5,
            reconcile: 5,
            audit_log: 100,
            servicing_cycle: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct BrokerSettings {
    #[validate(nested)]
    pub prefetch: PrefetchSettings,
    #[validate(range(min = 1, max = 100))]
    pub delivery_limit: u32,
    #[validate(range(min = 1, max = 60))]
    pub publish_confirm_timeout_secs: u64,
    #[validate(range(min = 1, max = 300))]
    pub reconnect_backoff_ceiling_secs: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            prefetch: PrefetchSettings::default(),
            delivery_limit: 6,
            publish_confirm_timeout_secs: 5,
            reconnect_backoff_ceiling_secs: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
#[serde(default)]
pub struct ReconSettings {
    #[validate(range(min = 1, max = 300))]
    pub match_threshold: i32,
    #[validate(range(min = 0, max = 30))]
    pub date_window_days: u32,
}

impl Default for ReconSettings {
    fn default() -> Self {
        Self {
            match_threshold: 85,
            date_window_days: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
#[serde(default)]
pub struct OutboxSettings {
    #[validate(range(min = 1, max = 100))]
    pub batch_size: i64,
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: i32,
    #[validate(range(min = 1, max = 3600))]
    pub max_backoff_secs: u64,
    #[validate(range(min = 1, max = 60))]
    pub poll_interval_secs: u64,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_attempts: 5,
            max_backoff_secs: 60,
            poll_interval_secs: 1,
        }
    }
}

fn default_originator() -> AchOriginator {
    AchOriginator {
        odfi_routing: "021000021".to_string(),
        immediate_destination: "021000021".to_string(),
        immediate_origin: "1234567890".to_string(),
        destination_name: "IMMEDIATE DEST".to_string(),
        origin_name: "LOAN SERVICER".to_string(),
        company_name: "LOAN SERVICER".to_string(),
        company_id: "1234567890".to_string(),
    }
}

/// Root settings, loadable from `servicing.toml` plus `SERVICING__*`
/// environment overrides.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(nested)]
    pub broker: BrokerSettings,
    #[validate(nested)]
    pub recon: ReconSettings,
    #[validate(nested)]
    pub outbox: OutboxSettings,
    #[validate(nested)]
    pub ach: AchOriginator,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings::default(),
            recon: ReconSettings::default(),
            outbox: OutboxSettings::default(),
            ach: default_originator(),
        }
    }
}

impl Settings {
    /// Layered load: defaults ← optional config file ← environment.
    pub fn load(config_path: Option<&str>) -> ServicingResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let loaded = builder
            .add_source(config::Environment::with_prefix("SERVICING").separator("__"))
            .build()
            .map_err(|e| ServicingError::Configuration(e.to_string()))?;

        let settings: Settings = loaded
            .try_deserialize()
            .map_err(|e| ServicingError::Configuration(e.to_string()))?;
        settings
            .validate()
            .map_err(|e| ServicingError::Configuration(e.to_string()))?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.recon.match_threshold, 85);
        assert_eq!(settings.recon.date_window_days, 3);
        assert_eq!(settings.broker.delivery_limit, 6);
        assert_eq!(settings.broker.prefetch.payment_validation, 20);
        assert_eq!(settings.broker.prefetch.payment_processing, 5);
        assert_eq!(settings.broker.prefetch.servicing_cycle, 1);
        assert_eq!(settings.outbox.batch_size, 100);
        assert_eq!(settings.outbox.max_attempts, 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.broker.publish_confirm_timeout_secs, 5);
    }
}
