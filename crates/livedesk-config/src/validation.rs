// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::LivedeskConfig;

/// Validate a deserialized configuration, collecting every violation.
pub fn validate_config(config: &LivedeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let base_url = config.platform.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "platform.base_url `{base_url}` must start with http:// or https://"
        )));
    }

    if config.platform.org_id.trim().is_empty() {
        errors.push(ConfigError::validation("platform.org_id must not be empty"));
    }

    if config.platform.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "platform.request_timeout_secs must be at least 1",
        ));
    }

    let channel = &config.channel;
    if !(channel.rotation_ratio > 0.0 && channel.rotation_ratio < 1.0) {
        errors.push(ConfigError::validation(format!(
            "channel.rotation_ratio must be between 0 and 1 (exclusive), got {}",
            channel.rotation_ratio
        )));
    }
    if channel.subscription_lifetime_secs == 0 {
        errors.push(ConfigError::validation(
            "channel.subscription_lifetime_secs must be at least 1",
        ));
    }
    if channel.max_topics_per_channel == 0 {
        errors.push(ConfigError::validation(
            "channel.max_topics_per_channel must be at least 1",
        ));
    }
    if channel.max_channels == 0 {
        errors.push(ConfigError::validation("channel.max_channels must be at least 1"));
    }
    if channel.max_reopen_attempts == 0 {
        errors.push(ConfigError::validation(
            "channel.max_reopen_attempts must be at least 1",
        ));
    }

    let reconcile = &config.reconcile;
    if reconcile.ui_refresh_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "reconcile.ui_refresh_interval_secs must be at least 1",
        ));
    }
    if reconcile.stale_multiplier == 0 {
        errors.push(ConfigError::validation(
            "reconcile.stale_multiplier must be at least 1",
        ));
    }

    for (name, value) in [
        ("quality.min_queue_coverage", config.quality.min_queue_coverage),
        ("quality.min_total_ratio", config.quality.min_total_ratio),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::validation(format!(
                "{name} must be between 0 and 1, got {value}"
            )));
        }
    }

    for (i, id) in config.watch.user_ids.iter().enumerate() {
        if id.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "watch.user_ids[{i}] must not be empty"
            )));
        }
    }
    for (i, id) in config.watch.queue_ids.iter().enumerate() {
        if id.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "watch.queue_ids[{i}] must not be empty"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &LivedeskConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&LivedeskConfig::default()).is_ok());
    }

    #[test]
    fn rotation_ratio_must_be_a_fraction() {
        let mut config = LivedeskConfig::default();
        config.channel.rotation_ratio = 1.0;
        let errors = messages(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("channel.rotation_ratio"));
    }

    #[test]
    fn base_url_requires_scheme() {
        let mut config = LivedeskConfig::default();
        config.platform.base_url = "api.example.com".into();
        assert!(messages(&config)[0].contains("platform.base_url"));
    }

    #[test]
    fn collects_all_errors_instead_of_failing_fast() {
        let mut config = LivedeskConfig::default();
        config.channel.max_channels = 0;
        config.channel.max_topics_per_channel = 0;
        config.quality.min_total_ratio = 1.5;
        config.watch.user_ids = vec!["u1".into(), " ".into()];
        let errors = messages(&config);
        assert_eq!(errors.len(), 4, "got: {errors:?}");
        assert!(errors.iter().any(|e| e.contains("watch.user_ids[1]")));
    }

    #[test]
    fn parsed_toml_with_zero_channels_fails_validation() {
        let toml_str = r#"
            [channel]
            max_channels = 0
        "#;
        let config: LivedeskConfig = toml::from_str(toml_str).unwrap();
        assert!(messages(&config)[0].contains("channel.max_channels"));
    }

    #[test]
    fn unknown_section_key_is_rejected_by_parser() {
        let toml_str = r#"
            [watch]
            queue_idz = ["q1"]
        "#;
        assert!(toml::from_str::<LivedeskConfig>(toml_str).is_err());
    }
}
