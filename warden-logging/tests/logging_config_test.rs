//! Logging initialization tests

use warden_logging::*;

#[test]
fn test_filter_from_config() {
    let config = LoggingConfig {
        level: LogLevel::Warn,
        filter: Some("warden_rbac=trace".to_string()),
        ..Default::default()
    };

    let filter = build_env_filter(&config).to_string();
    assert!(filter.contains("warn"));
    assert!(filter.contains("warden_rbac=trace"));
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig {
        filter: Some("warden_rbac=notalevel".to_string()),
        ..Default::default()
    };

    assert!(init_logging_from_config(&config).is_err());
}

#[test]
fn test_repeated_initialization_is_harmless() {
    let config = LoggingConfig {
        format: LogFormat::Json,
        include_location: true,
        ..Default::default()
    };

    assert!(init_logging_from_config(&config).is_ok());
    assert!(init_logging_from_config(&LoggingConfig::default()).is_ok());
    assert!(init_simple_tracing("debug").is_ok());

    tracing::info!(target: AUDIT_TARGET, allowed = true, "audit line after init");
}
