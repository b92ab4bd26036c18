#[cfg(test)]
mod tests {
    use serial_test::serial;

    use crate::env::AppConfig;

    const CONFIG_VARS: [&str; 5] = [
        "DATABASE_URL",
        "DATABASE_MAX_CONNECTIONS",
        "OTEL_EXPORTER_OTLP_ENDPOINT",
        "HONEYCOMB_API_KEY",
        "DEPLOYMENT_ENVIRONMENT",
    ];

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        temp_env::with_vars_unset(CONFIG_VARS, || {
            let config = AppConfig::from_env().expect("Defaults should load");

            assert_eq!(config.database_url, "sqlite://school_roster.db");
            assert_eq!(config.max_connections, 5);
            assert_eq!(config.otlp_endpoint, None);
            assert_eq!(config.honeycomb_api_key, None);
            assert_eq!(config.deployment_environment, "development");
        });
    }

    #[test]
    #[serial]
    fn test_reads_environment() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("sqlite://roster-test.db")),
                ("DATABASE_MAX_CONNECTIONS", Some("12")),
                ("OTEL_EXPORTER_OTLP_ENDPOINT", Some("http://localhost:4317")),
                ("HONEYCOMB_API_KEY", Some("abc123")),
                ("DEPLOYMENT_ENVIRONMENT", Some("staging")),
            ],
            || {
                let config = AppConfig::from_env().expect("Config should load");

                assert_eq!(config.database_url, "sqlite://roster-test.db");
                assert_eq!(config.max_connections, 12);
                assert_eq!(
                    config.otlp_endpoint.as_deref(),
                    Some("http://localhost:4317")
                );
                assert_eq!(config.honeycomb_api_key.as_deref(), Some("abc123"));
                assert_eq!(config.deployment_environment, "staging");
            },
        );
    }

    #[test]
    #[serial]
    fn test_blank_values_count_as_unset() {
        temp_env::with_vars(
            [
                ("OTEL_EXPORTER_OTLP_ENDPOINT", Some("   ")),
                ("DATABASE_URL", Some("")),
            ],
            || {
                let config = AppConfig::from_env().expect("Config should load");

                assert_eq!(config.otlp_endpoint, None);
                assert_eq!(config.database_url, "sqlite://school_roster.db");
            },
        );
    }

    #[test]
    #[serial]
    fn test_rejects_invalid_pool_size() {
        temp_env::with_var("DATABASE_MAX_CONNECTIONS", Some("many"), || {
            let err = AppConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
        });

        temp_env::with_var("DATABASE_MAX_CONNECTIONS", Some("0"), || {
            assert!(AppConfig::from_env().is_err());
        });
    }
}
