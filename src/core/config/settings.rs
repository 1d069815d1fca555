use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment,
    parse_store_backend, parse_u16, parse_u32, parse_u64, parse_usize,
};
use super::types::{
    ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExamSettings, RuntimeSettings,
    ServerHost, ServerPort, ServerSettings, Settings, StoreBackend, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("EXAMHALL_HOST", "0.0.0.0");
        let port = env_or_default("EXAMHALL_PORT", "8000");

        let environment =
            parse_environment(env_optional("EXAMHALL_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("EXAMHALL_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Examhall API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let store = parse_store_backend(env_optional("EXAMHALL_STORE"))?;
        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "examhall");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "examhall");
        let database_url = env_optional("DATABASE_URL");
        let max_connections =
            parse_u32("DATABASE_MAX_CONNECTIONS", env_or_default("DATABASE_MAX_CONNECTIONS", "30"))?;

        let pass_threshold_percent =
            parse_u32("PASS_THRESHOLD_PERCENT", env_or_default("PASS_THRESHOLD_PERCENT", "40"))?;
        let min_options_per_question = parse_usize(
            "MIN_OPTIONS_PER_QUESTION",
            env_or_default("MIN_OPTIONS_PER_QUESTION", "2"),
        )?;
        let max_options_per_question = parse_usize(
            "MAX_OPTIONS_PER_QUESTION",
            env_or_default("MAX_OPTIONS_PER_QUESTION", "10"),
        )?;
        let expiry_sweep_enabled =
            env_optional("EXPIRY_SWEEP_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);
        let expiry_sweep_interval_seconds = parse_u64(
            "EXPIRY_SWEEP_INTERVAL_SECONDS",
            env_or_default("EXPIRY_SWEEP_INTERVAL_SECONDS", "60"),
        )?;

        let log_level = env_or_default("EXAMHALL_LOG_LEVEL", "info");
        let json = env_optional("EXAMHALL_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                store,
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            exam: ExamSettings {
                pass_threshold_percent,
                min_options_per_question,
                max_options_per_question,
                expiry_sweep_enabled,
                expiry_sweep_interval_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.exam.min_options_per_question < 2 {
            return Err(ConfigError::InvalidValue {
                field: "MIN_OPTIONS_PER_QUESTION",
                value: self.exam.min_options_per_question.to_string(),
            });
        }

        if self.exam.max_options_per_question < self.exam.min_options_per_question {
            return Err(ConfigError::InvalidValue {
                field: "MAX_OPTIONS_PER_QUESTION",
                value: self.exam.max_options_per_question.to_string(),
            });
        }

        if self.exam.expiry_sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXPIRY_SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if !(1..=100).contains(&self.exam.pass_threshold_percent) {
            return Err(ConfigError::InvalidValue {
                field: "PASS_THRESHOLD_PERCENT",
                value: self.exam.pass_threshold_percent.to_string(),
            });
        }

        match self.database.store {
            StoreBackend::Memory => Err(ConfigError::InvalidValue {
                field: "EXAMHALL_STORE",
                value: StoreBackend::Memory.as_str().to_string(),
            }),
            StoreBackend::Postgres => {
                if self.database.database_url.is_none()
                    && self.database.postgres_password.is_empty()
                {
                    return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn clear_env() {
        for key in [
            "EXAMHALL_ENV",
            "ENVIRONMENT",
            "EXAMHALL_STRICT_CONFIG",
            "EXAMHALL_STORE",
            "DATABASE_URL",
            "POSTGRES_PASSWORD",
            "PASS_THRESHOLD_PERCENT",
            "MIN_OPTIONS_PER_QUESTION",
            "MAX_OPTIONS_PER_QUESTION",
            "EXPIRY_SWEEP_INTERVAL_SECONDS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[tokio::test]
    async fn defaults_load_in_development() {
        let _guard = test_support::env_lock().await;
        clear_env();

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.exam().pass_threshold_percent, 40);
        assert_eq!(settings.exam().min_options_per_question, 2);
        assert_eq!(settings.database().store, StoreBackend::Postgres);
        assert!(!settings.exam().expiry_sweep_enabled);
        assert_eq!(settings.api().api_v1_str, "/api/v1");
    }

    #[tokio::test]
    async fn strict_mode_rejects_memory_store() {
        let _guard = test_support::env_lock().await;
        clear_env();
        std::env::set_var("EXAMHALL_STRICT_CONFIG", "1");
        std::env::set_var("EXAMHALL_STORE", "memory");

        let err = Settings::load().expect_err("memory store must be rejected");
        assert!(matches!(err, ConfigError::InvalidValue { field: "EXAMHALL_STORE", .. }));
        clear_env();
    }

    #[tokio::test]
    async fn strict_mode_requires_postgres_password() {
        let _guard = test_support::env_lock().await;
        clear_env();
        std::env::set_var("EXAMHALL_ENV", "production");

        let err = Settings::load().expect_err("password required");
        assert!(matches!(err, ConfigError::MissingSecret("POSTGRES_PASSWORD")));

        std::env::set_var("DATABASE_URL", "postgresql://u:p@localhost/examhall");
        assert!(Settings::load().is_ok());
        clear_env();
    }

    #[tokio::test]
    async fn option_bounds_are_checked() {
        let _guard = test_support::env_lock().await;
        clear_env();
        std::env::set_var("MIN_OPTIONS_PER_QUESTION", "4");
        std::env::set_var("MAX_OPTIONS_PER_QUESTION", "3");

        let err = Settings::load().expect_err("max below min");
        assert!(matches!(err, ConfigError::InvalidValue { field: "MAX_OPTIONS_PER_QUESTION", .. }));
        clear_env();
    }
}
