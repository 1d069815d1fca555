use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

fn default_directives(level: &str) -> String {
    format!("{level},sqlx=warn,tower_http={level}")
}

pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&settings.telemetry().log_level)));

    let builder = fmt().with_env_filter(filter).with_target(false);

    let installed = if settings.telemetry().json {
        builder.json().with_span_events(fmt::format::FmtSpan::CLOSE).try_init()
    } else {
        builder.with_span_events(fmt::format::FmtSpan::CLOSE).try_init()
    };
    installed.map_err(|err| anyhow::anyhow!(err.to_string()))?;

    tracing::debug!(
        environment = settings.runtime().environment.as_str(),
        json = settings.telemetry().json,
        "Tracing initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::default_directives;

    #[test]
    fn directives_quiet_sqlx_statements() {
        assert_eq!(default_directives("debug"), "debug,sqlx=warn,tower_http=debug");
    }
}
