use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::auth::AuthorizationContext;
use crate::config::ObservabilityConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if config.json_logs {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .with(filter)
            .try_init()?;
    }

    tracing::debug!("Procurement telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one workflow transition
pub fn create_transition_span(
    operation: &str,
    entity_id: Option<&str>,
    ctx: &AuthorizationContext,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "transition",
        operation = operation,
        entity.id = entity_id,
        principal.id = %ctx.principal_id,
        principal.role = %ctx.role,
        correlation.id = correlation_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }

    #[test]
    fn test_transition_span_builds_without_subscriber() {
        let ctx = AuthorizationContext::new("u1", Role::Manager, "acme");
        let span = create_transition_span("award", Some("m-1"), &ctx, "c-1");
        let _guard = span.enter();
    }
}
