use deployer_api::{config::ApiConfig, startup::Application};
use deployer_config::{Environment, load_config};
use deployer_telemetry::tracing::init_tracing;
use std::sync::Arc;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = load_config::<ApiConfig>()?;

    let _log_flusher = init_tracing(
        env!("CARGO_BIN_NAME"),
        config.kubernetes.cluster_name.clone(),
    )?;

    // Sentry has to be initialized before the async runtime starts.
    let _sentry_guard = init_sentry(&config)?;

    actix_web::rt::System::new().block_on(async_main(config))?;

    Ok(())
}

async fn async_main(config: ApiConfig) -> anyhow::Result<()> {
    log_application_config(&config);

    let application = Application::build(config).await?;
    info!(port = application.port(), "deployer api started");
    application.run_until_stopped().await?;

    Ok(())
}

fn init_sentry(config: &ApiConfig) -> anyhow::Result<Option<sentry::ClientInitGuard>> {
    let Some(sentry_config) = &config.sentry else {
        info!("sentry not configured for api, skipping initialization");
        return Ok(None);
    };

    info!("initializing sentry with supplied dsn");

    let environment = Environment::load()?;
    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(sentry_config.dsn.parse()?),
        environment: Some(environment.to_string().into()),
        traces_sample_rate: 1.0,
        max_request_body_size: sentry::MaxRequestBodySize::Always,
        integrations: vec![Arc::new(
            sentry::integrations::panic::PanicIntegration::new(),
        )],
        ..Default::default()
    });

    sentry::configure_scope(|scope| {
        scope.set_tag("service", "deployer-api");
        if let Some(cluster_name) = &config.kubernetes.cluster_name {
            scope.set_tag("cluster", cluster_name);
        }
    });

    Ok(Some(guard))
}

fn log_application_config(config: &ApiConfig) {
    info!(
        host = config.application.host.as_str(),
        port = config.application.port,
        cluster = config.kubernetes.cluster_name.as_deref(),
        sentry_enabled = config.sentry.is_some(),
        "application options",
    );
}
