use portal_service::config::PortalConfig;
use portal_service::startup::Application;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = PortalConfig::from_env()?;
    portal_core::observability::logging::init_tracing(&config.service_name, &config.log_level);

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
