use argh::FromArgs;
use sparkplug_relay::RelayConfig;

#[derive(FromArgs)]
/// Relay that forwards spark plug photos to a vision model for diagnosis.
struct RelayArgs {
    /// the host to run the server on (overrides HOST)
    #[argh(option, short = 'h')]
    host: Option<String>,

    /// the port to run the server on (overrides PORT)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// fail at startup unless a port is set (same as RELAY_REQUIRE_PORT=1)
    #[argh(switch)]
    require_port: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: RelayArgs = argh::from_env();

    let config = RelayConfig::from_env_with_overrides(|key| match key {
        "HOST" => args.host.clone(),
        "PORT" => args.port.map(|port| port.to_string()),
        "RELAY_REQUIRE_PORT" if args.require_port => Some("1".to_string()),
        _ => None,
    })
    .inspect_err(|e| log::error!("Invalid configuration: {e}"))?;

    log::info!("PORT: {}", config.port);
    log::info!("OPENAI_API_KEY set? {}", config.api_key.is_some());

    sparkplug_relay::serve(config).await?;

    Ok(())
}
