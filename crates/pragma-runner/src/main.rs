mod server;

use anyhow::Context;
use clap::Parser;
use pragma_agno::{Deployed, DeployedSpec};
use pragma_config::Settings;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pragma-runner")]
#[command(about = "Serve a compiled Agno agent or team", version)]
struct Cli {
    /// "agent" or "team"
    #[arg(long, env = "AGNO_SPEC_TYPE")]
    spec_type: String,

    /// Compiled spec JSON
    #[arg(long, env = "AGNO_SPEC_JSON", hide_env_values = true)]
    spec_json: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the settings file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load(spec_type: &str, spec_json: &str) -> anyhow::Result<Deployed> {
    let spec = DeployedSpec::decode(spec_type, spec_json)
        .with_context(|| format!("Invalid {spec_type} spec in AGNO_SPEC_JSON"))?;
    let deployed = Deployed::from_spec(&spec)
        .with_context(|| format!("Cannot rebuild {spec_type} from its spec"))?;
    Ok(deployed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("Failed to load settings")?;
    init_tracing(&settings);

    let deployed = load(&cli.spec_type, &cli.spec_json)?;
    tracing::info!("Loaded {} {}", cli.spec_type, deployed.name());

    server::serve(deployed, cli.port).await
}
