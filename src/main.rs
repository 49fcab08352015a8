use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_log::LogTracer::init()?;

    let stdout_subscriber = tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn")),
        )
        .finish();
    tracing::subscriber::set_global_default(stdout_subscriber)?;

    pollster::block_on(vitrine::run())
}
