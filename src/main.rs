use clap::Parser;
use dam2stix::core::engine::RunSummary;
use dam2stix::utils::error::ErrorSeverity;
use dam2stix::utils::{logger, validation::Validate};
use dam2stix::{BatchEngine, CliConfig, DamError, DamPipeline, LocalStorage, TomlConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting dam2stix");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let result = match &config.config {
        Some(path) => {
            let toml_config = match TomlConfig::from_file(path) {
                Ok(toml_config) => toml_config,
                Err(e) => {
                    tracing::error!("❌ Could not load configuration file: {}", e);
                    eprintln!("❌ {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = toml_config.validate() {
                tracing::error!("❌ Configuration validation failed: {}", e);
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }
            run(toml_config).await
        }
        None => {
            if let Err(e) = config.validate() {
                tracing::error!("❌ Configuration validation failed: {}", e);
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }
            run(config).await
        }
    };

    match result {
        Ok(summary) => {
            if summary.failed > 0 {
                tracing::warn!(
                    "⚠️ Completed with {}/{} failed combinations",
                    summary.failed,
                    summary.combinations
                );
                println!(
                    "⚠️ Completed with {}/{} failed combinations",
                    summary.failed, summary.combinations
                );
                println!("📁 Output saved to: {}", summary.output_path);
                std::process::exit(2);
            }
            tracing::info!("✅ Processed {} combinations", summary.combinations);
            println!("✅ Processed {} combinations", summary.combinations);
            println!("📁 Output saved to: {}", summary.output_path);
        }
        Err(e) => {
            tracing::error!("❌ Batch run failed: {} (Severity: {:?})", e, e.severity());
            eprintln!("❌ {}", e);

            let exit_code = match e.severity() {
                ErrorSeverity::Combination => 2,
                ErrorSeverity::Fatal => 1,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run<C>(config: C) -> Result<RunSummary, DamError>
where
    C: dam2stix::core::ConfigProvider,
{
    let storage = LocalStorage::new(String::new());
    let pipeline = DamPipeline::new(storage, config);
    let engine = BatchEngine::new(pipeline);
    engine.run().await
}
