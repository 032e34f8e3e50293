use clap::Parser;
use tidysdmx::utils::error::{ErrorSeverity, SdmxError};
use tidysdmx::utils::{logger, validation::Validate};
use tidysdmx::{CliConfig, LocalStorage, StandardizeEngine, StandardizePipeline};

fn exit_code(e: &SdmxError) -> i32 {
    match e.severity() {
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report(e: &SdmxError) {
    tracing::error!(
        "Standardization failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
}

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting tidysdmx CLI");
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        report(&e);
        std::process::exit(exit_code(&e));
    }

    let registry = match config.registry_client() {
        Ok(registry) => registry,
        Err(e) => {
            report(&e);
            std::process::exit(exit_code(&e));
        }
    };
    tracing::debug!("Registry: {}", registry.base_url());

    let pipeline = StandardizePipeline::new(LocalStorage::default(), config, registry);
    let engine = StandardizeEngine::new(pipeline);

    match engine.run().await {
        Ok(output_path) => {
            println!("✅ Standardization completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            report(&e);
            std::process::exit(exit_code(&e));
        }
    }
}
