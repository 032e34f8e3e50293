use anyhow::Context;
use clap::Parser;
use tidysdmx::core::ConfigProvider;
use tidysdmx::utils::logger;
use tidysdmx::{LocalStorage, StandardizeEngine, StandardizePipeline, TomlConfig};

#[derive(Parser)]
#[command(name = "tidysdmx-toml")]
#[command(about = "Standardize data into SDMX with a TOML configuration")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "tidysdmx.toml")]
    config: String,

    /// Registry environment, overrides registry.default_env
    #[arg(long)]
    env: Option<String>,

    /// Override the artefact from the config
    #[arg(long)]
    artefact: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, conflicts_with = "verbose")]
    json_logs: bool,

    /// Show what would be processed without reading or writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Loading configuration from: {}", args.config);
    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    if let Some(artefact) = &args.artefact {
        tracing::info!("Artefact overridden to: {}", artefact);
        config.standardize.artefact = Some(artefact.clone());
    }

    config
        .validate_with_env(args.env.as_deref())
        .context("configuration validation failed")?;
    let registry = config
        .registry_client(args.env.as_deref())
        .context("cannot build registry client")?;

    display_config_summary(&config, registry.base_url());

    if args.dry_run {
        println!("🔍 Dry run: no files were read or written.");
        return Ok(());
    }

    let pipeline = StandardizePipeline::new(LocalStorage::default(), config, registry);
    let engine = StandardizeEngine::new(pipeline);

    match engine.run().await {
        Ok(output_path) => {
            println!("✅ Standardization completed successfully!");
            println!("📁 Output saved to: {}", output_path);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            Err(e.into())
        }
    }
}

fn display_config_summary(config: &TomlConfig, registry_url: &str) {
    println!("📋 Configuration Summary:");
    println!("  Registry: {}", registry_url);
    println!(
        "  Artefact: {} ({})",
        config.artefact().unwrap_or("from template INFO sheet"),
        config.artefact_kind()
    );
    println!("  Template: {}", config.template_path());
    println!("  Input: {}", config.input_path());
    println!("  Validation: {}", config.validation_mode());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    if let Some(zip) = config.compression_filename() {
        println!("  Compression: {} (ZIP)", zip);
    }
    println!();
}
