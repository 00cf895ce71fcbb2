use clap::Parser;
use oatmeal::config::{Command, STDIN_INPUT};
use oatmeal::utils::error::{ErrorSeverity, OatmealError};
use oatmeal::utils::monitor::SystemMonitor;
use oatmeal::utils::{logger, validation::Validate};
use oatmeal::{CliConfig, Oatmeal, SchemaConfig, Value};
use std::io::Read;

fn run(config: &CliConfig, monitor: &SystemMonitor) -> Result<serde_json::Value, OatmealError> {
    let args = config.traversal();

    let schema = SchemaConfig::from_file(&args.schema)?;
    schema.validate()?;
    tracing::info!("Loaded schema with {} model(s)", schema.models.len());

    let engine = Oatmeal::new(schema.build_registry()?, schema.build_catalog()?);
    let mut options = schema.traversal_options();
    if args.depth.is_some() {
        options.depth = args.depth;
    }

    let content = if args.input == STDIN_INPUT {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)?
    };
    let input = Value::from_json(serde_json::from_str(&content)?);

    let output = match &config.command {
        Command::Serialize(_) => monitor.measure("serialize", || {
            engine.serialize(&input, args.model.as_str(), &options)
        })?,
        Command::Deserialize(_) => monitor.measure("deserialize", || {
            engine.deserialize(&input, args.model.as_str(), &options)
        })?,
    };

    Ok(output.to_json())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting oatmeal CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor = SystemMonitor::new(config.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(&config, &monitor) {
        Ok(output) => {
            let rendered = if config.traversal().pretty {
                serde_json::to_string_pretty(&output)?
            } else {
                serde_json::to_string(&output)?
            };
            println!("{}", rendered);
            monitor.log_final_stats();
        }
        Err(e) => {
            tracing::error!(
                "❌ Traversal failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
