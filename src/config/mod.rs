pub mod schema_config;

pub use schema_config::SchemaConfig;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};

/// Reads standard input when given as `--input`.
pub const STDIN_INPUT: &str = "-";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "oatmeal")]
#[command(about = "Serialize and deserialize JSON object graphs against a TOML schema")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage")]
    pub monitor: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Convert a live graph into its wire form
    Serialize(TraversalArgs),
    /// Restore a graph from its wire form
    Deserialize(TraversalArgs),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct TraversalArgs {
    #[arg(long, help = "Path to the TOML schema")]
    pub schema: String,

    #[arg(long, help = "Model to traverse the input against")]
    pub model: String,

    #[arg(long, default_value = STDIN_INPUT, help = "JSON input file, or - for stdin")]
    pub input: String,

    #[arg(long, help = "Override the schema's nested-object depth limit")]
    pub depth: Option<usize>,

    #[arg(long, help = "Pretty-print the output")]
    pub pretty: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn traversal(&self) -> &TraversalArgs {
        match &self.command {
            Command::Serialize(args) | Command::Deserialize(args) => args,
        }
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        let args = self.traversal();
        validation::validate_path("schema", &args.schema)?;
        validation::validate_non_empty_string("model", &args.model)?;
        if args.input != STDIN_INPUT {
            validation::validate_path("input", &args.input)?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serialize_command() {
        let config = CliConfig::try_parse_from([
            "oatmeal",
            "serialize",
            "--schema",
            "schema.toml",
            "--model",
            "User",
            "--depth",
            "2",
            "--verbose",
        ])
        .unwrap();

        assert!(matches!(config.command, Command::Serialize(_)));
        assert!(config.verbose);
        assert_eq!(config.traversal().input, STDIN_INPUT);
        assert_eq!(config.traversal().depth, Some(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_model_is_invalid() {
        let config = CliConfig::try_parse_from([
            "oatmeal",
            "deserialize",
            "--schema",
            "schema.toml",
            "--model",
            " ",
            "--input",
            "data.json",
        ])
        .unwrap();

        assert!(config.validate().is_err());
    }
}
