//! CLI module for Atlas
//!
//! Provides command-line interface parsing and handling for the atlas-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Atlas - business automation orchestrator
///
/// Routes business-automation requests to specialized agents and runs them
/// behind circuit breakers, retries and fallbacks.
#[derive(Parser, Debug)]
#[command(
    name = "atlas-server",
    author = "Atlas Automation <build@atlas-automation.dev>",
    version,
    about = "Atlas - business automation orchestrator",
    long_about = "Routes business-automation requests to specialized agents (website, marketing,\n\
                  analytics, customer communication) and runs them behind circuit breakers,\n\
                  retries and fallbacks.\n\n\
                  Run without arguments to start the HTTP server.",
    after_help = "EXAMPLES:\n    \
                  atlas-server                                   # Start the server\n    \
                  atlas-server process \"Website for my bakery\"    # Run one request locally\n    \
                  atlas-server plan \"Diwali campaign\"              # Show the agent plan\n    \
                  atlas-server --config prod.toml config --validate"
)]
pub struct Cli {
    /// Path to the configuration file (defaults to atlas.toml if present)
    #[arg(short, long, env = "ATLAS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Override the host from the configuration
        #[arg(long)]
        host: Option<String>,

        /// Override the port from the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Process a single request locally and print the aggregated response
    Process {
        /// Free-form description of what the business needs
        intent: String,

        #[command(flatten)]
        metadata: MetadataArgs,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show the agent plan for a request without running any agent
    Plan {
        /// Free-form description of what the business needs
        intent: String,

        /// Explicit request type (website, marketing_campaign, complete_setup, ...)
        #[arg(short = 't', long = "type")]
        request_type: Option<String>,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file and report warnings
        #[arg(long)]
        validate: bool,
    },

    /// Manage agents
    #[command(subcommand)]
    Agent(AgentCommands),
}

/// Business metadata flags shared by request-taking commands
#[derive(clap::Args, Debug, Default, Clone)]
pub struct MetadataArgs {
    /// Explicit request type (website, marketing_campaign, complete_setup, ...)
    #[arg(short = 't', long = "type")]
    pub request_type: Option<String>,

    /// Locale such as en, en-US or hi-IN
    #[arg(short, long)]
    pub locale: Option<String>,

    /// Kind of business (bakery, clinic, ...)
    #[arg(short, long)]
    pub business_type: Option<String>,

    /// City or area the business serves
    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub business_id: Option<String>,
}

impl From<MetadataArgs> for crate::types::BusinessMetadata {
    fn from(args: MetadataArgs) -> Self {
        Self {
            business_type: args.business_type,
            request_type: args.request_type,
            locale: args.locale,
            business_id: args.business_id,
            location: args.location,
        }
    }
}

/// Agent management subcommands
#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// List all registered agents
    List,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::try_parse_from(["atlas-server"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_process_flags() {
        let cli = Cli::try_parse_from([
            "atlas-server",
            "process",
            "Diwali offers",
            "--type",
            "marketing_campaign",
            "--locale",
            "hi-IN",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Process {
                intent,
                metadata,
                json,
            }) => {
                assert_eq!(intent, "Diwali offers");
                assert_eq!(metadata.request_type.as_deref(), Some("marketing_campaign"));
                assert_eq!(metadata.locale.as_deref(), Some("hi-IN"));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["atlas-server", "agent", "list", "--no-color", "-c", "x.toml"])
                .unwrap();
        assert!(cli.no_color);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Some(Commands::Agent(AgentCommands::List))));
    }
}
