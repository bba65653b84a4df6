use anyhow::{Context, Result};
use atlas::api::routes::create_app;
use atlas::cli::{commands, output::Output, AgentCommands, Cli, Commands};
use atlas::utils::toml_config::{AppConfig, DEFAULT_CONFIG_PATH};
use atlas::{AppState, Orchestrator, Request, ResponseStatus};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for a processed request whose response is `partial`
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let (config, source) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            output.error(&format!("{:#}", e));
            return Ok(ExitCode::FAILURE);
        }
    };

    let serving = matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(&config, cli.verbose, serving);

    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });

    match command {
        Commands::Serve { host, port } => {
            serve(config, host, port, &output).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Process {
            intent,
            metadata,
            json,
        } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let request = Request::new(intent).with_metadata(metadata.into());
            let outcome = commands::process(&output, &orchestrator, request, json).await;
            orchestrator.registry().shutdown().await;

            match outcome {
                Ok(ResponseStatus::Partial) => Ok(ExitCode::from(EXIT_PARTIAL)),
                Ok(_) => Ok(ExitCode::SUCCESS),
                Err(e) => {
                    output.error(&e.to_string());
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Plan {
            intent,
            request_type,
        } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let mut request = Request::new(intent);
            request.metadata.request_type = request_type;

            match commands::plan(&output, &orchestrator, &request) {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(e) => {
                    output.error(&e.to_string());
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Config { validate } => {
            match commands::show_config(&output, &config, source.as_deref(), validate) {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(e) => {
                    output.error(&e.to_string());
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Agent(AgentCommands::List) => {
            let orchestrator = Orchestrator::from_config(&config)?;
            orchestrator.registry().initialize_all().await?;
            commands::list_agents(&output, orchestrator.registry());
            orchestrator.registry().shutdown().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load an explicit config file, or `atlas.toml` if present, or the defaults
fn load_config(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let config = AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        return Ok((config, Some(path.to_path_buf())));
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        let config = AppConfig::load(&default_path)
            .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG_PATH))?;
        Ok((config, Some(default_path)))
    } else {
        Ok((AppConfig::default(), None))
    }
}

/// `--verbose` forces debug, otherwise `RUST_LOG` wins over the configured level.
/// One-shot commands stay quiet unless asked so their output is readable.
fn init_tracing(config: &AppConfig, verbose: bool, serving: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        let fallback = if serving {
            config.server.log_level.as_str()
        } else {
            "warn"
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.server.log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    output: &Output,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    output.banner();

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let report = orchestrator.registry().initialize_all().await?;
    if !report.fallback.is_empty() {
        warn!(agents = ?report.fallback, "Some agents are serving fallbacks");
    }

    let addr = config.bind_address();
    let state = AppState::new(Arc::clone(&orchestrator), Arc::new(config));
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, "Atlas server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    orchestrator.registry().shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
