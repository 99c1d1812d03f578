use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::error;

use bedrock_preview::cli::{self, Cli, Command, ConfigCommand, ModelOverrides, OutputFormat};
use bedrock_preview::config::{self, Config};
use bedrock_preview::generation::BedrockClient;
use bedrock_preview::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let explicit_config = cli.config.as_deref();

    let command = cli.command.unwrap_or(Command::Interactive {
        overrides: ModelOverrides::default(),
        format: OutputFormat::Text,
    });

    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr();

    // Commands that never touch the model or the config file.
    match &command {
        Command::Version => {
            cli::handle_version(&mut stdout)?;
            return Ok(());
        }
        Command::Config(ConfigCommand::Path) => {
            cli::handle_config_path(explicit_config, &mut stdout)?;
            return Ok(());
        }
        Command::Classify { text, format } => {
            let text = match text {
                Some(text) => text.clone(),
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin().read_to_string(&mut buf).await?;
                    buf
                }
            };
            cli::handle_classify(&text, *format, &mut stdout)?;
            return Ok(());
        }
        _ => {}
    }

    let mut cfg = match config::load_config(explicit_config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = logging::init_logging(&cfg.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match command {
        Command::Config(ConfigCommand::Show) => {
            cli::handle_config_show(&cfg, &mut stdout)?;
        }
        Command::Generate {
            prompt,
            overrides,
            format,
        } => {
            let client = build_client(&mut cfg, &overrides, explicit_config);
            let ok = cli::handle_generate(
                &client,
                &prompt,
                &cfg.model.generation(),
                format,
                &mut stdout,
                &mut stderr,
            )
            .await?;
            stdout.flush()?;
            if !ok {
                std::process::exit(1);
            }
        }
        Command::Interactive { overrides, format } => {
            let client = build_client(&mut cfg, &overrides, explicit_config);
            let input = BufReader::new(tokio::io::stdin());
            cli::run_interactive(
                &client,
                &cfg.model.generation(),
                format,
                input,
                &mut stdout,
                &mut stderr,
            )
            .await?;
        }
        Command::Version | Command::Config(ConfigCommand::Path) | Command::Classify { .. } => {}
    }

    Ok(())
}

/// Apply CLI overrides and build the Bedrock client, exiting on bad settings.
fn build_client(
    cfg: &mut Config,
    overrides: &ModelOverrides,
    explicit_config: Option<&std::path::Path>,
) -> BedrockClient {
    if let Err(e) = overrides.apply(cfg) {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    match BedrockClient::from_config(cfg) {
        Ok(client) => client,
        Err(e) => {
            error!("Bedrock client setup failed: {}", e);
            eprintln!("Cannot set up Bedrock client: {}", e);
            eprintln!(
                "Set AWS_REGION, AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, or add an `aws` section to {}",
                config::get_config_path(explicit_config).display()
            );
            std::process::exit(2);
        }
    }
}
