use clap::Parser;
use report_client::{
    Cli, ClientConfig, Command, TerminalSession, ThemeAction, ValueCheckRequest,
    create_report_service, create_report_session, create_theme_controller, render::Palette,
};
use report_flow::Theme;
use std::io::IsTerminal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_cli(&cli)?;
    info!("Using report backend at {}", config.api_url);

    match cli.command {
        Command::Analyze { files } => {
            let themes = create_theme_controller(&config).await?;
            let interactive = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
            let palette = if std::io::stdout().is_terminal() {
                Palette::for_theme(themes.current())
            } else {
                Palette::plain()
            };

            let session = create_report_session(create_report_service(&config));
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            TerminalSession::new(session, input, std::io::stdout(), palette)
                .interactive(interactive)
                .run(&files)
                .await?;
        }
        Command::Status => {
            let status = create_report_service(&config).status().await?;
            println!("{} ({})", status.message, status.status);
            println!(
                "Retrieval index: {}",
                if status.rag_initialized {
                    "ready"
                } else {
                    "not initialized"
                }
            );
        }
        Command::CheckValue {
            term,
            value,
            unit,
            age,
            gender,
        } => {
            let request = ValueCheckRequest {
                term,
                value,
                unit,
                age,
                gender,
            };
            let result = create_report_service(&config).check_value(&request).await?;
            let mark = if result.is_abnormal { "⚠️" } else { "✓" };
            println!("{} {} {} {}", mark, request.term, request.value, request.unit);
            if let Some(status) = &result.status {
                println!("Status: {}", status.to_uppercase());
            }
            if let Some(range) = &result.reference_range {
                println!("Reference range: {}", range);
            }
            if !result.message.is_empty() {
                println!("{}", result.message);
            }
        }
        Command::Theme { action } => {
            let themes = create_theme_controller(&config).await?;
            let theme = match action {
                None => themes.current(),
                Some(ThemeAction::Light) => {
                    themes.set(Theme::Light).await?;
                    Theme::Light
                }
                Some(ThemeAction::Dark) => {
                    themes.set(Theme::Dark).await?;
                    Theme::Dark
                }
                Some(ThemeAction::Toggle) => themes.toggle().await?,
                Some(ThemeAction::Reset) => themes.reset().await?,
            };
            println!("{}", theme);
        }
    }

    Ok(())
}

/// Logs go to stderr so they never interleave with the session on stdout.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "report_client=info,report_flow=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
