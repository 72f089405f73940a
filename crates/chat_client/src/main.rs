use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use chat_client::backends::{backend_from_config, fetch_settings};
use chat_client::commands::{
    parse_confirmation_answer, parse_slash_command, SlashCommand, HELP_TEXT,
};
use chat_client::config::ClientConfig;
use chat_client::controller::{RenderHost, SessionController};
use chat_client::logging::init_logging;
use chat_client::render::{format_settings, RenderSignal, TranscriptPrinter};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("chat-client: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let config = ClientConfig::from_env().map_err(|error| error.to_string())?;
    init_logging(config.log_filter.as_deref());

    let backend = backend_from_config(&config).await?;
    let signal = Arc::new(RenderSignal::new());
    let controller = Arc::new(SessionController::with_render_host(
        backend,
        Arc::clone(&signal) as Arc<dyn RenderHost>,
    ));

    let profile = controller.backend_profile();
    match profile.endpoint.as_deref() {
        Some(endpoint) => println!("Using {} backend at {endpoint}.", profile.backend_id),
        None => println!("Using {} backend.", profile.backend_id),
    }
    println!("{HELP_TEXT}");

    let renderer = tokio::spawn({
        let controller = Arc::clone(&controller);
        let signal = Arc::clone(&signal);
        async move {
            let mut printer = TranscriptPrinter::new();
            loop {
                signal.changed().await;
                let output = printer.render(&controller.snapshot());
                if !output.is_empty() {
                    let mut stdout = std::io::stdout().lock();
                    let _ = stdout.write_all(output.as_bytes());
                    let _ = stdout.flush();
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(|error| error.to_string())? {
        if controller.snapshot().awaiting_confirmation {
            if let Some(approved) = parse_confirmation_answer(&line) {
                controller.resolve_confirmation(approved).await;
                continue;
            }
        }

        match parse_slash_command(&line) {
            Some(SlashCommand::Help) => println!("{HELP_TEXT}"),
            Some(SlashCommand::Reset) => controller.reset().await,
            Some(SlashCommand::Settings) => match fetch_settings(&config).await {
                Ok(settings) => print!("{}", format_settings(&settings)),
                Err(error) => println!("{error}"),
            },
            Some(SlashCommand::Quit) => break,
            Some(SlashCommand::Unknown(command)) => {
                println!("Unknown command {command}. {HELP_TEXT}");
            }
            None if line.trim().is_empty() => {}
            None => match controller.start_send(line) {
                Ok(turn) => {
                    let controller = Arc::clone(&controller);
                    tokio::spawn(async move {
                        controller.stream_turn(turn).await;
                    });
                }
                Err(reason) => println!("Not sent: {reason}."),
            },
        }
    }

    renderer.abort();
    Ok(())
}
