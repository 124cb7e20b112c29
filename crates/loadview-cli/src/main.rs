mod cli;
mod commands;
mod exit_codes;
mod logging;

use std::io::Write;

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    exit_codes::ExitCode::Success.as_i32()
                }
                _ => exit_codes::ExitCode::InvalidInput.as_i32(),
            };
            std::process::exit(code);
        }
    };

    logging::init(&cli.log_level);

    let result = {
        let mut stdout = std::io::stdout().lock();
        let result = match cli.command {
            cli::Command::List(args) => commands::list(args, &mut stdout).await,
            cli::Command::Render(args) => commands::render_node(args, &mut stdout).await,
            cli::Command::Validate(args) => commands::validate(args, &mut stdout).await,
            cli::Command::Export(args) => commands::export(args, &mut stdout).await,
        };
        result.and_then(|code| {
            stdout.flush()?;
            Ok(code)
        })
    };

    let code = match result {
        Ok(code) => code.as_i32(),
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::ExitCode::from_error(&err).as_i32()
        }
    };

    std::process::exit(code);
}
