// qmictl - QMI modem control tool
use clap::error::ErrorKind;
use clap::Parser;
use qmictl::cli::args::{Args, OutputFormat};
use qmictl::cli::commands::execute_command;
use qmictl::cli::output::{ConsoleWriter, OutputWriter};
use qmictl::QmiCtlError;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                eprint!("{}", e);
                let message = e.to_string();
                let headline = message
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches("error: ")
                    .to_string();
                report(OutputFormat::Json, &QmiCtlError::configuration(headline));
                return ExitCode::FAILURE;
            }
        },
    };

    let format = args.output_format();
    match execute_command(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            report(format, &e);
            ExitCode::FAILURE
        }
    }
}

fn report(format: OutputFormat, error: &QmiCtlError) {
    eprintln!("error: {}", error);
    if let Err(e) = ConsoleWriter::new(format).write_error(None, error) {
        eprintln!("Error: {}", e);
    }
}
