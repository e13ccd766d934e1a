use crate::cli::args::Args;
use crate::cli::output::{ConsoleWriter, OutputError, OutputWriter};
use crate::core::dispatcher::{DispatchSettings, Dispatcher, Outcome, Progress};
use crate::core::protocol::{BackendRegistry, ProtocolError};
use crate::core::session::CancelHandle;
use crate::domain::error::{QmiCtlError, QmiCtlResult};
use crate::infrastructure::config::{resolve_device, ConfigManager};
use crate::infrastructure::emulator::EmulatorBackend;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::signals::spawn_signal_listener;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Backends compiled into this binary.
pub fn default_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register_backend(Arc::new(EmulatorBackend::new()));
    registry
}

/// Execute CLI command, returning the process exit code.
///
/// Errors raised before dispatch (configuration, argument validation) are
/// returned for the caller to report; dispatch results are printed here.
pub async fn execute_command(args: Args) -> QmiCtlResult<u8> {
    let writer = ConsoleWriter::new(args.output_format());

    if args.version {
        writer.write_version()?;
        return Ok(0);
    }

    // Load configuration using ConfigManager
    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_explicit_path(path),
        None => ConfigManager::new(),
    };
    let config = config_manager.load_config()?;

    // Initialize logging
    init_logging(args.verbose, args.silent, &config.global.log_level).map_err(|e| {
        QmiCtlError::configuration(format!("couldn't initialize logging: {}", e))
    })?;

    let invocation = args.invocation(config.global.default_device.as_deref())?;
    let device = resolve_device(&config, &invocation.device)?;
    let device_display = device.path.display().to_string();

    let mut settings = DispatchSettings::from_config(&config.global);
    settings.open_flags = device.open_flags.merged_with(invocation.open_flags);
    settings.cid = invocation.cid;
    settings.release_policy = invocation.release_policy;

    let registry = default_registry();
    let backend = match registry.resolve(&device.path) {
        Some(backend) => backend,
        None => {
            let error = QmiCtlError::Connection {
                device: device_display.clone(),
                source: ProtocolError::Transport(format!(
                    "no backend can open this device (available: {})",
                    registry.available_backends().join(", ")
                )),
            };
            writer.write_error(Some(device_display.as_str()), &error)?;
            return Ok(1);
        }
    };

    let cancel = CancelHandle::new();
    let signals = spawn_signal_listener(cancel.clone());

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(backend, settings).with_progress(progress_tx);

    let run = dispatcher.run(&device.path, &invocation.action, &cancel);
    let (outcome, progress_error) =
        drive_dispatch(&writer, &device_display, run, &mut progress_rx).await;
    signals.abort();

    debug!("dispatch went through {:?}", outcome.transitions);
    writer.write_outcome(&outcome)?;
    if let Some(err) = progress_error {
        return Err(err.into());
    }
    Ok(outcome.exit_code())
}

/// Poll the dispatch to completion, printing progress records as they arrive.
///
/// Output failures never cut the dispatch short: the client still has to be
/// released and a followed network stopped. Once a record fails to print the
/// rest are dropped, and the first failure is returned with the outcome.
pub async fn drive_dispatch<W, F>(
    writer: &W,
    device: &str,
    run: F,
    progress_rx: &mut mpsc::UnboundedReceiver<Progress>,
) -> (Outcome, Option<OutputError>)
where
    W: OutputWriter + ?Sized,
    F: Future<Output = Outcome>,
{
    let mut failure = None;
    tokio::pin!(run);
    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome,
            Some(progress) = progress_rx.recv() => {
                forward(writer, device, &progress, &mut failure);
            }
        }
    };
    while let Ok(progress) = progress_rx.try_recv() {
        forward(writer, device, &progress, &mut failure);
    }
    (outcome, failure)
}

fn forward<W: OutputWriter + ?Sized>(
    writer: &W,
    device: &str,
    progress: &Progress,
    failure: &mut Option<OutputError>,
) {
    if failure.is_some() {
        return;
    }
    if let Err(err) = writer.write_progress(device, progress) {
        warn!("couldn't print progress, continuing without it: {}", err);
        *failure = Some(err);
    }
}
