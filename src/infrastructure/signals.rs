// Signals module - Turn termination signals into a cancellation request
use crate::core::session::CancelHandle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn a task that requests cancellation on SIGINT, SIGHUP or SIGTERM.
///
/// Handlers are installed before this returns, so a signal can't slip in
/// ahead of the listener and kill the process. The task runs until aborted;
/// only the first signal has any effect.
pub fn spawn_signal_listener(cancel: CancelHandle) -> JoinHandle<()> {
    let mut signals = match TerminationSignals::register() {
        Ok(signals) => signals,
        Err(e) => {
            warn!("couldn't listen for signals: {}", e);
            return tokio::spawn(async {});
        }
    };

    tokio::spawn(async move {
        loop {
            let signal = match signals.recv().await {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("couldn't listen for signals: {}", e);
                    return;
                }
            };

            if cancel.request() {
                info!("cancelling the operation ({})", signal);
            } else {
                debug!("cancellation already requested, ignoring {}", signal);
            }
        }
    })
}

#[cfg(unix)]
struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.terminate.recv() => "SIGTERM",
        };
        Ok(name)
    }
}

#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}
