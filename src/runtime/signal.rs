//! Process termination signals that trigger a graceful shutdown.

/// Signal that ended the process wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Interrupt => write!(f, "SIGINT"),
            Termination::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Listens for Ctrl+C and, on Unix, SIGTERM.
///
/// Handlers are installed by [`TerminationSignal::register`], so a signal sent
/// after registration is never lost.
pub struct TerminationSignal {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl TerminationSignal {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    #[cfg(unix)]
    pub async fn recv(&mut self) -> Termination {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => Termination::Interrupt,
            _ = self.sigterm.recv() => Termination::Terminate,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Termination {
        tokio::signal::ctrl_c().await.ok();
        Termination::Interrupt
    }
}
