use tokio::signal;
use tokio::sync::watch;

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

/// Fan a single shutdown notification out to background loops.
pub(crate) struct ShutdownNotifier {
    tx: watch::Sender<bool>,
}

impl ShutdownNotifier {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub(crate) fn notify(&self) {
        if self.tx.send(true).is_err() {
            tracing::warn!("Failed to broadcast shutdown signal to background tasks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ShutdownNotifier;

    #[tokio::test]
    async fn notifier_wakes_receivers() {
        let (notifier, mut rx) = ShutdownNotifier::new();
        assert!(!*rx.borrow());

        notifier.notify();
        rx.changed().await.expect("changed");
        assert!(*rx.borrow());
    }
}
