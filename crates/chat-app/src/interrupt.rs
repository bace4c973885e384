use tokio::sync::mpsc;

pub type InterruptSender = mpsc::UnboundedSender<()>;

/// Stream of user interrupts consumed by the shell.
///
/// Once every sender is gone, [`Interrupts::next`] never resolves.
pub struct Interrupts {
    events: mpsc::UnboundedReceiver<()>,
}

impl Interrupts {
    /// Creates an interrupt source fed by the returned sender.
    pub fn channel() -> (InterruptSender, Self) {
        let (sender, events) = mpsc::unbounded_channel();
        (sender, Self { events })
    }

    /// Forwards every Ctrl-C delivered to the process.
    ///
    /// Must be called inside a tokio runtime. If the handler cannot be
    /// installed the error is logged and no interrupt is ever delivered.
    pub fn ctrl_c() -> Self {
        let (sender, interrupts) = Self::channel();

        tokio::spawn(async move {
            loop {
                if let Err(error) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %error, "failed to listen for ctrl-c");
                    break;
                }
                if sender.send(()).is_err() {
                    break;
                }
            }
        });

        interrupts
    }

    /// Waits for the next interrupt. Cancel safe.
    pub async fn next(&mut self) {
        if self.events.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}
