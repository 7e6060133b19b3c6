#[cfg(test)]
#[path = "input_test.rs"]
mod tests;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{ArcEventTx, Event};

/// Feeds stdin lines and Ctrl-C into the app event queue.
pub struct InputService {
    event_tx: ArcEventTx,
    cancel_token: CancellationToken,
}

impl InputService {
    pub fn new(event_tx: ArcEventTx, cancel_token: CancellationToken) -> Self {
        Self {
            event_tx,
            cancel_token,
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(err) = self.run(stdin).await {
                log::error!("Input service stopped: {:#}", err);
            }
        })
    }

    /// Forward every line of `reader`, then `Quit` at end of input.
    async fn run<R: AsyncBufRead + Unpin>(&self, reader: R) -> eyre::Result<()> {
        let mut lines = reader.lines();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    log::debug!("Input service cancelled");
                    return Ok(());
                }

                signal = &mut ctrl_c => {
                    signal?;
                    self.event_tx.send(Event::Interrupt).await?;
                    ctrl_c.set(tokio::signal::ctrl_c());
                }

                line = lines.next_line() => {
                    match line? {
                        Some(line) => self.event_tx.send(Event::Input(line)).await?,
                        None => {
                            self.event_tx.send(Event::Quit).await?;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
