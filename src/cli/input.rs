//! Shared terminal input
//!
//! Stdin has a single reader thread. The REPL and the consent prompt both
//! take lines from its channel, so a prompt that gave up waiting never
//! keeps a read pending that would swallow the next command.

use std::io::{self, BufRead};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Mutex;
use tracing::debug;

/// Lines typed on the terminal, in order
#[derive(Clone)]
pub struct LineSource {
    lines: Arc<Mutex<UnboundedReceiver<String>>>,
}

impl LineSource {
    /// Start the stdin reader thread
    pub fn stdin() -> Self {
        let (tx, rx) = unbounded_channel();
        std::thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("Stdin read failed: {}", e);
                        break;
                    }
                }
            }
        });
        Self::from_receiver(rx)
    }

    pub fn from_receiver(lines: UnboundedReceiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
        }
    }

    /// Next line, or None once input has ended.
    ///
    /// Dropping the returned future consumes nothing.
    pub async fn next_line(&self) -> Option<String> {
        self.lines.lock().await.recv().await
    }
}
