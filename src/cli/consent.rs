//! Terminal consent surface
//!
//! Answers consent prompts from the shared terminal input. A prompt waits
//! no longer than the broker does; after that the next line belongs to
//! whoever reads it.

use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::automation::{ConsentBroker, ConsentRequest, ConsentResolution};
use crate::cli::input::LineSource;

/// Serve consent requests from the terminal until the broker goes away
pub fn spawn_terminal_consent(
    broker: Arc<ConsentBroker>,
    mut requests: UnboundedReceiver<ConsentRequest>,
    lines: LineSource,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            if let Err(e) = show(&request) {
                warn!("Consent prompt failed: {}", e);
            }
            let answer = match request.timeout {
                Some(limit) => timeout(limit, lines.next_line()).await,
                None => Ok(lines.next_line().await),
            };
            let resolution = match answer {
                Ok(Some(line)) => parse_choice(&line, &request.choices),
                Ok(None) => ConsentResolution::Dismissed,
                Err(_) => {
                    debug!("Consent prompt {} went unanswered", request.id);
                    eprintln!();
                    continue;
                }
            };
            // false when the request already timed out
            broker.resolve(request.id, resolution);
        }
    })
}

fn show(request: &ConsentRequest) -> io::Result<()> {
    let mut stderr = io::stderr();
    writeln!(stderr)?;
    match &request.host {
        Some(host) => writeln!(stderr, "[consent] {} asks: {}", host, request.question)?,
        None => writeln!(stderr, "[consent] {}", request.question)?,
    }
    for (i, choice) in request.choices.iter().enumerate() {
        writeln!(stderr, "  {}) {}", i + 1, choice)?;
    }
    write!(stderr, "Choice [1-{}, empty to dismiss]: ", request.choices.len())?;
    stderr.flush()
}

/// Accept a 1-based index or the text of a choice
fn parse_choice(input: &str, choices: &[String]) -> ConsentResolution {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        if (1..=choices.len()).contains(&n) {
            return ConsentResolution::Choice(n - 1);
        }
    }
    choices
        .iter()
        .position(|c| c.eq_ignore_ascii_case(input))
        .map(ConsentResolution::Choice)
        .unwrap_or(ConsentResolution::Dismissed)
}
