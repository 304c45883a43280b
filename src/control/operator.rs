// Operator confirmation between operation cycles

use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tracing::warn;

#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    /// Asked after operation cycle `completed` when more cycles remain.
    /// `false` ends the run.
    async fn should_continue(&self, completed: u32) -> bool;
}

/// Never asks; runs until the cycle limit or cancellation
#[derive(Debug, Default)]
pub struct AutoContinue;

#[async_trait]
impl OperatorPrompt for AutoContinue {
    async fn should_continue(&self, _completed: u32) -> bool {
        true
    }
}

/// Asks on the terminal: Enter continues, `q` stops
#[derive(Debug, Default)]
pub struct StdinPrompt;

#[async_trait]
impl OperatorPrompt for StdinPrompt {
    async fn should_continue(&self, completed: u32) -> bool {
        let answer = tokio::task::spawn_blocking(move || -> io::Result<Option<String>> {
            let mut stdout = io::stdout();
            write!(
                stdout,
                "Cycle {} finished. Press Enter to continue (or 'q' to stop): ",
                completed
            )?;
            stdout.flush()?;

            let mut line = String::new();
            let read = io::stdin().lock().read_line(&mut line)?;
            Ok((read > 0).then_some(line))
        })
        .await;

        match answer {
            Ok(Ok(Some(line))) => !wants_stop(&line),
            // stdin closed: nobody left to confirm
            Ok(Ok(None)) => false,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read operator input, stopping");
                false
            }
            Err(e) => {
                warn!(error = %e, "Operator prompt task failed, stopping");
                false
            }
        }
    }
}

fn wants_stop(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_stop() {
        assert!(wants_stop("q\n"));
        assert!(wants_stop(" Q "));
        assert!(!wants_stop("\n"));
        assert!(!wants_stop("continue\n"));
    }

    #[tokio::test]
    async fn test_auto_continue() {
        assert!(AutoContinue.should_continue(1).await);
    }
}
