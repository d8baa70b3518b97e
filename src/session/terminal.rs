use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use super::SessionController;
use crate::models::ModelConfig;

/// Typing this on its own line ends a terminal conversation.
pub const EXIT_COMMAND: &str = "exit";

const QUESTION_PROMPT: &str = "What would you like to know?\n> ";

/// Run one conversation over a line-oriented terminal.
///
/// A single session is created for the whole conversation. Every non-empty
/// line is asked through the controller until [`EXIT_COMMAND`] or end of
/// input. Returns the number of answered questions.
pub async fn run_terminal_chat<R, W>(
    controller: &SessionController,
    model: ModelConfig,
    input: R,
    mut output: W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let id = controller.new_session(model);
    let mut lines = input.lines();
    let mut answered = 0;

    loop {
        output.write_all(QUESTION_PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == EXIT_COMMAND {
            break;
        }

        match controller.ask(id, query).await {
            Ok(outcome) => {
                output
                    .write_all(format!("{}\n\n", outcome.answer).as_bytes())
                    .await?;
                answered += 1;
            }
            Err(e) => {
                warn!(session = %id, "Terminal question failed: {}", e);
                output.write_all(format!("Error: {e}\n\n").as_bytes()).await?;
            }
        }
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(answered)
}
