use std::io::{self, BufRead, Write};

use crate::classifier::{Classifier, SequenceClassifier};

/// Typing this (any case) ends the session.
pub const EXIT_COMMAND: &str = "exit";
const PROMPT_MARKER: &str = "> ";

/// Reads prompts line by line from `input` and writes one classification per prompt to `output`.
///
/// Stops at end of input or on [`EXIT_COMMAND`]. A prompt that fails to decode or
/// classify is reported and the session continues; only I/O errors end it early.
/// Returns how many prompts were classified.
pub fn run_interactive<M, R, W>(classifier: &Classifier<M>, mut input: R, mut output: W) -> io::Result<usize>
where
    M: SequenceClassifier,
    R: BufRead,
    W: Write,
{
    let mut classified = 0;
    let mut line = Vec::new();
    loop {
        write!(output, "{}", PROMPT_MARKER)?;
        output.flush()?;

        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            writeln!(output)?;
            break;
        }
        let Ok(text) = std::str::from_utf8(&line) else {
            log::warn!("Skipping prompt that is not valid UTF-8");
            writeln!(output, "Error: prompt is not valid UTF-8")?;
            continue;
        };
        let prompt = text.trim();
        if prompt.eq_ignore_ascii_case(EXIT_COMMAND) {
            break;
        }

        match classifier.predict(prompt) {
            Ok(result) => {
                writeln!(
                    output,
                    "Predicted Prompt Tag: {} ({:.2}% confidence)",
                    result.predicted_label,
                    result.confidence * 100.0
                )?;
                classified += 1;
            }
            Err(e) => {
                log::warn!("Classification failed: {}", e);
                writeln!(output, "Error: {}", e)?;
            }
        }
    }
    log::info!("Interactive session ended after {} prompts", classified);
    Ok(classified)
}
