//! Interactive line-oriented loop
//!
//! Reads one request per line; `exit` / `quit` (case-insensitive) or
//! end-of-input terminate. A `!write <path> <<<` line with no inline
//! payload collects continuation lines until a line equal to `EOF`.

use anyhow::Result;
use console::Style;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use waymark_core::Agent;

lazy_static! {
    static ref WRITE_HEADER: Regex = Regex::new(r"(?i)^!write\s+\S+\s+<<<\s*$").unwrap();
}

/// Marker line terminating a collected multi-line write payload.
const PAYLOAD_END: &str = "EOF";

pub async fn run(agent: &mut Agent) -> Result<()> {
    let dim = Style::new().dim();
    let blue = Style::new().blue().bold();
    let green = Style::new().green().bold();
    let red = Style::new().red();

    println!(
        "{}",
        dim.apply_to("waymark agent (planner + sentinels + memory). 'exit' or Ctrl-D to quit.")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n{} ", blue.apply_to("You >"));
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim().to_string();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let request = if WRITE_HEADER.is_match(&input) {
            match collect_payload(&input, &mut lines).await? {
                Some(full) => full,
                None => break, // EOF mid-payload
            }
        } else {
            input
        };

        match agent.run_query(&request).await {
            Ok(reply) => {
                // A flat refusal gets one plain-chat retry.
                let reply = if reply.trim().eq_ignore_ascii_case("i cannot do that") {
                    agent.plain_chat(&request).await.unwrap_or(reply)
                } else {
                    reply
                };
                println!("{} {}", green.apply_to("AI >"), reply);
            }
            Err(e) => println!("{} {}", red.apply_to("AI >"), red.apply_to(e.to_string())),
        }
    }

    Ok(())
}

/// Gather payload lines for a bare `!write <path> <<<` header until the
/// end marker. Returns the full command string, or `None` on
/// end-of-input.
async fn collect_payload(
    header: &str,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<Option<String>> {
    let mut payload = Vec::new();
    loop {
        match lines.next_line().await? {
            None => return Ok(None),
            Some(line) if line.trim() == PAYLOAD_END => break,
            Some(line) => payload.push(line),
        }
    }
    Ok(Some(format!("{header} {}", payload.join("\n"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_header_matches_only_the_bare_heredoc_form() {
        assert!(WRITE_HEADER.is_match("!write out.txt <<<"));
        assert!(WRITE_HEADER.is_match("!WRITE out.txt <<<  "));
        assert!(!WRITE_HEADER.is_match("!write out.txt <<< inline payload"));
        assert!(!WRITE_HEADER.is_match("write out.txt <<<"));
    }
}
