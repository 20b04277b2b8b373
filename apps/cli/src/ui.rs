use std::time::Duration;

use anyhow::{Result, bail};
use charisma_core::{MAX_RECORDING_SECS, format_elapsed};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Recording indicator: a bar filling up to the maximum duration.
pub fn create_recording_bar() -> ProgressBar {
    let pb = ProgressBar::new(u64::from(MAX_RECORDING_SECS));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.red.bold} {msg} [{bar:40.red/dim}] press Enter to stop")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.set_prefix("● REC");
    pb.set_message(format_elapsed(0));
    pb
}

pub fn set_elapsed(pb: &ProgressBar, secs: u32) {
    pb.set_position(u64::from(secs));
    pb.set_message(format_elapsed(secs));
}

pub fn success(msg: impl std::fmt::Display) {
    println!("{} {}", style("✓").green().bold(), msg);
}

pub fn alert(msg: impl std::fmt::Display) {
    eprintln!("{} {}", style("!").yellow().bold(), msg);
}

pub fn error(msg: impl std::fmt::Display) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

pub fn rule() {
    println!("{}", style("─".repeat(60)).dim());
}

/// Line-oriented stdin shared by every prompt of a session.
pub struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next raw line; errors once stdin is closed.
    pub async fn line(&mut self) -> Result<String> {
        match self.lines.next_line().await? {
            Some(line) => Ok(line),
            None => bail!("stdin closed"),
        }
    }

    pub async fn ask(&mut self, question: &str) -> Result<String> {
        print!("{} {} ", style("?").cyan().bold(), question);
        flush();
        Ok(self.line().await?.trim().to_string())
    }

    /// Single-letter menu; repeats until one of `keys` is typed.
    pub async fn choose(&mut self, question: &str, keys: &[char]) -> Result<char> {
        loop {
            let answer = self.ask(question).await?.to_lowercase();
            if let Some(c) = answer.chars().next().filter(|c| keys.contains(c)) {
                return Ok(c);
            }
            alert(format!(
                "Please type one of: {}",
                keys.iter().map(char::to_string).collect::<Vec<_>>().join("/")
            ));
        }
    }

    pub async fn confirm(&mut self, question: &str) -> Result<bool> {
        Ok(self.choose(&format!("{question} [y/n]"), &['y', 'n']).await? == 'y')
    }
}

fn flush() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_switch_to_minutes() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
