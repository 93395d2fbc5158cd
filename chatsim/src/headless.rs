//! Headless mode for the chat simulator.
//!
//! This module provides a simple text-based interface for running a session
//! without a TUI. It's designed for automated testing and scripted walkthroughs.

use std::io::{self, BufRead, Write};

use chatsim_core::{ChannelId, EngineEvent, HeadlessSession, SessionMode, TranscriptEntry};

/// What the driver loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Line-protocol driver over a [`HeadlessSession`].
pub struct HeadlessDriver {
    session: HeadlessSession,
    printed: usize,
    seen_events: usize,
}

impl HeadlessDriver {
    pub fn new(session: HeadlessSession) -> Self {
        Self {
            session,
            printed: 0,
            seen_events: 0,
        }
    }

    pub fn session(&self) -> &HeadlessSession {
        &self.session
    }

    /// Start the session and play the intro up to the first question.
    pub fn begin(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.session.start();
        self.session.settle();
        self.flush(out)
    }

    /// Apply one input line and print whatever it caused.
    ///
    /// - A number `n` picks the n-th option on offer
    /// - Lines starting with `#` are commands
    pub fn handle_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        if let Ok(choice) = line.parse::<usize>() {
            if choice == 0 || !self.session.choose(choice - 1) {
                writeln!(out, "[ERROR] Option {choice} is not on offer")?;
            } else {
                self.session.settle();
            }
            self.flush(out)?;
            return Ok(Flow::Continue);
        }

        let Some(command) = line.strip_prefix('#') else {
            writeln!(out, "[ERROR] Expected an option number or a #command. Type #help for help.")?;
            return Ok(Flow::Continue);
        };

        let parts: Vec<&str> = command.split_whitespace().collect();
        match parts.first().copied() {
            Some("quit") | Some("exit") => {
                writeln!(out, "Adiós!")?;
                return Ok(Flow::Quit);
            }
            Some("start") => {
                if !self.session.start() {
                    writeln!(out, "[ERROR] The session can only start from ready")?;
                }
                self.session.settle();
            }
            Some("mode") => match parts.get(1).map(|m| m.parse::<SessionMode>()) {
                Some(Ok(mode)) => {
                    if self.session.select_mode(mode) {
                        writeln!(out, "[MODE] {mode:?}")?;
                    } else {
                        writeln!(out, "[ERROR] The mode is fixed once the session starts")?;
                    }
                }
                Some(Err(e)) => writeln!(out, "[ERROR] {e}")?,
                None => writeln!(out, "[ERROR] Usage: #mode <practice|evaluation>")?,
            },
            Some("play") => self.session.play_best(),
            Some("best") => {
                if self.session.choose_best() {
                    self.session.settle();
                } else {
                    writeln!(out, "[ERROR] No options on offer")?;
                }
            }
            Some("open") => match parts.get(1).map(|c| c.parse::<ChannelId>()) {
                Some(Ok(channel)) => {
                    self.session.engine_mut().select_channel(channel);
                    writeln!(out, "[VIEW] {channel}")?;
                }
                Some(Err(e)) => writeln!(out, "[ERROR] {e}")?,
                None => writeln!(out, "[ERROR] Usage: #open <partner|supervisor|evaluation|help>")?,
            },
            Some("back") => {
                self.session.engine_mut().back();
                writeln!(out, "[VIEW] list")?;
            }
            Some("answer") => {
                if !self.session.answer_call() {
                    writeln!(out, "[ERROR] No call is ringing")?;
                }
            }
            Some("decline") => {
                if !self.session.decline_call() {
                    writeln!(out, "[ERROR] No call is ringing")?;
                }
            }
            Some("banner") => match self.session.engine_mut().click_banner() {
                Some(target) => writeln!(out, "[BANNER] opened {target:?}")?,
                None => writeln!(out, "[ERROR] No banner is showing")?,
            },
            Some("wait") => match parts.get(1).map(|ms| ms.parse::<u64>()) {
                Some(Ok(ms)) => self.session.advance(ms),
                _ => writeln!(out, "[ERROR] Usage: #wait <ms>")?,
            },
            Some("settle") => self.session.settle(),
            Some("reset") => {
                self.session.reset();
                writeln!(out, "[RESET]")?;
            }
            Some("terminate") => {
                if !self.session.terminate() {
                    writeln!(out, "[ERROR] Nothing to terminate")?;
                }
            }
            Some("status") => writeln!(out, "[STATUS] {}", self.session.status_line())?,
            Some("options") => self.print_options(out)?,
            Some("help") => print_help(out)?,
            _ => writeln!(out, "[ERROR] Unknown command. Type #help for help.")?,
        }

        self.flush(out)?;
        Ok(Flow::Continue)
    }

    /// Print new messages and notable events since the last flush.
    fn flush(&mut self, out: &mut impl Write) -> io::Result<()> {
        let transcript = self.session.transcript();
        for entry in &transcript[self.printed..] {
            writeln!(out, "{}", format_entry(entry))?;
        }
        self.printed = transcript.len();

        let mut offered = false;
        let events = self.session.events();
        for event in &events[self.seen_events..] {
            match event {
                EngineEvent::StatusChanged(status) => writeln!(out, "[STATUS] {status}")?,
                EngineEvent::CallRinging { .. } => {
                    let (caller, icon) = self.session.engine().caller();
                    writeln!(out, "[CALL] {icon} {caller} is calling. #answer or #decline")?;
                }
                EngineEvent::CallEnded(outcome) => writeln!(out, "[CALL] {outcome:?}")?,
                EngineEvent::BannerShown(banner) => {
                    writeln!(out, "[BANNER] {} {}: {}", banner.icon, banner.title, banner.message)?
                }
                EngineEvent::Confetti => writeln!(out, "[CONFETTI]")?,
                EngineEvent::Remediation { topic } => writeln!(out, "[HELP] Refuerzo: {topic}")?,
                EngineEvent::MasteryBlocked { topic, .. } => {
                    writeln!(out, "[BLOCKED] Mastery required on {topic}")?
                }
                EngineEvent::Completed(signal) => {
                    writeln!(out, "[COMPLETE] {}/{}", signal.score, signal.total)?
                }
                EngineEvent::OptionsOffered { .. } => offered = true,
                _ => {}
            }
        }
        self.seen_events = events.len();

        if offered && self.session.is_awaiting_answer() {
            self.print_options(out)?;
        }
        out.flush()
    }

    fn print_options(&self, out: &mut impl Write) -> io::Result<()> {
        let options = self.session.options();
        if options.is_empty() {
            return writeln!(out, "[OPTIONS] none");
        }
        writeln!(out, "[OPTIONS]")?;
        for (i, option) in options.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, option.text)?;
        }
        Ok(())
    }
}

/// One transcript line: `[channel @ms] content`.
pub fn format_entry(entry: &TranscriptEntry) -> String {
    let content = entry.message.content.replace("**", "");
    format!(
        "[{} @{}ms {:?}] {}",
        entry.channel, entry.at_ms, entry.message.kind, content
    )
}

fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "[HELP]")?;
    writeln!(out, "  <n>            - Choose the n-th option")?;
    writeln!(out, "  #best          - Choose the best option")?;
    writeln!(out, "  #play          - Play the rest with best answers")?;
    writeln!(out, "  #start         - Start after a reset")?;
    writeln!(out, "  #mode <m>      - practice or evaluation (before start)")?;
    writeln!(out, "  #open <ch>     - Open partner, supervisor, evaluation or help")?;
    writeln!(out, "  #back          - Back to the chat list")?;
    writeln!(out, "  #answer        - Answer the incoming call")?;
    writeln!(out, "  #decline       - Decline the incoming call")?;
    writeln!(out, "  #banner        - Click the current banner")?;
    writeln!(out, "  #wait <ms>     - Let virtual time pass")?;
    writeln!(out, "  #settle        - Run pending replies")?;
    writeln!(out, "  #options       - Show the options on offer")?;
    writeln!(out, "  #reset         - Start over")?;
    writeln!(out, "  #terminate     - End the session now")?;
    writeln!(out, "  #status        - Show session status")?;
    writeln!(out, "  #quit          - Exit")
}

/// Run the line protocol on stdin/stdout.
pub fn run_headless(session: HeadlessSession, json: bool) -> anyhow::Result<()> {
    let mut driver = HeadlessDriver::new(session);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    writeln!(stdout, "=== Chat Simulator Headless Mode ===")?;
    if let Some(script) = driver.session().engine().script() {
        writeln!(stdout, "Script: {} ({} questions)", script.title, script.len())?;
    }
    writeln!(stdout, "Type #help for commands.")?;
    writeln!(stdout)?;
    driver.begin(&mut stdout)?;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };
        if driver.handle_line(&line, &mut stdout)? == Flow::Quit {
            break;
        }
    }

    if json {
        let transcript = serde_json::to_string_pretty(driver.session().transcript())?;
        writeln!(stdout, "{transcript}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsim_core::{EngineConfig, SessionStatus};

    fn driver() -> (HeadlessDriver, Vec<u8>) {
        let session = HeadlessSession::builtin(EngineConfig::new().without_interrupt()).unwrap();
        let mut driver = HeadlessDriver::new(session);
        let mut out = Vec::new();
        driver.begin(&mut out).unwrap();
        (driver, out)
    }

    fn run(driver: &mut HeadlessDriver, line: &str) -> String {
        let mut out = Vec::new();
        driver.handle_line(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_begin_prints_first_question() {
        let (_, out) = driver();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("[STATUS] playing"));
        assert!(out.contains("[OPTIONS]"));
        assert!(out.contains("  1. "));
    }

    #[test]
    fn test_number_answers_and_prints_replies() {
        let (mut driver, _) = driver();
        let out = run(&mut driver, "1");
        assert!(out.contains("[partner @"));
        assert!(out.contains("User]"));
        assert_eq!(driver.session().score(), 2);
        assert_eq!(driver.session().step(), 1);
    }

    #[test]
    fn test_out_of_range_choice_is_an_error() {
        let (mut driver, _) = driver();
        assert!(run(&mut driver, "9").starts_with("[ERROR]"));
        assert!(run(&mut driver, "0").starts_with("[ERROR]"));
        assert_eq!(driver.session().score(), 0);
    }

    #[test]
    fn test_play_reaches_results() {
        let (mut driver, _) = driver();
        let out = run(&mut driver, "#play");
        assert!(out.contains("[STATUS] finished"));
        assert!(out.contains("[COMPLETE] 18/18"));
        assert_eq!(driver.session().status(), SessionStatus::Finished);
    }

    #[test]
    fn test_commands() {
        let (mut driver, _) = driver();
        assert_eq!(run(&mut driver, "#open jefe"), "[VIEW] supervisor\n");
        assert!(run(&mut driver, "#answer").starts_with("[ERROR]"));
        assert!(run(&mut driver, "#status").contains("score=0/18"));
        assert!(run(&mut driver, "#bogus").starts_with("[ERROR] Unknown command"));
        assert!(run(&mut driver, "hola").starts_with("[ERROR]"));

        let mut out = Vec::new();
        assert_eq!(driver.handle_line("#quit", &mut out).unwrap(), Flow::Quit);
    }

    #[test]
    fn test_terminate_then_reset() {
        let (mut driver, _) = driver();
        assert!(run(&mut driver, "#terminate").contains("[STATUS] terminated"));
        let out = run(&mut driver, "#reset");
        assert!(out.contains("[RESET]"));
        assert_eq!(driver.session().status(), SessionStatus::Ready);
    }
}
