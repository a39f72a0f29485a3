use crate::agents::package_source::PackageCandidate;
use crate::error::{Result, UpdateError};
use colored::Colorize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

/// Device prompts are read from, so a piped stdin never answers for the operator.
const CONTROLLING_TERMINAL: &str = "/dev/tty";

/// The operator's answer for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDecision {
    Yes,
    No,
    Skip,
    Invalid,
}

impl UserDecision {
    /// Empty input means yes.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => UserDecision::Yes,
            "n" | "no" => UserDecision::No,
            "s" | "skip" => UserDecision::Skip,
            _ => UserDecision::Invalid,
        }
    }

    pub fn is_yes(self) -> bool {
        self == UserDecision::Yes
    }
}

/// Human decisions the workflow needs.
pub trait Prompter {
    /// Go/no-go for one candidate.
    fn decide(&mut self, candidate: &PackageCandidate) -> Result<UserDecision>;

    /// Yes/no question with a default for empty input.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;
}

/// Reads answers line by line, from the controlling terminal in production.
///
/// The input is opened on the first question, so runs that never ask
/// anything work without a terminal.
pub struct TerminalPrompter<R> {
    input: Option<R>,
    opener: fn() -> Result<R>,
}

impl TerminalPrompter<BufReader<File>> {
    pub fn open() -> Self {
        Self::deferred(open_terminal)
    }
}

fn open_terminal() -> Result<BufReader<File>> {
    let tty = File::open(CONTROLLING_TERMINAL).map_err(|e| {
        UpdateError::ProjectValidation(format!(
            "Cannot open {CONTROLLING_TERMINAL} for prompts ({e}); rerun with --yes for unattended runs"
        ))
    })?;
    Ok(BufReader::new(tty))
}

impl<R: BufRead> TerminalPrompter<R> {
    pub fn from_reader(input: R) -> Self {
        Self {
            input: Some(input),
            opener: || Err(UpdateError::ProjectValidation("prompt input is closed".into())),
        }
    }

    pub(crate) fn deferred(opener: fn() -> Result<R>) -> Self {
        Self {
            input: None,
            opener,
        }
    }

    /// `None` once the input is closed.
    fn read_answer(&mut self) -> Result<Option<String>> {
        let input = match self.input.take() {
            Some(input) => input,
            None => (self.opener)()?,
        };
        let input = self.input.insert(input);

        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            println!();
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl<R: BufRead> Prompter for TerminalPrompter<R> {
    fn decide(&mut self, candidate: &PackageCandidate) -> Result<UserDecision> {
        let status = candidate
            .latest_status
            .as_deref()
            .map(|s| format!(" ({s})"))
            .unwrap_or_default();
        println!(
            "\n{} {} {} {} to {}{}",
            "[update]".cyan().bold(),
            candidate.name.white().bold(),
            "from".dimmed(),
            candidate.current_version.red(),
            candidate.latest_version.green().bold(),
            status.dimmed()
        );
        if let Some(description) = &candidate.description {
            println!("   {}", description.dimmed());
        }

        print!("{}", "Update this package? [Y/n/s]: ".bold());
        let decision = match self.read_answer()? {
            Some(line) => UserDecision::parse(&line),
            None => UserDecision::Invalid,
        };

        match decision {
            UserDecision::Yes => {}
            UserDecision::No | UserDecision::Skip => {
                println!("{}", "Skipping this update.".dimmed())
            }
            UserDecision::Invalid => {
                println!("{}", "Unrecognised answer, skipping this update.".yellow())
            }
        }
        Ok(decision)
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            print!("{} ", format!("{question} {hint}:").bold());
            let Some(line) = self.read_answer()? else {
                return Ok(default);
            };

            match line.trim().to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => println!("{}", "Please answer with y(es) or n(o).".red()),
            }
        }
    }
}

/// Answers every question for unattended runs: every candidate gets a yes,
/// every confirmation its default.
#[derive(Debug, Default)]
pub struct AutoApprove;

impl Prompter for AutoApprove {
    fn decide(&mut self, candidate: &PackageCandidate) -> Result<UserDecision> {
        println!(
            "\n{} {} {} -> {}",
            "[update]".cyan().bold(),
            candidate.name.white().bold(),
            candidate.current_version.red(),
            candidate.latest_version.green().bold()
        );
        Ok(UserDecision::Yes)
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let answer = if default { "yes" } else { "no" };
        println!("{} {}", question.bold(), format!("({answer}, unattended)").dimmed());
        Ok(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> TerminalPrompter<Cursor<Vec<u8>>> {
        TerminalPrompter::from_reader(Cursor::new(input.as_bytes().to_vec()))
    }

    #[test]
    fn parses_decisions() {
        assert_eq!(UserDecision::parse(""), UserDecision::Yes);
        assert_eq!(UserDecision::parse("  Y \n"), UserDecision::Yes);
        assert_eq!(UserDecision::parse("yes"), UserDecision::Yes);
        assert_eq!(UserDecision::parse("n"), UserDecision::No);
        assert_eq!(UserDecision::parse("NO"), UserDecision::No);
        assert_eq!(UserDecision::parse("s"), UserDecision::Skip);
        assert_eq!(UserDecision::parse("skip"), UserDecision::Skip);
        assert_eq!(UserDecision::parse("maybe"), UserDecision::Invalid);
    }

    #[test]
    fn decide_reads_one_line_per_candidate() {
        let mut prompter = prompter("\nn\nwhat\n");
        let candidate = PackageCandidate::new("drupal/token", "1.12.0", "1.13.0");
        assert_eq!(prompter.decide(&candidate).unwrap(), UserDecision::Yes);
        assert_eq!(prompter.decide(&candidate).unwrap(), UserDecision::No);
        assert_eq!(prompter.decide(&candidate).unwrap(), UserDecision::Invalid);
    }

    #[test]
    fn closed_input_never_approves_an_update() {
        let mut prompter = prompter("");
        let candidate = PackageCandidate::new("drupal/token", "1.12.0", "1.13.0");
        assert_eq!(prompter.decide(&candidate).unwrap(), UserDecision::Invalid);
    }

    #[test]
    fn confirm_uses_default_and_reasks_on_garbage() {
        let mut prompter = prompter("\nperhaps\nn\n");
        assert!(prompter.confirm("Push?", true).unwrap());
        assert!(!prompter.confirm("Push?", true).unwrap());
    }

    #[test]
    fn confirm_falls_back_to_default_on_closed_input() {
        let mut prompter = prompter("");
        assert!(!prompter.confirm("Delete branch?", false).unwrap());
    }

    #[test]
    fn terminal_is_opened_on_first_question_only() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static OPENED: AtomicUsize = AtomicUsize::new(0);

        let mut prompter = TerminalPrompter::deferred(|| {
            OPENED.fetch_add(1, Ordering::SeqCst);
            Ok(Cursor::new(b"y\nn\n".to_vec()))
        });
        assert_eq!(OPENED.load(Ordering::SeqCst), 0);

        assert!(prompter.confirm("Continue?", false).unwrap());
        assert!(!prompter.confirm("Push?", true).unwrap());
        assert_eq!(OPENED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_terminal_fails_only_when_asked() {
        let mut prompter: TerminalPrompter<Cursor<Vec<u8>>> =
            TerminalPrompter::deferred(|| Err(UpdateError::ProjectValidation("no tty".into())));
        let candidate = PackageCandidate::new("drupal/token", "1.12.0", "1.13.0");
        assert!(matches!(
            prompter.decide(&candidate),
            Err(UpdateError::ProjectValidation(_))
        ));
    }

    #[test]
    fn auto_approve_takes_defaults() {
        let mut auto = AutoApprove;
        let candidate = PackageCandidate::new("drupal/token", "1.12.0", "1.13.0");
        assert_eq!(auto.decide(&candidate).unwrap(), UserDecision::Yes);
        assert!(auto.confirm("Switch back?", true).unwrap());
        assert!(!auto.confirm("Push?", false).unwrap());
    }
}
