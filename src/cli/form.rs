//! The interactive form: choose an expert, type a question, submit.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::cli::ask::validate_input;
use crate::cli::AppContext;
use crate::core::expert::ExpertRegistry;

#[derive(Debug, PartialEq, Eq)]
pub struct FormSubmission {
    pub expert_code: String,
    pub text: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FormOutcome {
    Submitted(FormSubmission),
    /// The user submitted blank text; nothing should be sent.
    Rejected,
    /// Input ended before a choice was made.
    Cancelled,
}

/// Resolves what the user typed at the expert prompt: a code, a 1-based list
/// number, or nothing for the default.
fn parse_choice<'a>(experts: &'a ExpertRegistry, choice: &str, default_code: &'a str) -> Option<&'a str> {
    let choice = choice.trim();
    if choice.is_empty() {
        return Some(default_code);
    }
    if let Some(expert) = experts
        .iter()
        .find(|expert| expert.code.eq_ignore_ascii_case(choice))
    {
        return Some(expert.code.as_str());
    }
    choice
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| experts.iter().nth(index))
        .map(|expert| expert.code.as_str())
}

/// Runs the prompts against any reader/writer pair. The question ends at the
/// first empty line or at end of input.
pub fn read_form<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    experts: &ExpertRegistry,
    default_code: &str,
) -> io::Result<FormOutcome> {
    writeln!(output, "Choose an expert:")?;
    for (index, (code, label)) in experts.entries().enumerate() {
        let marker = if code == default_code { " (default)" } else { "" };
        writeln!(output, "  {}. {label}{marker}", index + 1)?;
    }

    let expert_code = loop {
        write!(output, "Expert [{default_code}]: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(FormOutcome::Cancelled);
        }
        match parse_choice(experts, &line, default_code) {
            Some(code) => break code.to_string(),
            None => writeln!(output, "Unknown choice '{}'.", line.trim())?,
        }
    };

    writeln!(output, "Your question (finish with an empty line):")?;
    output.flush()?;

    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            break;
        }
        lines.push(line.to_string());
    }
    let text = lines.join("\n");

    if let Err(err) = validate_input(&text) {
        writeln!(output, "⚠️  {err}")?;
        return Ok(FormOutcome::Rejected);
    }

    Ok(FormOutcome::Submitted(FormSubmission { expert_code, text }))
}

pub async fn run_form(ctx: &AppContext) -> Result<(), Box<dyn Error>> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    let outcome = read_form(
        &mut stdin.lock(),
        &mut stdout,
        &ctx.experts,
        ctx.default_expert_code(),
    )?;

    match outcome {
        FormOutcome::Submitted(submission) => {
            eprintln!("Waiting for the model...");
            let answer = ctx
                .orchestrator()
                .answer(&submission.text, &submission.expert_code)
                .await;
            println!("\n## Answer\n\n{answer}");
            Ok(())
        }
        FormOutcome::Rejected => std::process::exit(1),
        FormOutcome::Cancelled => Ok(()),
    }
}
