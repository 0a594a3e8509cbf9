//! Non-interactive `ask` command

use std::error::Error;
use std::fmt;
use std::io::{self, Read};

use crate::cli::AppContext;
use crate::core::expert::ExpertRegistry;

#[derive(Debug, PartialEq, Eq)]
pub enum InputError {
    Empty,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Empty => write!(f, "Please enter some text."),
        }
    }
}

impl Error for InputError {}

/// Rejects input that is empty once surrounding whitespace is ignored. The
/// text itself is passed on untouched.
pub fn validate_input(text: &str) -> Result<&str, InputError> {
    if text.trim().is_empty() {
        Err(InputError::Empty)
    } else {
        Ok(text)
    }
}

/// Picks the expert code to send, warning on stderr when `requested` is not
/// a known code (the pipeline then falls back to the default expert).
pub fn choose_expert_code(
    experts: &ExpertRegistry,
    requested: Option<&str>,
    default_code: &str,
) -> String {
    match requested.map(str::trim) {
        Some(code) if !code.is_empty() => {
            if experts.find(code).is_none() {
                eprintln!(
                    "⚠️  Unknown expert '{code}'; using {}. Run 'expert-mode experts' to list experts.",
                    experts.default_expert().code
                );
            }
            code.to_string()
        }
        _ => default_code.to_string(),
    }
}

pub async fn run_ask(
    ctx: &AppContext,
    expert: Option<String>,
    text: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let text = if text.is_empty() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        text.join(" ")
    };

    let text = match validate_input(&text) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("⚠️  {err}");
            eprintln!("Usage: expert-mode ask [-e CODE] <text>");
            std::process::exit(1);
        }
    };

    let code = choose_expert_code(&ctx.experts, expert.as_deref(), ctx.default_expert_code());
    let answer = ctx.orchestrator().answer(text, &code).await;
    println!("{answer}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_is_rejected() {
        for text in ["", " ", "\n\t  \r\n"] {
            assert_eq!(validate_input(text), Err(InputError::Empty), "{text:?}");
        }
    }

    #[test]
    fn non_blank_input_is_passed_through_unchanged() {
        assert_eq!(validate_input("  hi \n"), Ok("  hi \n"));
        assert_eq!(validate_input("?"), Ok("?"));
    }

    #[test]
    fn expert_code_selection() {
        let experts = ExpertRegistry::builtin();
        assert_eq!(choose_expert_code(&experts, None, "B"), "B");
        assert_eq!(choose_expert_code(&experts, Some("  "), "B"), "B");
        assert_eq!(choose_expert_code(&experts, Some(" A "), "B"), "A");
        assert_eq!(choose_expert_code(&experts, Some("Z"), "B"), "Z");
    }
}
