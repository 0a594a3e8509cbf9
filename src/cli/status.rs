//! `experts` and `status` output.

use std::fmt::Write;

use crate::cli::AppContext;
use crate::core::config::path_display;
use crate::core::credentials::{Credential, API_KEY_ENV};
use crate::core::expert::ExpertRegistry;

pub fn format_experts(experts: &ExpertRegistry, default_code: &str) -> String {
    let mut out = String::from("Available experts:\n");
    for (code, label) in experts.entries() {
        let marker = if code == default_code { " (default)" } else { "" };
        let _ = writeln!(out, "  {code:<4} {label}{marker}");
    }
    out
}

/// One line per fact. Never prints the key itself.
pub fn format_credential(credential: &Credential) -> String {
    let detected = if credential.is_present() { "yes" } else { "no" };
    format!(
        "{API_KEY_ENV} detected: {detected} (source: {})",
        credential.source
    )
}

pub fn format_status(ctx: &AppContext) -> String {
    let resolver = ctx.credential_resolver();
    let credential = resolver.resolve();

    let mut out = String::new();
    let _ = writeln!(out, "{}", format_credential(&credential));
    let _ = writeln!(out, "Secret store: {}", resolver.store().describe());
    let _ = writeln!(out, "Config file: {}", path_display(&ctx.config_path));
    let _ = writeln!(out, "Model: {}", ctx.config.model());
    let _ = writeln!(out, "Temperature: {}", ctx.config.temperature());
    let _ = writeln!(out, "Base URL: {}", ctx.config.base_url());
    out
}
