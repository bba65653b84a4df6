//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Atlas CLI.

use crate::types::{AgentOutcome, AgentResult, ResponseStatus};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Atlas banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                r#"
   {}
   {}
   {}
"#,
                "  __ _ | |_ | | __ _  ___ ".bright_cyan().bold(),
                " / _` ||  _|| |/ _` |(_-< ".cyan().bold(),
                " \\__,_| \\__||_|\\__,_|/__/ ".blue().bold(),
            );
            println!(
                "   {} {}\n",
                "Business Automation Orchestrator".bright_white().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!(
                r#"
   __ _ | |_ | | __ _  ___
  / _` ||  _|| |/ _` |(_-<
  \__,_| \__||_|\__,_|/__/

   Business Automation Orchestrator v{}
"#,
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print the overall status of an aggregated response
    pub fn status(&self, status: ResponseStatus) {
        let label = status.to_string().to_uppercase();
        if self.colored {
            let styled = match status {
                ResponseStatus::Succeeded => label.green().bold().to_string(),
                ResponseStatus::Degraded => label.yellow().bold().to_string(),
                ResponseStatus::Partial => label.red().bold().to_string(),
            };
            println!("\n  {} {}", "Status:".bright_white().bold(), styled);
        } else {
            println!("\n  Status: {}", label);
        }
    }

    /// Print one agent's result as a single line
    pub fn agent_result(&self, result: &AgentResult) {
        let detail = match &result.outcome {
            AgentOutcome::Succeeded { .. } => String::new(),
            AgentOutcome::Degraded { error, reason, .. } => format!("fallback ({}): {}", error, reason),
            AgentOutcome::Failed { error, reason, .. } => format!("{}: {}", error, reason),
        };
        let timing = format!("{}ms, {} attempt(s)", result.latency_ms, result.attempts);

        if self.colored {
            let marker = match result.outcome {
                AgentOutcome::Succeeded { .. } => "✓".green().bold().to_string(),
                AgentOutcome::Degraded { .. } => "◐".yellow().bold().to_string(),
                AgentOutcome::Failed { .. } => "✗".red().bold().to_string(),
            };
            println!(
                "    {} {:<24} {} {}",
                marker,
                result.agent.bright_white(),
                timing.dimmed(),
                detail.yellow()
            );
        } else {
            let marker = match result.outcome {
                AgentOutcome::Succeeded { .. } => "[OK]  ",
                AgentOutcome::Degraded { .. } => "[DEGR]",
                AgentOutcome::Failed { .. } => "[FAIL]",
            };
            println!("    {} {:<24} {} {}", marker, result.agent, timing, detail);
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header: String = columns
            .iter()
            .map(|c| format!("{:<24}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 25).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 25));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        let row: String = values
            .iter()
            .map(|v| format!("{:<24}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("    {}", row);
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}
