//! Command output
//!
//! Every command writes through an [`OutputFormatter`] picked from the
//! global `--json` flag. In human mode progress lines and results go to
//! stdout and problems to stderr. In JSON mode stdout carries exactly one
//! document per command (see [`OutputFormatter::print_json`]), so it can be
//! piped into `jq`; errors and warnings are single-line JSON objects on
//! stderr.

/// Output mode of a `pushglob` invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Sink for everything a command reports to the user
pub trait OutputFormatter {
    /// A completed step ("3 files queued for transfer")
    fn success(&self, message: &str);
    /// A failure the user has to act on
    fn error(&self, message: &str);
    /// Something worth noticing that did not stop the command
    fn warn(&self, message: &str);
    /// Detail lines: plan counts, job listings, endpoint probes
    fn info(&self, message: &str);
    /// The command's machine-readable result; ignored in human mode
    fn print_json(&self, value: &serde_json::Value);
}

/// Terminal output with check marks and indented detail lines
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// `--json` output
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, _message: &str) {}
    fn error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

/// `"1 file"`, `"3 files"`
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
