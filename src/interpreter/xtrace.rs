//! `set -x` tracing.

use crate::interpreter::expansion::quoting::shell_quote;
use crate::interpreter::interpreter::Interpreter;

impl Interpreter {
    /// Write the PS4-prefixed, post-expansion argv to stderr.
    pub(crate) fn print_xtrace(&mut self, argv: &[String]) {
        let ps4 = self.env.get_scalar("PS4").unwrap_or_else(|| "+ ".to_string());
        let words: Vec<String> = argv.iter().map(|a| quote_for_trace(a)).collect();
        eprintln!("{}{}", ps4, words.join(" "));
    }

    pub(crate) fn print_xtrace_assignment(&mut self, name: &str, value: &str) {
        let ps4 = self.env.get_scalar("PS4").unwrap_or_else(|| "+ ".to_string());
        eprintln!("{}{}={}", ps4, name, quote_for_trace(value));
    }
}

fn quote_for_trace(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || "'\"\\$`<>|&;()*?[]".contains(c)) {
        shell_quote(s)
    } else {
        s.to_string()
    }
}
