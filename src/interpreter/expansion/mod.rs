//! Word expansion pipeline.
//!
//! One `WordNode` becomes zero or more argv strings through:
//! brace expansion → tilde → parameter/command/arithmetic substitution →
//! field splitting on IFS → pathname expansion → quote removal.
//!
//! Fields carry a parallel *pattern* string in which characters produced
//! under quotes are backslash-protected, so splitting and globbing only
//! ever act on unquoted expansion output.

pub mod brace;
pub mod command_substitution;
pub mod parameter;
pub mod pathname;
pub mod pattern;
pub mod quoting;
pub mod tilde;
pub mod word_split;

use crate::ast::types::{WordNode, WordPart};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use parameter::ParamValue;
use quoting::escape_pattern_chars;
use word_split::split_fields;

/// One field between splitting and pathname expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Final text (quote removal already applied).
    pub text: String,
    /// Glob view: quoted characters are backslash-escaped.
    pub pattern: String,
    /// Some part of the field was quoted.
    pub quoted: bool,
}

/// Field assembly buffer.
#[derive(Default)]
pub(crate) struct FieldAcc {
    done: Vec<Field>,
    text: String,
    pattern: String,
    quoted: bool,
    started: bool,
}

impl FieldAcc {
    /// Append literal content whose glob characters stay active.
    fn push_raw(&mut self, s: &str) {
        self.text.push_str(s);
        // A backslash arriving from expansion output is data, not quoting.
        for c in s.chars() {
            if c == '\\' {
                self.pattern.push_str("\\\\");
            } else {
                self.pattern.push(c);
            }
        }
        self.started = true;
    }

    /// Append quoted content: inert for splitting and globbing.
    fn push_quoted(&mut self, s: &str) {
        self.text.push_str(s);
        self.pattern.push_str(&escape_pattern_chars(s));
        self.quoted = true;
        self.started = true;
    }

    fn break_field(&mut self) {
        if self.started {
            self.done.push(Field {
                text: std::mem::take(&mut self.text),
                pattern: std::mem::take(&mut self.pattern),
                quoted: self.quoted,
            });
            self.quoted = false;
            self.started = false;
        } else {
            self.text.clear();
            self.pattern.clear();
        }
    }

    /// Splittable expansion output.
    fn push_split(&mut self, s: &str, ifs: &str) {
        if ifs.is_empty() {
            self.push_raw(s);
            return;
        }
        let (fields, leading, trailing) = split_fields(s, ifs);
        if leading {
            self.break_field();
        }
        for (i, f) in fields.iter().enumerate() {
            if i > 0 {
                self.break_field();
            }
            self.push_raw(f);
        }
        if trailing {
            self.break_field();
        }
    }

    fn finish(mut self) -> Vec<Field> {
        self.break_field();
        self.done
    }
}

impl Interpreter {
    /// Full expansion of an argv template into argv strings.
    pub fn expand_words(&mut self, words: &[WordNode]) -> Result<Vec<String>, ExecError> {
        let mut argv = Vec::new();
        for word in words {
            for braced in brace::brace_expand_word(word) {
                for field in self.expand_word_fields(&braced)? {
                    argv.extend(self.pathname_expand(field)?);
                }
            }
        }
        Ok(argv)
    }

    /// Expand one word into split fields (no brace or pathname passes).
    pub(crate) fn expand_word_fields(&mut self, word: &WordNode) -> Result<Vec<Field>, ExecError> {
        let mut acc = FieldAcc::default();
        let ifs = self.env.ifs();
        self.expand_parts_into(&word.parts, false, &ifs, &mut acc)?;
        Ok(acc.finish())
    }

    /// Expansion with no splitting and no globbing: assignment values,
    /// case subjects, heredoc bodies, `[[ ]]` operands. `$@` joins with
    /// spaces, `$*` with the first IFS character.
    pub fn expand_word_unsplit(&mut self, word: &WordNode) -> Result<String, ExecError> {
        let mut out = String::new();
        self.expand_parts_unsplit(&word.parts, &mut out)?;
        Ok(out)
    }

    /// Expansion of a pattern word: returns the escaped-pattern form in
    /// which quoted characters match literally.
    pub(crate) fn expand_pattern_word(&mut self, word: &WordNode) -> Result<String, ExecError> {
        let mut acc = FieldAcc::default();
        // No splitting inside patterns.
        self.expand_parts_into(&word.parts, true, "", &mut acc)?;
        let fields = acc.finish();
        Ok(fields.into_iter().map(|f| f.pattern).collect::<Vec<_>>().join(""))
    }

    /// Core part walk. `in_quotes` marks double-quote context; `ifs`
    /// empty disables splitting.
    fn expand_parts_into(
        &mut self,
        parts: &[WordPart],
        in_quotes: bool,
        ifs: &str,
        acc: &mut FieldAcc,
    ) -> Result<(), ExecError> {
        for part in parts {
            match part {
                WordPart::Literal(s) => {
                    if in_quotes {
                        acc.push_quoted(s);
                    } else {
                        acc.push_raw(s);
                    }
                }
                WordPart::SingleQuoted(s) | WordPart::AnsiC(s) | WordPart::Escaped(s) => {
                    acc.push_quoted(s);
                }
                WordPart::DoubleQuoted(inner) => {
                    if inner.is_empty() {
                        acc.push_quoted("");
                    } else {
                        self.expand_parts_into(inner, true, ifs, acc)?;
                    }
                }
                WordPart::Parameter(p) => {
                    let value = self.eval_param(p, in_quotes)?;
                    self.append_param_value(value, in_quotes, ifs, acc);
                }
                WordPart::CommandSubst { body, .. } => {
                    let output = self.command_substitute(body)?;
                    if in_quotes {
                        acc.push_quoted(&output);
                    } else {
                        acc.push_split(&output, ifs);
                    }
                }
                WordPart::ArithSubst(expr) => {
                    let n = self.eval_arith(expr)?;
                    let text = n.to_string();
                    if in_quotes {
                        acc.push_quoted(&text);
                    } else {
                        acc.push_split(&text, ifs);
                    }
                }
                WordPart::ProcessSubst { body, direction } => {
                    let path = self.setup_process_substitution(body, *direction)?;
                    acc.push_quoted(&path);
                }
                WordPart::Tilde(user) => {
                    let expanded = tilde::expand_tilde(self, user.as_deref());
                    match expanded {
                        Some(path) => acc.push_quoted(&path),
                        None => {
                            // Unknown user: the tilde stays literal.
                            let mut literal = String::from("~");
                            if let Some(u) = user {
                                literal.push_str(u);
                            }
                            acc.push_raw(&literal);
                        }
                    }
                }
                WordPart::Brace(items) => {
                    // Reached only in non-brace-expanding contexts; render
                    // the group literally.
                    let text = self.render_brace_literal(items)?;
                    if in_quotes {
                        acc.push_quoted(&text);
                    } else {
                        acc.push_raw(&text);
                    }
                }
            }
        }
        Ok(())
    }

    fn append_param_value(&mut self, value: ParamValue, in_quotes: bool, ifs: &str, acc: &mut FieldAcc) {
        match value {
            ParamValue::Single(s) => {
                if in_quotes {
                    acc.push_quoted(&s);
                } else {
                    acc.push_split(&s, ifs);
                }
            }
            ParamValue::Fields { items, star, presplit } => {
                if in_quotes && star {
                    // "$*": one field, joined with the first IFS char.
                    let sep = ifs.chars().next().map(|c| c.to_string()).unwrap_or_default();
                    acc.push_quoted(&items.join(&sep));
                } else if in_quotes {
                    // "$@": one field per element, empty set vanishes.
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            acc.break_field();
                        }
                        acc.push_quoted(item);
                    }
                } else {
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            acc.break_field();
                        }
                        if presplit {
                            acc.push_raw(item);
                        } else {
                            acc.push_split(item, ifs);
                        }
                    }
                }
            }
        }
    }

    fn expand_parts_unsplit(&mut self, parts: &[WordPart], out: &mut String) -> Result<(), ExecError> {
        for part in parts {
            match part {
                WordPart::Literal(s)
                | WordPart::SingleQuoted(s)
                | WordPart::AnsiC(s)
                | WordPart::Escaped(s) => out.push_str(s),
                WordPart::DoubleQuoted(inner) => self.expand_parts_unsplit(inner, out)?,
                WordPart::Parameter(p) => match self.eval_param(p, false)? {
                    ParamValue::Single(s) => out.push_str(&s),
                    ParamValue::Fields { items, star, .. } => {
                        let sep = if star {
                            self.env.ifs().chars().next().map(|c| c.to_string()).unwrap_or_default()
                        } else {
                            " ".to_string()
                        };
                        out.push_str(&items.join(&sep));
                    }
                },
                WordPart::CommandSubst { body, .. } => {
                    out.push_str(&self.command_substitute(body)?);
                }
                WordPart::ArithSubst(expr) => {
                    out.push_str(&self.eval_arith(expr)?.to_string());
                }
                WordPart::ProcessSubst { body, direction } => {
                    out.push_str(&self.setup_process_substitution(body, *direction)?);
                }
                WordPart::Tilde(user) => match tilde::expand_tilde(self, user.as_deref()) {
                    Some(path) => out.push_str(&path),
                    None => {
                        out.push('~');
                        if let Some(u) = user {
                            out.push_str(u);
                        }
                    }
                },
                WordPart::Brace(items) => {
                    let text = self.render_brace_literal(items)?;
                    out.push_str(&text);
                }
            }
        }
        Ok(())
    }
}
