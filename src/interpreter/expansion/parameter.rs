//! Parameter expansion evaluation.
//!
//! Resolves `${NAME...}` forms against the environment: subscripts,
//! indirection, the conditional operators, substrings, pattern
//! operations, case conversion, transforms and name/key listings.

use crate::ast::types::{
    CaseConvertKind, ParamExpPart, ParamOp, ParamSubscript, PatternAnchor, WordNode,
};
use crate::environment::value::Value;
use crate::interpreter::errors::ExecError;
use crate::interpreter::expansion::pattern::{
    pattern_matches, remove_prefix, remove_suffix, replace_pattern,
};
use crate::interpreter::expansion::quoting::shell_quote;
use crate::interpreter::interpreter::Interpreter;
use crate::parser::types::is_valid_name;
use crate::parser::word_parser::{parse_word, resolve_ansi_c};

/// What an expansion contributes to the word: one string, or a list of
/// fields (`$@`, `${arr[@]}`, `${!prefix@}`). `star` selects `$*`-style
/// joining inside quotes; `presplit` marks fields that already went
/// through quote-aware splitting (conditional-operator words).
#[derive(Debug, Clone)]
pub(crate) enum ParamValue {
    Single(String),
    Fields { items: Vec<String>, star: bool, presplit: bool },
}

/// Resolved state of the parameter before the operator applies.
#[derive(Debug, Clone)]
enum Subject {
    Unset,
    Scalar(String),
    Fields { items: Vec<String>, star: bool },
}

impl Subject {
    fn is_null(&self) -> bool {
        match self {
            Subject::Unset => true,
            Subject::Scalar(s) => s.is_empty(),
            Subject::Fields { items, .. } => items.is_empty(),
        }
    }

    fn is_unset(&self) -> bool {
        matches!(self, Subject::Unset)
    }
}

impl Interpreter {
    pub(crate) fn eval_param(
        &mut self,
        p: &ParamExpPart,
        in_quotes: bool,
    ) -> Result<ParamValue, ExecError> {
        // ${!name} indirection: the value names the real parameter.
        if p.indirect {
            return self.eval_indirect(p, in_quotes);
        }

        match &p.op {
            Some(ParamOp::Names { star }) => {
                let items = self.env.names_with_prefix(&p.name);
                return Ok(ParamValue::Fields { items, star: *star, presplit: false });
            }
            Some(ParamOp::Keys { star }) => {
                let items = match self.env.value_of(&p.name) {
                    Some(v) => v.keys(),
                    None => Vec::new(),
                };
                return Ok(ParamValue::Fields { items, star: *star, presplit: false });
            }
            _ => {}
        }

        let subject = self.resolve_subject(p)?;

        // nounset applies unless a conditional operator handles the unset
        // case; `$@`/`$*`/array[@] views are exempt.
        let conditional = matches!(
            p.op,
            Some(ParamOp::Default { .. })
                | Some(ParamOp::Assign { .. })
                | Some(ParamOp::Error { .. })
                | Some(ParamOp::Alternative { .. })
        );
        if subject.is_unset()
            && !conditional
            && self.env.options.nounset
            && !matches!(subject, Subject::Fields { .. })
            && p.name != "@"
            && p.name != "*"
        {
            return Err(ExecError::Unbound(display_name(p)));
        }

        match &p.op {
            None => Ok(subject_to_value(subject)),
            Some(op) => self.apply_op(p, subject, op, in_quotes),
        }
    }

    fn eval_indirect(&mut self, p: &ParamExpPart, in_quotes: bool) -> Result<ParamValue, ExecError> {
        let inner = ParamExpPart {
            name: p.name.clone(),
            subscript: p.subscript.clone(),
            indirect: false,
            op: None,
        };
        let target = match self.eval_param(&inner, false)? {
            ParamValue::Single(s) => s,
            ParamValue::Fields { items, .. } => items.join(" "),
        };
        if target.is_empty() {
            let subject = Subject::Unset;
            return match &p.op {
                None if self.env.options.nounset => Err(ExecError::Unbound(display_name(p))),
                None => Ok(subject_to_value(subject)),
                Some(op) => self.apply_op(p, subject, op, in_quotes),
            };
        }
        let reparsed = crate::parser::expansion_parser::parse_param_inner(&target, 0)
            .map_err(|_| ExecError::BadSubstitution(target.clone()))?;
        if reparsed.indirect || reparsed.op.is_some() {
            return Err(ExecError::BadSubstitution(target));
        }
        let resolved = ParamExpPart {
            name: reparsed.name,
            subscript: reparsed.subscript,
            indirect: false,
            op: p.op.clone(),
        };
        self.eval_param(&resolved, in_quotes)
    }

    fn resolve_subject(&mut self, p: &ParamExpPart) -> Result<Subject, ExecError> {
        // Whole-of-positional views.
        if p.name == "@" || p.name == "*" {
            return Ok(Subject::Fields {
                items: self.env.positional_params().to_vec(),
                star: p.name == "*",
            });
        }

        match &p.subscript {
            None => Ok(match self.env.value_of(&p.name) {
                Some(v) => Subject::Scalar(v.to_scalar()),
                None => Subject::Unset,
            }),
            Some(ParamSubscript::At) | Some(ParamSubscript::Star) => {
                let star = matches!(p.subscript, Some(ParamSubscript::Star));
                Ok(match self.env.value_of(&p.name) {
                    Some(v) => Subject::Fields { items: v.elements(), star },
                    None => Subject::Fields { items: Vec::new(), star },
                })
            }
            Some(ParamSubscript::Index(raw)) => self.resolve_element(&p.name, raw),
        }
    }

    fn resolve_element(&mut self, name: &str, raw: &str) -> Result<Subject, ExecError> {
        match self.env.value_of(name) {
            Some(Value::Assoc(map)) => {
                let key = self.expand_subscript_key(raw)?;
                Ok(match map.get(&key) {
                    Some(v) => Subject::Scalar(v.clone()),
                    None => Subject::Unset,
                })
            }
            Some(Value::Indexed(map)) => {
                let mut idx = self.eval_subscript_index(raw)?;
                if idx < 0 {
                    let max = map.keys().next_back().copied().unwrap_or(-1);
                    idx += max + 1;
                }
                Ok(match map.get(&idx) {
                    Some(v) => Subject::Scalar(v.clone()),
                    None => Subject::Unset,
                })
            }
            Some(Value::Scalar(s)) => {
                let idx = self.eval_subscript_index(raw)?;
                Ok(if idx == 0 { Subject::Scalar(s) } else { Subject::Unset })
            }
            None => Ok(Subject::Unset),
        }
    }

    /// Associative subscripts expand as words.
    pub(crate) fn expand_subscript_key(&mut self, raw: &str) -> Result<String, ExecError> {
        let word = parse_word(raw, 0, false).map_err(|_| ExecError::BadSubstitution(raw.to_string()))?;
        self.expand_word_unsplit(&word)
    }

    /// Indexed subscripts are arithmetic.
    pub(crate) fn eval_subscript_index(&mut self, raw: &str) -> Result<i64, ExecError> {
        let node = crate::parser::arithmetic_parser::parse_arith(raw, 0)
            .map_err(|e| ExecError::Arith(e.message))?;
        self.eval_arith(&node)
    }

    fn apply_op(
        &mut self,
        p: &ParamExpPart,
        subject: Subject,
        op: &ParamOp,
        in_quotes: bool,
    ) -> Result<ParamValue, ExecError> {
        match op {
            ParamOp::Default { word, colon } => {
                let trigger = if *colon { subject.is_null() } else { subject.is_unset() };
                if trigger {
                    self.expand_op_word(word, in_quotes)
                } else {
                    Ok(subject_to_value(subject))
                }
            }
            ParamOp::Assign { word, colon } => {
                let trigger = if *colon { subject.is_null() } else { subject.is_unset() };
                if !trigger {
                    return Ok(subject_to_value(subject));
                }
                if !is_valid_name(&p.name) {
                    return Err(ExecError::Expansion(format!(
                        "{}: cannot assign in this way",
                        display_name(p)
                    )));
                }
                let text = self.expand_word_unsplit(word)?;
                match &p.subscript {
                    None => self.env.set_scalar(&p.name, text.clone())?,
                    Some(ParamSubscript::Index(raw)) => {
                        let key = self.expand_subscript_key(raw)?;
                        let idx = self.eval_subscript_index(raw).unwrap_or(0);
                        self.env.set_element(&p.name, &key, idx, &text)?;
                    }
                    _ => {
                        return Err(ExecError::Expansion(format!(
                            "{}: cannot assign in this way",
                            display_name(p)
                        )))
                    }
                }
                Ok(ParamValue::Single(text))
            }
            ParamOp::Error { word, colon } => {
                let trigger = if *colon { subject.is_null() } else { subject.is_unset() };
                if !trigger {
                    return Ok(subject_to_value(subject));
                }
                let message = match word {
                    Some(w) => self.expand_word_unsplit(w)?,
                    None => "parameter null or not set".to_string(),
                };
                Err(ExecError::ParamError(format!("{}: {}", display_name(p), message)))
            }
            ParamOp::Alternative { word, colon } => {
                let use_alt = if *colon { !subject.is_null() } else { !subject.is_unset() };
                if use_alt {
                    self.expand_op_word(word, in_quotes)
                } else {
                    Ok(ParamValue::Single(String::new()))
                }
            }
            ParamOp::Length => Ok(ParamValue::Single(match subject {
                Subject::Unset => "0".to_string(),
                Subject::Scalar(s) => s.chars().count().to_string(),
                Subject::Fields { items, .. } => items.len().to_string(),
            })),
            ParamOp::Substring { offset, length } => {
                self.apply_substring(p, subject, offset, length.as_ref())
            }
            ParamOp::RemovePattern { pattern, from_end, greedy } => {
                let pat = self.expand_pattern_word(pattern)?;
                let f = |s: &str| {
                    if *from_end {
                        remove_suffix(s, &pat, *greedy)
                    } else {
                        remove_prefix(s, &pat, *greedy)
                    }
                };
                Ok(map_subject(subject, f))
            }
            ParamOp::ReplacePattern { pattern, replacement, all, anchor } => {
                let pat = self.expand_pattern_word(pattern)?;
                let rep = match replacement {
                    Some(w) => self.expand_word_unsplit(w)?,
                    None => String::new(),
                };
                let f = |s: &str| {
                    replace_pattern(
                        s,
                        &pat,
                        &rep,
                        *all,
                        *anchor == Some(PatternAnchor::Start),
                        *anchor == Some(PatternAnchor::End),
                    )
                };
                Ok(map_subject(subject, f))
            }
            ParamOp::CaseConvert { kind, all, pattern } => {
                let pat = match pattern {
                    Some(w) => Some(self.expand_pattern_word(w)?),
                    None => None,
                };
                let f = |s: &str| case_convert(s, *kind, *all, pat.as_deref());
                Ok(map_subject(subject, f))
            }
            ParamOp::Transform(c) => self.apply_transform(p, subject, *c),
            // Handled before subject resolution.
            ParamOp::Names { .. } | ParamOp::Keys { .. } => unreachable!(),
        }
    }

    fn expand_op_word(&mut self, word: &WordNode, in_quotes: bool) -> Result<ParamValue, ExecError> {
        if in_quotes {
            Ok(ParamValue::Single(self.expand_word_unsplit(word)?))
        } else {
            let items = self
                .expand_word_fields(word)?
                .into_iter()
                .map(|f| f.text)
                .collect();
            Ok(ParamValue::Fields { items, star: false, presplit: true })
        }
    }

    fn apply_substring(
        &mut self,
        p: &ParamExpPart,
        subject: Subject,
        offset: &crate::ast::types::ArithExprNode,
        length: Option<&crate::ast::types::ArithExprNode>,
    ) -> Result<ParamValue, ExecError> {
        let off = self.eval_arith(offset)?;
        let len = match length {
            Some(l) => Some(self.eval_arith(l)?),
            None => None,
        };
        match subject {
            Subject::Fields { items, star } => {
                // For $@/$* the list is indexed from $0.
                let positional_view = p.name == "@" || p.name == "*";
                let mut list = items;
                if positional_view {
                    list.insert(0, self.env.arg0.clone());
                }
                let n = list.len() as i64;
                let start = if off < 0 { (n + off).max(0) } else { off.min(n) };
                let end = match len {
                    None => n,
                    Some(l) if l < 0 => {
                        return Err(ExecError::Expansion(format!("{}: substring expression < 0", l)))
                    }
                    Some(l) => (start + l).min(n),
                };
                let slice = list[start as usize..end.max(start) as usize].to_vec();
                Ok(ParamValue::Fields { items: slice, star, presplit: false })
            }
            Subject::Scalar(s) => {
                let chars: Vec<char> = s.chars().collect();
                let n = chars.len() as i64;
                let start = if off < 0 { n + off } else { off };
                if start < 0 || start > n {
                    return Ok(ParamValue::Single(String::new()));
                }
                let end = match len {
                    None => n,
                    Some(l) if l < 0 => {
                        let e = n + l;
                        if e < start {
                            return Err(ExecError::Expansion(format!(
                                "{}: substring expression < 0",
                                l
                            )));
                        }
                        e
                    }
                    Some(l) => (start + l).min(n),
                };
                Ok(ParamValue::Single(chars[start as usize..end as usize].iter().collect()))
            }
            Subject::Unset => Ok(ParamValue::Single(String::new())),
        }
    }

    fn apply_transform(
        &mut self,
        p: &ParamExpPart,
        subject: Subject,
        op: char,
    ) -> Result<ParamValue, ExecError> {
        match op {
            'Q' => Ok(map_subject(subject, |s| shell_quote(s))),
            'E' => Ok(map_subject(subject, resolve_ansi_c)),
            'P' => Ok(subject_to_value(subject)),
            'U' => Ok(map_subject(subject, |s| s.to_uppercase())),
            'L' => Ok(map_subject(subject, |s| s.to_lowercase())),
            'u' => Ok(map_subject(subject, |s| {
                let mut chars = s.chars();
                match chars.next() {
                    Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })),
            'A' => {
                let value = self.env.value_of(&p.name);
                Ok(ParamValue::Single(assignment_form(&p.name, value.as_ref())))
            }
            'a' => {
                let attrs = self.env.attrs_of(&p.name);
                let value = self.env.value_of(&p.name);
                let flags = attrs.flag_string(value.as_ref());
                Ok(ParamValue::Single(flags.trim_start_matches('-').replace('-', "")))
            }
            'K' | 'k' => {
                let value = self.env.value_of(&p.name);
                Ok(ParamValue::Single(match value {
                    Some(v) if v.is_array() => v
                        .keys()
                        .iter()
                        .zip(v.elements())
                        .map(|(k, e)| format!("{} {}", k, shell_quote(&e)))
                        .collect::<Vec<_>>()
                        .join(" "),
                    Some(v) => shell_quote(&v.to_scalar()),
                    None => String::new(),
                }))
            }
            _ => Err(ExecError::BadSubstitution(format!("${{{}@{}}}", p.name, op))),
        }
    }
}

fn subject_to_value(subject: Subject) -> ParamValue {
    match subject {
        Subject::Unset => ParamValue::Single(String::new()),
        Subject::Scalar(s) => ParamValue::Single(s),
        Subject::Fields { items, star } => ParamValue::Fields { items, star, presplit: false },
    }
}

fn map_subject(subject: Subject, f: impl Fn(&str) -> String) -> ParamValue {
    match subject {
        Subject::Unset => ParamValue::Single(f("")),
        Subject::Scalar(s) => ParamValue::Single(f(&s)),
        Subject::Fields { items, star } => ParamValue::Fields {
            items: items.iter().map(|s| f(s)).collect(),
            star,
            presplit: false,
        },
    }
}

fn display_name(p: &ParamExpPart) -> String {
    match &p.subscript {
        Some(ParamSubscript::At) => format!("{}[@]", p.name),
        Some(ParamSubscript::Star) => format!("{}[*]", p.name),
        Some(ParamSubscript::Index(i)) => format!("{}[{}]", p.name, i),
        None => p.name.clone(),
    }
}

fn case_convert(s: &str, kind: CaseConvertKind, all: bool, pattern: Option<&str>) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        let eligible = (all || i == 0)
            && pattern.map_or(true, |p| pattern_matches(p, &c.to_string(), false));
        if eligible {
            match kind {
                CaseConvertKind::Upper => out.extend(c.to_uppercase()),
                CaseConvertKind::Lower => out.extend(c.to_lowercase()),
                CaseConvertKind::Toggle => {
                    if c.is_uppercase() {
                        out.extend(c.to_lowercase())
                    } else {
                        out.extend(c.to_uppercase())
                    }
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn assignment_form(name: &str, value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Scalar(s)) => format!("{}={}", name, shell_quote(s)),
        Some(Value::Indexed(map)) => {
            let body = map
                .iter()
                .map(|(k, v)| format!("[{}]={}", k, shell_quote(v)))
                .collect::<Vec<_>>()
                .join(" ");
            format!("declare -a {}=({})", name, body)
        }
        Some(Value::Assoc(map)) => {
            let body = map
                .iter()
                .map(|(k, v)| format!("[{}]={}", shell_quote(k), shell_quote(v)))
                .collect::<Vec<_>>()
                .join(" ");
            format!("declare -A {}=({})", name, body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_convert() {
        assert_eq!(case_convert("hello", CaseConvertKind::Upper, false, None), "Hello");
        assert_eq!(case_convert("hello", CaseConvertKind::Upper, true, None), "HELLO");
        assert_eq!(case_convert("HeLLo", CaseConvertKind::Toggle, true, None), "hEllO");
        assert_eq!(
            case_convert("hello", CaseConvertKind::Upper, true, Some("l")),
            "heLLo"
        );
    }
}
