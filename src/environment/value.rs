//! Shell values and variable attributes.

use std::collections::BTreeMap;

use indexmap::IndexMap;

/// A variable's value: scalar, sparse indexed array (iterated in index
/// order), or associative array (iterated in insertion order).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    Indexed(BTreeMap<i64, String>),
    Assoc(IndexMap<String, String>),
}

impl Value {
    pub fn scalar(s: impl Into<String>) -> Self {
        Value::Scalar(s.into())
    }

    pub fn indexed_from(items: Vec<String>) -> Self {
        Value::Indexed(items.into_iter().enumerate().map(|(i, v)| (i as i64, v)).collect())
    }

    /// Referencing an array without a subscript yields element 0 (indexed)
    /// or the empty string; scalars are themselves.
    pub fn to_scalar(&self) -> String {
        match self {
            Value::Scalar(s) => s.clone(),
            Value::Indexed(map) => map.get(&0).cloned().unwrap_or_default(),
            Value::Assoc(map) => map.get("0").cloned().unwrap_or_default(),
        }
    }

    /// All elements in iteration order.
    pub fn elements(&self) -> Vec<String> {
        match self {
            Value::Scalar(s) => vec![s.clone()],
            Value::Indexed(map) => map.values().cloned().collect(),
            Value::Assoc(map) => map.values().cloned().collect(),
        }
    }

    /// Keys in iteration order (indices or map keys; `0` for a scalar).
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Scalar(_) => vec!["0".to_string()],
            Value::Indexed(map) => map.keys().map(|k| k.to_string()).collect(),
            Value::Assoc(map) => map.keys().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Indexed(map) => map.len(),
            Value::Assoc(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_array(&self) -> bool {
        !matches!(self, Value::Scalar(_))
    }
}

/// Per-binding attributes (`declare -x -r -i -l -u`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attributes {
    pub exported: bool,
    pub readonly: bool,
    pub integer: bool,
    pub lower: bool,
    pub upper: bool,
}

impl Attributes {
    /// Flag string the way `declare -p` prints it (`-irx`, or `--`).
    pub fn flag_string(&self, value: Option<&Value>) -> String {
        let mut flags = String::new();
        match value {
            Some(Value::Indexed(_)) => flags.push('a'),
            Some(Value::Assoc(_)) => flags.push('A'),
            _ => {}
        }
        if self.integer {
            flags.push('i');
        }
        if self.lower {
            flags.push('l');
        }
        if self.upper {
            flags.push('u');
        }
        if self.readonly {
            flags.push('r');
        }
        if self.exported {
            flags.push('x');
        }
        if flags.is_empty() {
            flags.push('-');
        }
        format!("-{}", flags)
    }
}

/// One variable binding. `value: None` means declared but unset
/// (`declare -i x`, `local x`).
#[derive(Debug, Clone, Default)]
pub struct Binding {
    pub value: Option<Value>,
    pub attrs: Attributes,
}

/// ASCII case transform applied on store for `declare -l` / `-u`.
pub fn apply_case_attrs(attrs: Attributes, value: Value) -> Value {
    if !attrs.lower && !attrs.upper {
        return value;
    }
    let transform = |s: String| {
        if attrs.lower {
            s.to_lowercase()
        } else {
            s.to_uppercase()
        }
    };
    match value {
        Value::Scalar(s) => Value::Scalar(transform(s)),
        Value::Indexed(map) => {
            Value::Indexed(map.into_iter().map(|(k, v)| (k, transform(v))).collect())
        }
        Value::Assoc(map) => {
            Value::Assoc(map.into_iter().map(|(k, v)| (k, transform(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coercion() {
        let v = Value::indexed_from(vec!["a".into(), "b".into()]);
        assert_eq!(v.to_scalar(), "a");
        assert_eq!(Value::scalar("x").to_scalar(), "x");
    }

    #[test]
    fn test_sparse_index_order() {
        let mut map = BTreeMap::new();
        map.insert(5, "five".to_string());
        map.insert(1, "one".to_string());
        let v = Value::Indexed(map);
        assert_eq!(v.elements(), vec!["one", "five"]);
        assert_eq!(v.keys(), vec!["1", "5"]);
    }

    #[test]
    fn test_case_attrs() {
        let attrs = Attributes { upper: true, ..Default::default() };
        assert_eq!(
            apply_case_attrs(attrs, Value::scalar("hello")),
            Value::scalar("HELLO")
        );
    }

    #[test]
    fn test_flag_string() {
        let attrs = Attributes { readonly: true, exported: true, ..Default::default() };
        assert_eq!(attrs.flag_string(None), "-rx");
        assert_eq!(Attributes::default().flag_string(None), "--");
    }
}
