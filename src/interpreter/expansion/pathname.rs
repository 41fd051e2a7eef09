//! Pathname (glob) expansion.
//!
//! Walks the filesystem component by component. A leading `.` is only
//! matched when the pattern component starts with a literal dot (or
//! dotglob is set); `.` and `..` are never produced by a glob. Results
//! sort lexicographically; a pattern with no matches survives literally
//! unless nullglob is set.

use std::fs;

use crate::interpreter::errors::ExecError;
use crate::interpreter::expansion::pattern::{has_glob_chars, pattern_to_regex, unescape_pattern};
use crate::interpreter::expansion::Field;
use crate::interpreter::interpreter::Interpreter;

impl Interpreter {
    pub(crate) fn pathname_expand(&mut self, field: Field) -> Result<Vec<String>, ExecError> {
        if self.env.options.noglob || !has_glob_chars(&field.pattern) {
            return Ok(vec![field.text]);
        }
        let dotglob = self.env.options.dotglob;
        let mut matches = glob_pattern(&field.pattern, dotglob);
        if matches.is_empty() {
            if self.env.options.nullglob {
                return Ok(Vec::new());
            }
            return Ok(vec![field.text]);
        }
        matches.sort();
        Ok(matches)
    }
}

/// Expand an escaped-form pattern against the filesystem.
pub fn glob_pattern(pattern: &str, dotglob: bool) -> Vec<String> {
    let (root, components) = split_components(pattern);
    let mut results = Vec::new();
    let start = if root.is_empty() { String::new() } else { root.clone() };
    walk(&start, &components, dotglob, &mut results);
    results
}

/// Split on unescaped `/`. Returns the root prefix ("/" for absolute
/// paths, "" otherwise) and the component patterns.
fn split_components(pattern: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = pattern.chars().collect();
    let mut components = Vec::new();
    let mut current = String::new();
    let mut root = String::new();
    let mut i = 0usize;
    if chars.first() == Some(&'/') {
        root.push('/');
        while i < chars.len() && chars[i] == '/' {
            i += 1;
        }
    }
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                current.push('\\');
                current.push(chars[i + 1]);
                i += 2;
            }
            '/' => {
                if !current.is_empty() {
                    components.push(std::mem::take(&mut current));
                }
                while i < chars.len() && chars[i] == '/' {
                    i += 1;
                }
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }
    if !current.is_empty() {
        components.push(current);
    }
    (root, components)
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

fn walk(base: &str, components: &[String], dotglob: bool, results: &mut Vec<String>) {
    let (component, rest) = match components.split_first() {
        Some(pair) => pair,
        None => return,
    };
    let last = rest.is_empty();

    if !has_glob_chars(component) {
        // Literal component: no directory read, just existence.
        let name = unescape_pattern(component);
        let path = join_path(base, &name);
        let fs_path = if path.is_empty() { ".".to_string() } else { path.clone() };
        if last {
            if fs::symlink_metadata(&fs_path).is_ok() {
                results.push(path);
            }
        } else {
            walk(&path, rest, dotglob, results);
        }
        return;
    }

    let regex = match pattern_to_regex(component, false) {
        Some(r) => r,
        None => return,
    };
    let hidden_ok = dotglob || component.starts_with('.') || component.starts_with("\\.");

    let read_base = if base.is_empty() { "." } else { base };
    let entries = match fs::read_dir(read_base) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && !hidden_ok {
            continue;
        }
        if name == "." || name == ".." {
            continue;
        }
        if !regex.is_match(&name) {
            continue;
        }
        let path = join_path(base, &name);
        if last {
            results.push(path);
        } else if entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
            || fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false)
        {
            walk(&path, rest, dotglob, results);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["alpha.txt", "beta.txt", "gamma.rs", ".hidden"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/inner.txt")).unwrap();
        dir
    }

    fn glob_in(dir: &tempfile::TempDir, pattern: &str) -> Vec<String> {
        let full = format!("{}/{}", dir.path().display(), pattern);
        let prefix = format!("{}/", dir.path().display());
        let mut out: Vec<String> = glob_pattern(&full, false)
            .into_iter()
            .map(|p| p.trim_start_matches(&prefix).to_string())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_star_suffix() {
        let dir = setup();
        assert_eq!(glob_in(&dir, "*.txt"), vec!["alpha.txt", "beta.txt"]);
    }

    #[test]
    fn test_question_mark() {
        let dir = setup();
        assert_eq!(glob_in(&dir, "?eta.txt"), vec!["beta.txt"]);
    }

    #[test]
    fn test_hidden_requires_dot() {
        let dir = setup();
        assert_eq!(glob_in(&dir, "*hidden"), Vec::<String>::new());
        assert_eq!(glob_in(&dir, ".h*"), vec![".hidden"]);
    }

    #[test]
    fn test_directory_descent() {
        let dir = setup();
        assert_eq!(glob_in(&dir, "*/*.txt"), vec!["sub/inner.txt"]);
    }

    #[test]
    fn test_no_match_empty() {
        let dir = setup();
        assert_eq!(glob_in(&dir, "*.zip"), Vec::<String>::new());
    }
}
