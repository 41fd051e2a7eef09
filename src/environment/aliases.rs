//! Alias tables: command aliases (expanded during lexing at command
//! position) and suffix aliases (resolved by the executor from the
//! extension of an unmatched command word).

use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: IndexMap<String, String>,
    /// extension → command prefix, e.g. "py" → "python3".
    suffixes: IndexMap<String, String>,
}

impl AliasTable {
    pub fn define(&mut self, name: &str, replacement: &str) {
        self.aliases.insert(name.to_string(), replacement.to_string());
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.aliases.shift_remove(name).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(|s| s.as_str())
    }

    pub fn clear(&mut self) {
        self.aliases.clear();
    }

    /// Insertion-ordered listing for the `alias` builtin.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn define_suffix(&mut self, ext: &str, command: &str) {
        self.suffixes.insert(ext.to_string(), command.to_string());
    }

    pub fn remove_suffix(&mut self, ext: &str) -> bool {
        self.suffixes.shift_remove(ext).is_some()
    }

    /// Suffix lookup by the extension of `word` (text after the last dot).
    pub fn lookup_suffix(&self, word: &str) -> Option<&str> {
        let ext = word.rsplit_once('.')?.1;
        if ext.is_empty() {
            return None;
        }
        self.suffixes.get(ext).map(|s| s.as_str())
    }

    pub fn iter_suffixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.suffixes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear_suffixes(&mut self) {
        self.suffixes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_lookup_remove() {
        let mut t = AliasTable::default();
        t.define("ll", "ls -l");
        assert_eq!(t.lookup("ll"), Some("ls -l"));
        assert!(t.remove("ll"));
        assert!(t.lookup("ll").is_none());
        assert!(!t.remove("ll"));
    }

    #[test]
    fn test_suffix_lookup() {
        let mut t = AliasTable::default();
        t.define_suffix("py", "python3");
        assert_eq!(t.lookup_suffix("script.py"), Some("python3"));
        assert_eq!(t.lookup_suffix("script.sh"), None);
        assert_eq!(t.lookup_suffix("noext"), None);
        assert_eq!(t.lookup_suffix("trailing."), None);
    }
}
