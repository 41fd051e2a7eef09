//! Function table: name → parsed body plus source text for `declare -f`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::types::FunctionDefNode;

#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, Rc<FunctionDefNode>>,
}

impl FunctionTable {
    pub fn define(&mut self, def: FunctionDefNode) {
        self.functions.insert(def.name.clone(), Rc::new(def));
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    /// Shared immutable body; calls traverse it without cloning.
    pub fn lookup(&self, name: &str) -> Option<Rc<FunctionDefNode>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{CommandNode, CompoundCommandNode, GroupNode, ListNode};

    fn dummy(name: &str) -> FunctionDefNode {
        FunctionDefNode {
            name: name.to_string(),
            body: Box::new(CommandNode::Compound(CompoundCommandNode::Group(GroupNode {
                body: ListNode { items: vec![], separators: vec![] },
                redirections: vec![],
            }))),
            redirections: vec![],
            text: format!("{}() {{ :; }}", name),
        }
    }

    #[test]
    fn test_define_lookup_remove() {
        let mut t = FunctionTable::default();
        t.define(dummy("greet"));
        assert!(t.contains("greet"));
        assert_eq!(t.lookup("greet").unwrap().name, "greet");
        assert!(t.remove("greet"));
        assert!(!t.contains("greet"));
    }

    #[test]
    fn test_names_sorted() {
        let mut t = FunctionTable::default();
        t.define(dummy("zeta"));
        t.define(dummy("alpha"));
        assert_eq!(t.names(), vec!["alpha", "zeta"]);
    }
}
