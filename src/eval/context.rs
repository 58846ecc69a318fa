//! Scoped name→value lookup with parent fallback.
use crate::value::Value;
use std::collections::BTreeMap;

/// One link of the evaluation context chain.
///
/// The root wraps the running results map; a child is created once per Range
/// item and holds that item's property bindings. Lookup walks child → parent,
/// which is what makes an inner item property shadow an outer binding of the
/// same name within the inner scope only.
pub enum Scope<'a> {
    Root {
        results: &'a BTreeMap<String, Value>,
    },
    Child {
        bindings: BTreeMap<String, Value>,
        parent: &'a Scope<'a>,
    },
}

impl<'a> Scope<'a> {
    pub fn root(results: &'a BTreeMap<String, Value>) -> Scope<'a> {
        Scope::Root { results }
    }

    pub fn child(bindings: BTreeMap<String, Value>, parent: &'a Scope<'a>) -> Scope<'a> {
        Scope::Child { bindings, parent }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self {
            Scope::Root { results } => results.get(name),
            Scope::Child { bindings, parent } => {
                bindings.get(name).or_else(|| parent.lookup(name))
            }
        }
    }

    /// Reads the running results map directly, ignoring item bindings.
    ///
    /// Non-volatile references bind at compile time to the node, not to
    /// whatever an item property happens to be called, so their reads must
    /// not be shadowed by a child scope.
    pub fn global(&self, name: &str) -> Option<&Value> {
        match self {
            Scope::Root { results } => results.get(name),
            Scope::Child { parent, .. } => parent.global(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_shadows_parent() {
        let mut results = BTreeMap::new();
        results.insert("x".to_string(), Value::Number(1.0));
        results.insert("y".to_string(), Value::Number(9.0));
        let root = Scope::root(&results);

        let mut inner = BTreeMap::new();
        inner.insert("x".to_string(), Value::Number(5.0));
        let child = Scope::child(inner, &root);

        assert_eq!(child.lookup("x"), Some(&Value::Number(5.0)));
        assert_eq!(child.lookup("y"), Some(&Value::Number(9.0)));
        assert_eq!(root.lookup("x"), Some(&Value::Number(1.0)));
        assert_eq!(child.lookup("missing"), None);
    }
}
