//! Class-level export eligibility.

use regex::Regex;

use ogx_model::{ModelRegistry, TypeRef};

/// Ordered allow/deny pattern lists deciding which classes are exported.
///
/// Patterns are regular expressions matched against the fully-qualified name
/// of a class and of every superclass (subclass-of semantics, not exact
/// match). Deny patterns are checked first across the whole list; allow
/// patterns only apply when no deny matched. A class matching neither list
/// is not exported.
#[derive(Debug)]
pub struct ClassFilter {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    let mut compiled = Vec::with_capacity(patterns.len());
    for &pattern in patterns {
        match Regex::new(pattern) {
            Ok(re) => compiled.push(re),
            // A malformed pattern never matches; it must not kill the filter.
            Err(error) => {
                tracing::error!(pattern, %error, "failed to compile class pattern");
            }
        }
    }
    compiled
}

impl ClassFilter {
    /// Compile allow and deny pattern lists.
    ///
    /// Malformed patterns are logged and dropped.
    #[must_use]
    pub fn new(allow: &[&str], deny: &[&str]) -> Self {
        Self {
            allow: compile(allow),
            deny: compile(deny),
        }
    }

    fn matches_ancestry(model: &ModelRegistry, class: &str, re: &Regex) -> bool {
        model.ancestors(class).iter().any(|name| re.is_match(name))
    }

    /// Whether instances of a class should be exported.
    #[must_use]
    pub fn is_exportable(&self, model: &ModelRegistry, class: &str) -> bool {
        for re in &self.deny {
            if Self::matches_ancestry(model, class, re) {
                return false;
            }
        }
        for re in &self.allow {
            if Self::matches_ancestry(model, class, re) {
                return true;
            }
        }
        false
    }

    /// Whether a declared field/element type is eligible.
    ///
    /// Primitive types carry no class and are always eligible; the filter
    /// only gates class-typed references and collection elements.
    #[must_use]
    pub fn type_allowed(&self, model: &ModelRegistry, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Primitive(_) => true,
            TypeRef::Class(class) => self.is_exportable(model, class),
        }
    }
}
