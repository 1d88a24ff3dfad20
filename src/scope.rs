//! Eval scope and `scope` method resolution
//!
//! Pattern code references module exports by bare name, so the session
//! gathers every module's exports into one [`EvalScope`]. The `scope`
//! visualisation method is optional on the pattern base type; older code also
//! calls it as `_scope` or `tscope`. Which implementation each of those names
//! gets is decided once, when the session is built, as [`ScopeBindings`].

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const SCOPE_METHOD: &str = "scope";
pub const SCOPE_ALIASES: [&str; 2] = ["_scope", "tscope"];

/// Exported name -> module that provides it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalScope {
    entries: BTreeMap<String, String>,
    modules: Vec<String>,
}

impl EvalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module's exports. A later module shadows earlier ones.
    pub fn extend<I>(&mut self, module: &str, exports: I)
    where
        I: IntoIterator<Item = String>,
    {
        for name in exports {
            self.entries.insert(name, module.to_string());
        }
        self.modules.push(module.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The module a name resolves to
    pub fn module_of(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Modules in the order they were added
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// What a scope method name is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "target")]
pub enum MethodBinding {
    /// The pattern type already has it; leave it alone
    Existing,
    /// Same implementation as another method
    AliasOf(&'static str),
    /// Returns the pattern unchanged
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeBindings {
    bindings: BTreeMap<&'static str, MethodBinding>,
}

impl ScopeBindings {
    /// Decide the binding for `scope`, `_scope` and `tscope`.
    ///
    /// With a native `scope`, missing aliases point at it. Without one, every
    /// missing name gets a no-op. Names already present are never rebound.
    pub fn resolve(existing: &BTreeSet<String>) -> Self {
        let has_scope = existing.contains(SCOPE_METHOD);
        let mut bindings = BTreeMap::new();

        bindings.insert(
            SCOPE_METHOD,
            if has_scope {
                MethodBinding::Existing
            } else {
                MethodBinding::NoOp
            },
        );

        for alias in SCOPE_ALIASES {
            let binding = if existing.contains(alias) {
                MethodBinding::Existing
            } else if has_scope {
                MethodBinding::AliasOf(SCOPE_METHOD)
            } else {
                MethodBinding::NoOp
            };
            bindings.insert(alias, binding);
        }

        ScopeBindings { bindings }
    }

    pub fn get(&self, name: &str) -> Option<MethodBinding> {
        self.bindings.get(name).copied()
    }

    /// Whether the pattern type brings its own `scope`
    pub fn has_native_scope(&self) -> bool {
        self.get(SCOPE_METHOD) == Some(MethodBinding::Existing)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, MethodBinding)> + '_ {
        self.bindings.iter().map(|(name, binding)| (*name, *binding))
    }
}
