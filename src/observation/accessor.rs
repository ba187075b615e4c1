//! Process-wide registry of observable property accessors per type.
//!
//! Types form a single-inheritance chain. A type's effective accessors are its
//! own merged over its ancestors', with the nearest definition of a name
//! winning. Flattened lookups are cached and the cache is dropped whenever a
//! type or property is defined.

use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::hash::{FastHashMap, FastIndexMap};
use crate::observation::Object;
use crate::value::Value;

/// Callback run after an observable property changes, with `(object, old, new)`.
pub type ChangedCallback = Arc<dyn Fn(&Object, &Value, &Value) + Send + Sync>;

/// An observable property definition.
#[derive(Clone)]
pub struct Accessor {
    name: Arc<str>,
    changed: Option<ChangedCallback>,
}

impl Accessor {
    /// An accessor without a change callback.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            changed: None,
        }
    }

    /// Run `callback` after every effective change, before subscribers are notified.
    pub fn on_changed(
        mut self,
        callback: impl Fn(&Object, &Value, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.changed = Some(Arc::new(callback));
        self
    }

    /// The property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn changed(&self) -> Option<&ChangedCallback> {
        self.changed.as_ref()
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("name", &self.name)
            .field("changed", &self.changed.is_some())
            .finish()
    }
}

impl From<&str> for Accessor {
    fn from(name: &str) -> Self {
        Accessor::new(name)
    }
}

type AccessorMap = FastIndexMap<Arc<str>, Accessor>;

#[derive(Default)]
struct TypeEntry {
    parent: Option<Arc<str>>,
    own: AccessorMap,
}

#[derive(Default)]
struct Registry {
    types: FastHashMap<Arc<str>, TypeEntry>,
    flattened: FastHashMap<Arc<str>, Arc<AccessorMap>>,
}

impl Registry {
    fn flatten(&self, type_name: &str) -> AccessorMap {
        // Walk leaf to root, then merge root first so nearer types override.
        let mut chain: Vec<(&Arc<str>, &TypeEntry)> = Vec::new();
        let mut current = self.types.get_key_value(type_name);
        while let Some((name, entry)) = current {
            if chain.iter().any(|(seen, _)| Arc::ptr_eq(seen, name)) {
                tracing::warn!(type_name, "cyclic type parent chain");
                break;
            }
            chain.push((name, entry));
            current = entry
                .parent
                .as_deref()
                .and_then(|parent| self.types.get_key_value(parent));
        }
        let mut merged = AccessorMap::default();
        for (_, entry) in chain.iter().rev() {
            for (name, accessor) in &entry.own {
                merged.insert(name.clone(), accessor.clone());
            }
        }
        merged
    }
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::default()));

/// Declare `type_name`, optionally inheriting accessors from `parent`.
///
/// Redefining a type replaces its parent but keeps its own accessors.
pub fn define_type(type_name: &str, parent: Option<&str>) {
    let mut registry = REGISTRY.write();
    registry.types.entry(type_name.into()).or_default().parent = parent.map(Arc::from);
    registry.flattened.clear();
}

/// Make a property of `type_name` observable. The type is created on demand.
pub fn define_property(type_name: &str, accessor: impl Into<Accessor>) {
    let accessor = accessor.into();
    let mut registry = REGISTRY.write();
    registry
        .types
        .entry(type_name.into())
        .or_default()
        .own
        .insert(accessor.name.clone(), accessor);
    registry.flattened.clear();
}

fn flattened(type_name: &str) -> Arc<AccessorMap> {
    if let Some(map) = REGISTRY.read().flattened.get(type_name) {
        return map.clone();
    }
    let mut registry = REGISTRY.write();
    let map = Arc::new(registry.flatten(type_name));
    registry.flattened.insert(type_name.into(), map.clone());
    map
}

/// The effective accessor for `name` on `type_name`, including inherited ones.
pub fn accessor(type_name: &str, name: &str) -> Option<Accessor> {
    flattened(type_name).get(name).cloned()
}

/// All effective accessors of `type_name`, ancestors first.
pub fn accessors(type_name: &str) -> Vec<Accessor> {
    flattened(type_name).values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_are_inherited() {
        define_property("AccessorTestBase", "id");
        define_type("AccessorTestDerived", Some("AccessorTestBase"));
        define_property("AccessorTestDerived", "label");

        let names: Vec<String> = accessors("AccessorTestDerived")
            .iter()
            .map(|a| a.name().to_owned())
            .collect();
        assert_eq!(names, ["id", "label"]);
        assert!(accessor("AccessorTestBase", "label").is_none());
    }

    #[test]
    fn late_definitions_invalidate_the_cache() {
        define_type("AccessorTestLate", None);
        assert!(accessor("AccessorTestLate", "value").is_none());
        define_property("AccessorTestLate", "value");
        assert!(accessor("AccessorTestLate", "value").is_some());
    }

    #[test]
    fn nearest_definition_wins() {
        define_property("AccessorTestShadowBase", "x");
        define_type("AccessorTestShadow", Some("AccessorTestShadowBase"));
        define_property(
            "AccessorTestShadow",
            Accessor::new("x").on_changed(|_, _, _| {}),
        );
        assert!(accessor("AccessorTestShadow", "x").is_some_and(|a| a.changed().is_some()));
        assert!(accessor("AccessorTestShadowBase", "x").is_some_and(|a| a.changed().is_none()));
    }

    #[test]
    fn cyclic_parents_terminate() {
        define_type("AccessorTestCycleA", Some("AccessorTestCycleB"));
        define_type("AccessorTestCycleB", Some("AccessorTestCycleA"));
        define_property("AccessorTestCycleA", "a");
        assert!(accessor("AccessorTestCycleB", "a").is_some());
    }
}
