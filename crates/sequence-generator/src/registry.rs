use std::sync::{Arc, RwLock, RwLockReadGuard};

use planning_core::PlanningError;

/// Name-keyed table of strategy objects, in registration order.
///
/// Lookups take a shared lock; registration takes the exclusive one and is
/// expected only while a service is being composed.
pub struct NamedRegistry<T: ?Sized> {
    kind: &'static str,
    entries: RwLock<Vec<(String, Arc<T>)>>,
}

impl<T: ?Sized> NamedRegistry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, name: &str, item: Arc<T>) {
        let mut guard = match self.entries.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = item,
            None => guard.push((name.to_string(), item)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, item)| Arc::clone(item))
    }

    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Resolve names in the given order; an unknown name is a config error.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<(String, Arc<T>)>, PlanningError> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .map(|item| (name.clone(), item))
                    .ok_or_else(|| PlanningError::UnknownModule(format!("{} {}", self.kind, name)))
            })
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<(String, Arc<T>)>> {
        match self.entries.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_get_and_resolve() {
        let registry: NamedRegistry<str> = NamedRegistry::new("thing");
        registry.register("a", Arc::from("first"));
        registry.register("b", Arc::from("second"));
        registry.register("a", Arc::from("replaced"));
        assert_eq!(registry.len(), 2);
        assert_eq!(&*registry.get("a").unwrap(), "replaced");
        let resolved = registry
            .resolve(&["b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(resolved[0].0, "b");
        assert!(registry.resolve(&["zzz".to_string()]).is_err());
    }
}
