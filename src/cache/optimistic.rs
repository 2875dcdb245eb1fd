//! Estado local con cambios tentativos
//!
//! Cada mutación local devuelve un `Tentative` que se confirma (`commit`) o se
//! revierte (`rollback`). El rollback restaura solo la entrada tocada, así un
//! refresh que llegó entre medio no se pisa.

use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{Location, Vehicle, WashRequest};

/// Entidades con clave estable
pub trait Keyed: Clone {
    fn key(&self) -> Uuid;
}

impl Keyed for Vehicle {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for Location {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for WashRequest {
    fn key(&self) -> Uuid {
        self.id
    }
}

/// Cambio aplicado localmente y pendiente de confirmación remota
#[derive(Debug, Clone)]
#[must_use = "un cambio tentativo debe confirmarse o revertirse"]
pub enum Tentative<T> {
    Updated { key: Uuid, previous: T },
    Inserted { key: Uuid },
    Removed { previous: T, index: usize },
}

struct Inner<T> {
    items: Vec<T>,
    loaded: bool,
}

/// Lista en memoria espejada del último fetch
pub struct OptimisticStore<T> {
    inner: RwLock<Inner<T>>,
}

impl<T: Keyed> Default for OptimisticStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed> OptimisticStore<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: Vec::new(),
                loaded: false,
            }),
        }
    }

    /// Búsqueda sincrónica; `None` si no existe o aún no se cargó
    pub fn get(&self, key: Uuid) -> Option<T> {
        self.inner.read().items.iter().find(|item| item.key() == key).cloned()
    }

    pub fn all(&self) -> Vec<T> {
        self.inner.read().items.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().loaded
    }

    /// Reemplazar la lista completa con el resultado de un fetch
    pub fn replace_all(&self, items: Vec<T>) {
        let mut inner = self.inner.write();
        inner.items = items;
        inner.loaded = true;
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.items.clear();
        inner.loaded = false;
    }

    /// Insertar o reemplazar una entrada confirmada por el servidor
    pub fn upsert(&self, item: T) {
        let mut inner = self.inner.write();
        match inner.items.iter_mut().find(|existing| existing.key() == item.key()) {
            Some(existing) => *existing = item,
            None => inner.items.push(item),
        }
    }

    /// Aplicar `f` a todas las entradas (cambios ya confirmados)
    pub fn modify_all(&self, mut f: impl FnMut(&mut T)) {
        for item in self.inner.write().items.iter_mut() {
            f(item);
        }
    }

    pub fn apply_update(&self, key: Uuid, f: impl FnOnce(&mut T)) -> Option<Tentative<T>> {
        let mut inner = self.inner.write();
        let item = inner.items.iter_mut().find(|item| item.key() == key)?;
        let previous = item.clone();
        f(item);
        Some(Tentative::Updated { key, previous })
    }

    pub fn apply_insert(&self, item: T) -> Tentative<T> {
        let key = item.key();
        self.inner.write().items.push(item);
        Tentative::Inserted { key }
    }

    pub fn apply_remove(&self, key: Uuid) -> Option<Tentative<T>> {
        let mut inner = self.inner.write();
        let index = inner.items.iter().position(|item| item.key() == key)?;
        let previous = inner.items.remove(index);
        Some(Tentative::Removed { previous, index })
    }

    /// Confirmar el cambio; `confirmed` reemplaza la copia local si el servidor devolvió la fila
    pub fn commit(&self, tentative: Tentative<T>, confirmed: Option<T>) {
        if let Some(item) = confirmed {
            match tentative {
                Tentative::Removed { .. } => {}
                _ => self.upsert(item),
            }
        }
    }

    pub fn rollback(&self, tentative: Tentative<T>) {
        let mut inner = self.inner.write();
        match tentative {
            Tentative::Updated { key, previous } => {
                if let Some(item) = inner.items.iter_mut().find(|item| item.key() == key) {
                    *item = previous;
                }
            }
            Tentative::Inserted { key } => {
                inner.items.retain(|item| item.key() != key);
            }
            Tentative::Removed { previous, index } => {
                if !inner.items.iter().any(|item| item.key() == previous.key()) {
                    let index = index.min(inner.items.len());
                    inner.items.insert(index, previous);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: Uuid,
        value: u32,
    }

    impl Keyed for Item {
        fn key(&self) -> Uuid {
            self.id
        }
    }

    fn item(value: u32) -> Item {
        Item { id: Uuid::new_v4(), value }
    }

    #[test]
    fn test_update_rollback_restores_entry() {
        let store = OptimisticStore::new();
        let a = item(1);
        store.replace_all(vec![a.clone(), item(2)]);

        let tentative = store.apply_update(a.id, |i| i.value = 10).unwrap();
        assert_eq!(store.get(a.id).unwrap().value, 10);
        store.rollback(tentative);
        assert_eq!(store.get(a.id).unwrap(), a);
    }

    #[test]
    fn test_rollback_does_not_clobber_other_entries() {
        let store = OptimisticStore::new();
        let a = item(1);
        let b = item(2);
        store.replace_all(vec![a.clone(), b.clone()]);

        let tentative = store.apply_update(a.id, |i| i.value = 10).unwrap();
        // refresh que llega entre medio
        store.replace_all(vec![a.clone(), Item { value: 20, ..b.clone() }]);
        store.rollback(tentative);
        assert_eq!(store.get(b.id).unwrap().value, 20);
    }

    #[test]
    fn test_insert_and_remove_rollback() {
        let store = OptimisticStore::new();
        let a = item(1);
        let b = item(2);
        store.replace_all(vec![a.clone(), b.clone()]);

        let inserted = store.apply_insert(item(3));
        assert_eq!(store.len(), 3);
        store.rollback(inserted);
        assert_eq!(store.len(), 2);

        let removed = store.apply_remove(a.id).unwrap();
        assert!(store.get(a.id).is_none());
        store.rollback(removed);
        assert_eq!(store.all(), vec![a, b]);
    }

    #[test]
    fn test_get_before_load() {
        let store: OptimisticStore<Item> = OptimisticStore::new();
        assert!(!store.is_loaded());
        assert!(store.get(Uuid::new_v4()).is_none());
        assert!(store.apply_update(Uuid::new_v4(), |_| {}).is_none());
    }
}
