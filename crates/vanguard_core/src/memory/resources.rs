//! # Resource Manager
//!
//! Name-keyed asset cache. Components hold [`ResourceHandle`]s; on the wire
//! a handle travels as the resource's name and is turned back into a local
//! handle by the receiver's catalog.

use std::collections::HashMap;
use std::fmt;

use super::slot_map::{ResourceHandle, SlotMap};

/// Handle/name conversion used by component codecs.
pub trait AssetCatalog {
    /// Returns the resource name behind a live handle.
    fn name_of(&self, handle: ResourceHandle) -> Option<&str>;

    /// Returns the handle for `path`, loading it on first use.
    ///
    /// Returns [`ResourceHandle::INVALID`] if the resource cannot be loaded.
    fn load_or_get_handle(&mut self, path: &str) -> ResourceHandle;
}

/// Catalog for processes that never touch assets.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAssets;

impl AssetCatalog for NoAssets {
    fn name_of(&self, _handle: ResourceHandle) -> Option<&str> {
        None
    }

    fn load_or_get_handle(&mut self, _path: &str) -> ResourceHandle {
        ResourceHandle::INVALID
    }
}

struct Entry<T> {
    name: String,
    value: T,
}

type Loader<T> = Box<dyn FnMut(&str) -> Option<T> + Send>;

/// Loads resources by name once and hands out generation-checked handles.
///
/// # Example
///
/// ```rust,ignore
/// let mut textures = ResourceManager::new(|path| Texture::open(path));
/// let ship = textures.load_or_get_handle("assets/ship.png");
/// let again = textures.load_or_get_handle("assets/ship.png");
/// assert_eq!(ship, again);
/// ```
pub struct ResourceManager<T> {
    slots: SlotMap<Entry<T>>,
    by_name: HashMap<String, ResourceHandle>,
    loader: Loader<T>,
}

impl<T> fmt::Debug for ResourceManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("loaded", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl<T> ResourceManager<T> {
    /// Creates a manager that loads resources with `loader`.
    pub fn new(loader: impl FnMut(&str) -> Option<T> + Send + 'static) -> Self {
        Self {
            slots: SlotMap::new(),
            by_name: HashMap::new(),
            loader: Box::new(loader),
        }
    }

    /// Number of loaded resources.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing is loaded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolves a handle to its resource. Stale handles resolve to `None`.
    #[must_use]
    pub fn resolve(&self, handle: ResourceHandle) -> Option<&T> {
        self.slots.get(handle).map(|entry| &entry.value)
    }

    /// Returns the handle of an already-loaded resource.
    #[must_use]
    pub fn handle_of(&self, path: &str) -> Option<ResourceHandle> {
        self.by_name
            .get(path)
            .copied()
            .filter(|handle| self.slots.contains(*handle))
    }

    /// Releases a resource; its handles go stale.
    pub fn remove(&mut self, handle: ResourceHandle) -> Option<T> {
        let entry = self.slots.remove(handle)?;
        self.by_name.remove(&entry.name);
        Some(entry.value)
    }

    /// Reloads `path`, invalidating every handle to the old copy.
    ///
    /// # Returns
    ///
    /// The new handle, or `None` if the loader failed (the old copy is kept).
    pub fn reload(&mut self, path: &str) -> Option<ResourceHandle> {
        let Some(value) = (self.loader)(path) else {
            tracing::warn!("reload of {path} failed, keeping previous copy");
            return None;
        };
        if let Some(old) = self.by_name.remove(path) {
            self.slots.remove(old);
        }
        Some(self.insert(path, value))
    }

    fn insert(&mut self, path: &str, value: T) -> ResourceHandle {
        let handle = self.slots.insert(Entry {
            name: path.to_owned(),
            value,
        });
        self.by_name.insert(path.to_owned(), handle);
        handle
    }
}

impl<T> AssetCatalog for ResourceManager<T> {
    fn name_of(&self, handle: ResourceHandle) -> Option<&str> {
        self.slots.get(handle).map(|entry| entry.name.as_str())
    }

    fn load_or_get_handle(&mut self, path: &str) -> ResourceHandle {
        if let Some(handle) = self.handle_of(path) {
            return handle;
        }
        match (self.loader)(path) {
            Some(value) => {
                tracing::debug!("loaded resource {path}");
                self.insert(path, value)
            }
            None => {
                tracing::warn!("failed to load resource {path}");
                ResourceHandle::INVALID
            }
        }
    }
}
