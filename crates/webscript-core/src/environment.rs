//! Search paths and the shared unit registry.
//!
//! Units are loaded on demand and kept for as long as at least one importer
//! scope references them. The registry maps a unit name to a refcounted slot;
//! the slot's state is locked separately from the map so a slow load never
//! blocks lookups of other units. When the last scope is released the entry
//! is evicted, and the next acquire rereads the file, which is what makes
//! script edits visible without restarting the server.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value as JsonValue;

use crate::binder::BoundValue;
use crate::error::{Result, WebscriptError};
use crate::runtime::context::UnitContext;
use crate::runtime::signature::{scan_signatures, FunctionSignature};
use crate::search_path::{full_path, path_key};

/// A unit evaluated into its own engine context, plus the signatures of the
/// functions it exports.
pub struct LoadedUnit {
    name: String,
    file: PathBuf,
    signatures: HashMap<String, FunctionSignature>,
    context: UnitContext,
}

impl LoadedUnit {
    fn load(name: &str, file: &Path) -> Result<Self> {
        let source =
            std::fs::read_to_string(file).map_err(|e| WebscriptError::UnitLoad {
                unit: name.to_string(),
                message: format!("{}: {e}", file.display()),
            })?;
        // a name declared twice keeps the later declaration, as the engine does
        let signatures = scan_signatures(&source)
            .into_iter()
            .map(|sig| (sig.name.clone(), sig))
            .collect();
        let context = UnitContext::from_source(name, &source)?;
        Ok(Self {
            name: name.to_string(),
            file: file.to_path_buf(),
            signatures,
            context,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn signature(&self, function: &str) -> Option<&FunctionSignature> {
        self.signatures.get(function)
    }

    pub fn call(&self, function: &str, args: &[BoundValue]) -> Result<JsonValue> {
        self.context.call(function, args)
    }
}

#[derive(Default)]
struct UnitSlot {
    state: Mutex<Option<Arc<LoadedUnit>>>,
}

struct SlotEntry {
    refs: usize,
    slot: Arc<UnitSlot>,
}

/// Shared process-wide state: the ordered search-path list and the registry
/// of currently loaded units.
#[derive(Default)]
pub struct ScriptEnvironment {
    search_paths: RwLock<Vec<PathBuf>>,
    units: Mutex<HashMap<String, SlotEntry>>,
}

impl ScriptEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current search paths in their canonical key form,
    /// usable as the `known` argument of [`insert_search_path`] to skip the
    /// common already-present case without taking the write lock.
    ///
    /// [`insert_search_path`]: ScriptEnvironment::insert_search_path
    pub fn search_path_set(&self) -> HashSet<String> {
        self.search_paths
            .read()
            .unwrap()
            .iter()
            .map(|p| path_key(p))
            .collect()
    }

    /// Prepend `path` to the search list unless an equivalent path is already
    /// present. Newer paths win resolution. Returns whether it was inserted.
    pub fn insert_search_path(
        &self,
        path: impl AsRef<Path>,
        known: Option<&HashSet<String>>,
    ) -> bool {
        let resolved = full_path(path, None);
        let key = path_key(&resolved);
        match known {
            Some(known) if known.contains(&key) => return false,
            None if self.search_path_set().contains(&key) => return false,
            _ => {}
        }
        let mut paths = self.search_paths.write().unwrap();
        // the snapshot may be stale; recheck under the write lock
        if paths.iter().any(|p| path_key(p) == key) {
            return false;
        }
        tracing::debug!(path = %resolved.display(), "search path added");
        paths.insert(0, resolved);
        true
    }

    /// Resolve a unit name to a file. Dots in the name are path separators,
    /// so `pkg.tasks` looks for `pkg/tasks.js` under each search path in
    /// order.
    pub fn resolve_unit_file(&self, unit: &str) -> Result<PathBuf> {
        let mut relative = unit.replace('.', "/");
        relative.push_str(".js");
        let paths = self.search_paths.read().unwrap();
        for base in paths.iter() {
            let candidate = base.join(&relative);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(WebscriptError::UnitNotFound(unit.to_string()))
    }

    /// Take a reference on `unit`, loading it first if no scope currently
    /// holds it. Every successful acquire must be paired with a
    /// [`release`](ScriptEnvironment::release).
    pub fn acquire(&self, unit: &str) -> Result<Arc<LoadedUnit>> {
        let slot = {
            let mut units = self.units.lock().unwrap();
            let entry = units.entry(unit.to_string()).or_insert_with(|| SlotEntry {
                refs: 0,
                slot: Arc::new(UnitSlot::default()),
            });
            entry.refs += 1;
            Arc::clone(&entry.slot)
        };

        // loads serialize per unit on the slot, not on the registry map
        let mut state = slot.state.lock().unwrap();
        if let Some(loaded) = state.as_ref() {
            return Ok(Arc::clone(loaded));
        }
        match self.load_unit(unit) {
            Ok(loaded) => {
                let loaded = Arc::new(loaded);
                *state = Some(Arc::clone(&loaded));
                Ok(loaded)
            }
            Err(err) => {
                drop(state);
                self.release(unit);
                Err(err)
            }
        }
    }

    /// Drop one reference on `unit`. The last release evicts the entry, so a
    /// later acquire observes the file as it is on disk by then.
    pub fn release(&self, unit: &str) {
        let mut units = self.units.lock().unwrap();
        if let Some(entry) = units.get_mut(unit) {
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs == 0 {
                units.remove(unit);
                tracing::debug!(unit, "unit evicted");
            }
        }
    }

    fn load_unit(&self, unit: &str) -> Result<LoadedUnit> {
        let file = self.resolve_unit_file(unit)?;
        tracing::info!(unit, file = %file.display(), "loading unit");
        LoadedUnit::load(unit, &file)
    }
}
