use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::config::{CellDef, CellsConfig};
use super::types::{Cell, CellDescriptor, CellId, CellState};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read cell registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse cell registry: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate cell name `{0}`")]
    DuplicateName(String),
    #[error("cell id {id} used by both `{first}` and `{second}`")]
    DuplicateId {
        id: CellId,
        first: String,
        second: String,
    },
    #[error("cell id 0 is reserved for `empty`, got `{0}`")]
    ReservedId(String),
}

#[derive(Clone, Debug)]
pub struct CellType {
    pub id: CellId,
    pub name: String,
    pub states: Vec<String>,
    pub tags: Vec<String>,
}

impl CellType {
    /// Packed state for a named variant; unnamed types only have state 0.
    pub fn state_index(&self, state: &str) -> Option<CellState> {
        self.states
            .iter()
            .position(|s| s == state)
            .map(|i| i as CellState)
    }

    pub fn state_name(&self, state: CellState) -> Option<&str> {
        self.states.get(state as usize).map(String::as_str)
    }

    #[inline]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Name/id lookup for every cell type a world can hold.
///
/// Id 0 is always `empty`, added implicitly when the config omits it.
#[derive(Default, Clone, Debug)]
pub struct CellRegistry {
    pub types: Vec<Option<CellType>>,
    pub by_name: HashMap<String, CellId>,
}

impl CellRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
        };
        reg.put(CellType {
            id: 0,
            name: "empty".into(),
            states: Vec::new(),
            tags: Vec::new(),
        });
        reg
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RegistryError> {
        let cfg: CellsConfig = toml::from_str(text)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: CellsConfig) -> Result<Self, RegistryError> {
        let mut reg = CellRegistry::new();
        let mut next_id: CellId = 1;
        for CellDef {
            name,
            id,
            states,
            tags,
        } in cfg.cells
        {
            if name == "empty" {
                continue;
            }
            if reg.by_name.contains_key(&name) {
                return Err(RegistryError::DuplicateName(name));
            }
            let id = id.unwrap_or(next_id);
            if id == 0 {
                return Err(RegistryError::ReservedId(name));
            }
            if let Some(prev) = reg.get(id) {
                return Err(RegistryError::DuplicateId {
                    id,
                    first: prev.name.clone(),
                    second: name,
                });
            }
            next_id = next_id.max(id.saturating_add(1));
            reg.put(CellType {
                id,
                name,
                states,
                tags,
            });
        }
        Ok(reg)
    }

    fn put(&mut self, ty: CellType) {
        let idx = ty.id as usize;
        if self.types.len() <= idx {
            self.types.resize(idx + 1, None);
        }
        self.by_name.insert(ty.name.clone(), ty.id);
        self.types[idx] = Some(ty);
    }

    #[inline]
    pub fn get(&self, id: CellId) -> Option<&CellType> {
        self.types.get(id as usize).and_then(Option::as_ref)
    }

    pub fn id_by_name(&self, name: &str) -> Option<CellId> {
        self.by_name.get(name).copied()
    }

    /// `name` or `name:state`, e.g. `"lamp:lit"`.
    pub fn cell(&self, spec: &str) -> Option<Cell> {
        let (name, state) = match spec.split_once(':') {
            Some((n, s)) => (n, Some(s)),
            None => (spec, None),
        };
        let id = self.id_by_name(name)?;
        let state = match state {
            Some(s) => self.get(id)?.state_index(s)?,
            None => 0,
        };
        Some(Cell::new(id, state))
    }

    /// Descriptor for a pattern entry: `"*"` is the no-check marker, a bare
    /// name ignores state, `name:state` is exact.
    pub fn descriptor(&self, spec: &str) -> Option<CellDescriptor> {
        if spec == "*" {
            return Some(CellDescriptor::Empty);
        }
        if spec.contains(':') {
            return self.cell(spec).map(CellDescriptor::exact);
        }
        self.id_by_name(spec).map(CellDescriptor::any_state)
    }

    pub fn name_of(&self, cell: Cell) -> &str {
        self.get(cell.id).map(|t| t.name.as_str()).unwrap_or("?")
    }

    /// Ids of every type carrying `tag`.
    pub fn tagged(&self, tag: &str) -> Vec<CellId> {
        self.types
            .iter()
            .flatten()
            .filter(|t| t.has_tag(tag))
            .map(|t| t.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
