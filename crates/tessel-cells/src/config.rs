use serde::Deserialize;

// Top-level cells config file
#[derive(Deserialize, Debug, Default)]
pub struct CellsConfig {
    #[serde(default)]
    pub cells: Vec<CellDef>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CellDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u16>,
    // Named variant states; index in this list is the packed state value.
    #[serde(default)]
    pub states: Vec<String>,
    // Free-form tags so predicates can select families of cells
    #[serde(default)]
    pub tags: Vec<String>,
}
