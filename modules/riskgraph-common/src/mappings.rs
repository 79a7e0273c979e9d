use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::RiskGraphError;

/// Display-layer lookup tables, loaded once and passed explicitly to
/// the read side. Sector names map to coarser "activity" labels and
/// controversy names to categories; missing keys pass through
/// unchanged. These remaps never touch stored node identity.
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    activities: HashMap<String, String>,
    categories: HashMap<String, String>,
    sectors: Vec<String>,
}

impl Mappings {
    /// Load mapping tables from JSON files. Each argument is optional;
    /// an absent file yields an identity mapping.
    pub fn load(
        sector_mapping: Option<&Path>,
        controversy_mapping: Option<&Path>,
        sectors: Option<&Path>,
    ) -> Result<Self, RiskGraphError> {
        Ok(Self {
            activities: sector_mapping.map(read_string_map).transpose()?.unwrap_or_default(),
            categories: controversy_mapping
                .map(read_string_map)
                .transpose()?
                .unwrap_or_default(),
            sectors: sectors.map(read_string_list).transpose()?.unwrap_or_default(),
        })
    }

    pub fn from_parts(
        activities: HashMap<String, String>,
        categories: HashMap<String, String>,
        sectors: Vec<String>,
    ) -> Self {
        Self {
            activities,
            categories,
            sectors,
        }
    }

    /// Activity label for a raw sector name; the name itself when unmapped.
    pub fn activity<'a>(&'a self, sector_name: &'a str) -> &'a str {
        self.activities
            .get(sector_name)
            .map(String::as_str)
            .unwrap_or(sector_name)
    }

    /// Category label for a raw controversy name; the name itself when unmapped.
    pub fn category<'a>(&'a self, controversy_name: &'a str) -> &'a str {
        self.categories
            .get(controversy_name)
            .map(String::as_str)
            .unwrap_or(controversy_name)
    }

    /// Canonical list of selectable sectors (UI population, informational).
    pub fn sectors(&self) -> &[String] {
        &self.sectors
    }
}

fn read_string_map(path: &Path) -> Result<HashMap<String, String>, RiskGraphError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| RiskGraphError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| RiskGraphError::Config(format!("invalid mapping file {}: {e}", path.display())))
}

fn read_string_list(path: &Path) -> Result<Vec<String>, RiskGraphError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| RiskGraphError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| RiskGraphError::Config(format!("invalid sectors file {}: {e}", path.display())))
}
