//! Initial club data: the built-in catalog and station list, or a JSON seed
//! file with the same shape.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::model::{Catalog, NewStation};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("reading seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing seed file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contents of a seed file. A missing catalog falls back to the built-in one.
#[derive(Debug, Clone, Deserialize)]
pub struct Seed {
    #[serde(default = "default_catalog")]
    pub catalog: Catalog,
    #[serde(default)]
    pub stations: Vec<NewStation>,
}

impl Default for Seed {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            stations: default_stations(),
        }
    }
}

impl Seed {
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub fn default_catalog() -> Catalog {
    Catalog {
        source: "local".into(),
        name: "BurnoutZ".into(),
        address: "г. Алматы, ул. Жамбыла 204".into(),
        currency: "KZT".into(),
        services: vec!["Аренда симулятора".into(), "Турниры".into(), "Обучение".into()],
    }
}

/// Ten rigs in the main hall and five in the VIP hall; one rig in each is
/// out of service.
pub fn default_stations() -> Vec<NewStation> {
    let main = (1..=10).map(|n| NewStation {
        name: format!("Rig {n}"),
        group_id: Some(1),
        group_name: Some("Главный зал".into()),
        online: n != 6,
    });
    let vip = (1..=5).map(|n| NewStation {
        name: format!("VIP Rig {n}"),
        group_id: Some(2),
        group_name: Some("VIP зал".into()),
        online: n != 4,
    });
    main.chain(vip).collect()
}
