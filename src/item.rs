//! Catalog items and the local collection file.

use std::{
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::mapping::BuiltinField;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    InCollection,
    Wishlist,
    Ordered,
    Sold,
    Lent,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 5] = [
        ItemStatus::InCollection,
        ItemStatus::Wishlist,
        ItemStatus::Ordered,
        ItemStatus::Sold,
        ItemStatus::Lent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::InCollection => "in_collection",
            ItemStatus::Wishlist => "wishlist",
            ItemStatus::Ordered => "ordered",
            ItemStatus::Sold => "sold",
            ItemStatus::Lent => "lent",
        }
    }

    /// Reads the status words people put in spreadsheets, in English or German.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase().replace(['-', ' '], "_");
        let status = match lowered.as_str() {
            "in_collection" | "owned" | "collection" | "vorhanden" | "besitz" | "im_besitz"
            | "sammlung" => ItemStatus::InCollection,
            "wishlist" | "wanted" | "wunschliste" | "gesucht" => ItemStatus::Wishlist,
            "ordered" | "preorder" | "bestellt" => ItemStatus::Ordered,
            "sold" | "verkauft" => ItemStatus::Sold,
            "lent" | "loaned" | "verliehen" | "ausgeliehen" => ItemStatus::Lent,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ItemStatus::parse_lenient(value).ok_or_else(|| {
            anyhow!(
                "Unknown status '{value}'. Expected one of: {}",
                ItemStatus::ALL.map(|s| s.as_str()).join(", ")
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            status: ItemStatus::default(),
            purchase_price: None,
            current_value: None,
            purchase_date: None,
            purchase_location: None,
            barcode: None,
            notes: None,
            attributes: Map::new(),
            category: None,
            image_urls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Display form of a built-in field; empty when unset.
    pub fn field_display(&self, field: BuiltinField) -> String {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        match field {
            BuiltinField::Name => self.name.clone(),
            BuiltinField::Description => text(&self.description),
            BuiltinField::PurchasePrice => {
                self.purchase_price.map(|p| p.to_string()).unwrap_or_default()
            }
            BuiltinField::CurrentValue => {
                self.current_value.map(|v| v.to_string()).unwrap_or_default()
            }
            BuiltinField::PurchaseDate => self
                .purchase_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            BuiltinField::Barcode => text(&self.barcode),
            BuiltinField::Notes => text(&self.notes),
            BuiltinField::Status => self.status.to_string(),
            BuiltinField::PurchaseLocation => text(&self.purchase_location),
        }
    }
}

/// A named collection of items, stored as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening collection file {path:?}"))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing collection JSON {path:?}"))
    }

    /// Loads `path`, or starts an empty collection named after the file stem.
    pub fn load_or_new(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("collection");
        Ok(Self::new(name))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating collection file {path:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("Writing collection JSON")?;
        writer.flush().context("Flushing collection file")
    }
}
