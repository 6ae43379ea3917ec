//! Filtering and sorting a collection's items for display.

use std::{cmp::Ordering, collections::BTreeMap};

use anyhow::{Result, anyhow};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    attribute::AttributeDefinition,
    data::{display_value, to_number},
    filter::{FilterSet, passes_filters},
    item::{Item, ItemStatus},
    mapping::ATTRIBUTE_PREFIX,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortField {
    Name,
    PurchasePrice,
    CurrentValue,
    PurchaseDate,
    CreatedAt,
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDirective {
    pub field: SortField,
    pub ascending: bool,
}

impl SortDirective {
    /// Parses `field[:asc|desc]`, where field is a built-in sort field or
    /// `attr:<name>`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (field, direction) = match spec.rsplit_once(':') {
            Some((field, dir)) if matches!(dir.trim().to_ascii_lowercase().as_str(), "asc" | "desc") => {
                (field.trim(), dir.trim().to_ascii_lowercase())
            }
            _ => (spec.trim(), "asc".to_string()),
        };
        if field.is_empty() {
            return Err(anyhow!("Sort directive is missing a field"));
        }
        let field = match field {
            "name" => SortField::Name,
            "purchase_price" | "price" => SortField::PurchasePrice,
            "current_value" | "value" => SortField::CurrentValue,
            "purchase_date" | "date" => SortField::PurchaseDate,
            "created_at" | "created" => SortField::CreatedAt,
            other => match other.strip_prefix(ATTRIBUTE_PREFIX) {
                Some(name) if !name.trim().is_empty() => SortField::Attribute(name.trim().to_string()),
                _ => return Err(anyhow!("Unknown sort field '{other}'")),
            },
        };
        Ok(SortDirective {
            field,
            ascending: direction == "asc",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Amount(Decimal),
    Text(String),
}

impl SortKey {
    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Amount(a), SortKey::Amount(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            // Mixed attribute values: numbers before text.
            (SortKey::Number(_), _) => Ordering::Less,
            (_, SortKey::Number(_)) => Ordering::Greater,
            (SortKey::Amount(_), _) => Ordering::Less,
            (_, SortKey::Amount(_)) => Ordering::Greater,
        }
    }
}

fn sort_key(item: &Item, field: &SortField) -> Option<SortKey> {
    match field {
        SortField::Name => Some(SortKey::Text(item.name.to_lowercase())),
        SortField::PurchasePrice => item.purchase_price.map(SortKey::Amount),
        SortField::CurrentValue => item.current_value.map(SortKey::Amount),
        SortField::PurchaseDate => item
            .purchase_date
            .map(|d| SortKey::Text(d.format("%Y-%m-%d").to_string())),
        SortField::CreatedAt => Some(SortKey::Text(item.created_at.to_rfc3339())),
        SortField::Attribute(name) => match item.attributes.get(name) {
            None | Some(Value::Null) => None,
            Some(value @ Value::Number(_)) => to_number(value).map(SortKey::Number),
            Some(value) => {
                let text = display_value(value).to_lowercase();
                (!text.is_empty()).then_some(SortKey::Text(text))
            }
        },
    }
}

/// Orders two items by `directives`; items missing a key sort last in either
/// direction.
fn compare_items(a: &Item, b: &Item, directives: &[SortDirective]) -> Ordering {
    for directive in directives {
        let ordering = match (sort_key(a, &directive.field), sort_key(b, &directive.field)) {
            (Some(left), Some(right)) => {
                let ordering = left.compare(&right);
                if directive.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Case-insensitive substring over name, description, notes, and barcode.
    pub search: Option<String>,
    pub status: Option<ItemStatus>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub attributes: FilterSet,
    pub sort: Vec<SortDirective>,
}

impl ItemQuery {
    pub fn matches(&self, item: &Item, definitions: &[AttributeDefinition]) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let haystacks = [
                Some(item.name.as_str()),
                item.description.as_deref(),
                item.notes.as_deref(),
                item.barcode.as_deref(),
            ];
            if !haystacks
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        if self.status.is_some_and(|status| status != item.status) {
            return false;
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            let Some(price) = item.purchase_price else {
                return false;
            };
            if self.min_price.is_some_and(|min| price < min)
                || self.max_price.is_some_and(|max| price > max)
            {
                return false;
            }
        }
        passes_filters(&item.attributes, &self.attributes, definitions)
    }

    /// Matching items, sorted by the query's directives (stable).
    pub fn apply<'a>(&self, items: &'a [Item], definitions: &[AttributeDefinition]) -> Vec<&'a Item> {
        let mut matched = items
            .iter()
            .filter(|item| self.matches(item, definitions))
            .collect::<Vec<_>>();
        if !self.sort.is_empty() {
            matched.sort_by(|a, b| compare_items(a, b, &self.sort));
        }
        matched
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSummary {
    pub items: usize,
    pub total_purchase_price: Decimal,
    pub total_current_value: Decimal,
    pub by_status: BTreeMap<ItemStatus, usize>,
}

impl CollectionSummary {
    pub fn from_items<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a Item>,
    {
        let mut summary = CollectionSummary::default();
        for item in items {
            summary.items += 1;
            summary.total_purchase_price += item.purchase_price.unwrap_or_default();
            summary.total_current_value += item.current_value.unwrap_or_default();
            *summary.by_status.entry(item.status).or_insert(0) += 1;
        }
        summary
    }

    /// Current value minus purchase price across all items.
    pub fn gain(&self) -> Decimal {
        self.total_current_value - self.total_purchase_price
    }
}
