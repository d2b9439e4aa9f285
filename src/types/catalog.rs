use super::RowId;
use crate::error::AdminError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: RowId,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCategory {
    pub name: String,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Result<Self, AdminError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AdminError::Validation("category name is empty".to_string()));
        }
        Ok(Self { name })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: RowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category_id: Option<RowId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body for both product insert and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category_id: RowId,
}

impl ProductDraft {
    /// Every field must be filled before the draft goes to the store.
    pub fn validate(&self) -> Result<(), AdminError> {
        if self.name.trim().is_empty() {
            return Err(AdminError::Validation("product name is empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(AdminError::Validation(
                "product description is empty".to_string(),
            ));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(AdminError::Validation(format!(
                "product price {} is not a valid amount",
                self.price
            )));
        }
        if let RowId::Text(id) = &self.category_id
            && id.trim().is_empty()
        {
            return Err(AdminError::Validation("product category is empty".to_string()));
        }
        Ok(())
    }
}

/// Items that the list pages filter by a free-text search box.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Category {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Product {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Case-insensitive substring match on the item name; an empty term keeps everything.
pub fn filter_by_name<'a, T: Named>(items: &'a [T], term: &str) -> Vec<&'a T> {
    let needle = term.to_lowercase();
    items
        .iter()
        .filter(|item| item.name().to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Lamp".into(),
            description: "Desk lamp".into(),
            price: 19.5,
            category_id: RowId::Int(3),
        }
    }

    #[test]
    fn complete_draft_is_valid() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut d = draft();
        d.name = "  ".into();
        assert!(matches!(d.validate(), Err(AdminError::Validation(_))));

        let mut d = draft();
        d.description = String::new();
        assert!(matches!(d.validate(), Err(AdminError::Validation(_))));

        let mut d = draft();
        d.category_id = RowId::Text(String::new());
        assert!(matches!(d.validate(), Err(AdminError::Validation(_))));

        let mut d = draft();
        d.price = f64::NAN;
        assert!(matches!(d.validate(), Err(AdminError::Validation(_))));
    }

    #[test]
    fn empty_category_name_is_rejected() {
        assert!(NewCategory::new("").is_err());
        assert_eq!(NewCategory::new("Tools").unwrap().name, "Tools");
    }

    #[test]
    fn filter_is_case_insensitive() {
        let cats = vec![
            Category {
                id: RowId::Int(1),
                name: "Garden Tools".into(),
                created_at: None,
            },
            Category {
                id: RowId::Int(2),
                name: "Kitchen".into(),
                created_at: None,
            },
        ];
        let hits = filter_by_name(&cats, "tOOl");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, RowId::Int(1));
        assert_eq!(filter_by_name(&cats, "").len(), 2);
    }
}
