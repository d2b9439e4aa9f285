use super::client::TableClient;
use crate::error::AdminError;
use crate::types::{Category, NewCategory, Product, ProductDraft, RowId};

use tracing::info;

const CATEGORIES: &str = "categories";
const PRODUCTS: &str = "products";

/// Data operations behind the categories and products pages.
#[derive(Clone)]
pub struct CatalogStore {
    tables: TableClient,
}

impl CatalogStore {
    pub fn new(tables: TableClient) -> Self {
        Self { tables }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AdminError> {
        self.tables.select_all(CATEGORIES).await
    }

    pub async fn create_category(&self, name: &str) -> Result<(), AdminError> {
        let category = NewCategory::new(name)?;
        self.tables.insert(CATEGORIES, &[category]).await?;
        info!(name, "category created");
        Ok(())
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AdminError> {
        self.tables.select_all(PRODUCTS).await
    }

    /// Categories and products together, fetched concurrently.
    pub async fn load(&self) -> Result<(Vec<Category>, Vec<Product>), AdminError> {
        futures::try_join!(self.list_categories(), self.list_products())
    }

    pub async fn find_product(&self, id: &RowId) -> Result<Option<Product>, AdminError> {
        let rows: Vec<Product> = self
            .tables
            .select_eq(PRODUCTS, "id", &id.to_string())
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn create_product(&self, draft: &ProductDraft) -> Result<(), AdminError> {
        draft.validate()?;
        self.tables.insert(PRODUCTS, std::slice::from_ref(draft)).await?;
        info!(name = %draft.name, "product created");
        Ok(())
    }

    pub async fn update_product(&self, id: &RowId, draft: &ProductDraft) -> Result<(), AdminError> {
        draft.validate()?;
        self.tables
            .update_eq(PRODUCTS, "id", &id.to_string(), draft)
            .await?;
        info!(%id, "product updated");
        Ok(())
    }

    pub async fn delete_product(&self, id: &RowId) -> Result<(), AdminError> {
        self.tables.delete_eq(PRODUCTS, "id", &id.to_string()).await?;
        info!(%id, "product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn store() -> CatalogStore {
        // Validation fails before any request would reach this address.
        CatalogStore::new(TableClient::with_parts(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/rest/v1/").unwrap(),
            "anon".into(),
        ))
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_the_network() {
        let draft = ProductDraft {
            name: String::new(),
            description: "d".into(),
            price: 1.0,
            category_id: RowId::Int(1),
        };
        assert!(matches!(
            store().create_product(&draft).await,
            Err(AdminError::Validation(_))
        ));
        assert!(matches!(
            store().update_product(&RowId::Int(1), &draft).await,
            Err(AdminError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn empty_category_name_is_rejected_locally() {
        assert!(matches!(
            store().create_category("   ").await,
            Err(AdminError::Validation(_))
        ));
    }
}
