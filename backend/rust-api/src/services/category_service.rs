use std::collections::HashMap;

use anyhow::Context;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::ReturnDocument, Collection, Database};

use crate::errors::{AppError, AppResult};
use crate::models::category::{Category, CategoryRequest};
use crate::models::published::CategorySummary;
use crate::models::{new_id, now_millis};
use crate::services::{is_duplicate_key, CATEGORIES};
use crate::utils::slug::slugify;

fn duplicate() -> AppError {
    AppError::Conflict("Category already exists".to_string())
}

pub struct CategoryService {
    categories: Collection<Category>,
}

impl CategoryService {
    pub fn new(mongo: Database) -> Self {
        Self {
            categories: mongo.collection::<Category>(CATEGORIES),
        }
    }

    fn slug_for(name: &str) -> AppResult<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::Validation(
                "Name must contain letters or digits".to_string(),
            ));
        }
        Ok(slug)
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        Ok(self
            .categories
            .find(doc! {})
            .sort(doc! { "name": 1 })
            .await
            .context("Failed to list categories")?
            .try_collect()
            .await
            .context("Failed to read categories")?)
    }

    pub async fn get(&self, category_id: &str) -> AppResult<Category> {
        self.categories
            .find_one(doc! { "_id": category_id })
            .await
            .context("Failed to load category")?
            .ok_or_else(|| AppError::not_found("Category"))
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<Category> {
        self.categories
            .find_one(doc! { "slug": slug })
            .await
            .context("Failed to load category")?
            .ok_or_else(|| AppError::not_found("Category"))
    }

    /// Accepts either a slug or an id.
    pub async fn resolve_id(&self, slug_or_id: &str) -> AppResult<String> {
        let found = self
            .categories
            .find_one(doc! { "$or": [ { "slug": slug_or_id }, { "_id": slug_or_id } ] })
            .await
            .context("Failed to resolve category")?;
        Ok(found.map(|c| c.id).unwrap_or_else(|| slug_or_id.to_string()))
    }

    pub async fn create(&self, req: CategoryRequest) -> AppResult<Category> {
        let name = req.name.trim().to_string();
        let slug = Self::slug_for(&name)?;
        if self
            .categories
            .find_one(doc! { "slug": &slug })
            .await
            .context("Failed to check category slug")?
            .is_some()
        {
            return Err(duplicate());
        }

        let now = now_millis();
        let category = Category {
            id: new_id(),
            name,
            slug,
            created_at: now,
            updated_at: now,
        };
        self.categories.insert_one(&category).await.map_err(|e| {
            if is_duplicate_key(&e) {
                duplicate()
            } else {
                AppError::from(e)
            }
        })?;
        tracing::info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    pub async fn update(&self, category_id: &str, req: CategoryRequest) -> AppResult<Category> {
        let current = self.get(category_id).await?;
        let name = req.name.trim().to_string();
        if current.name == name {
            return Err(AppError::NoChange);
        }
        let slug = Self::slug_for(&name)?;

        self.categories
            .find_one_and_update(
                doc! { "_id": category_id },
                doc! { "$set": { "name": &name, "slug": &slug, "updatedAt": now_millis() } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    duplicate()
                } else {
                    AppError::from(e)
                }
            })?
            .ok_or_else(|| AppError::not_found("Category"))
    }

    pub async fn delete(&self, category_id: &str) -> AppResult<()> {
        let result = self
            .categories
            .delete_one(doc! { "_id": category_id })
            .await
            .context("Failed to delete category")?;
        if result.deleted_count == 0 {
            return Err(AppError::not_found("Category"));
        }
        tracing::info!(category_id, "Category deleted");
        Ok(())
    }

    pub async fn summaries(&self, ids: &[String]) -> AppResult<HashMap<String, CategorySummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let categories: Vec<Category> = self
            .categories
            .find(doc! { "_id": { "$in": ids } })
            .await
            .context("Failed to load categories")?
            .try_collect()
            .await
            .context("Failed to read categories")?;
        Ok(categories
            .into_iter()
            .map(|c| {
                (
                    c.id.clone(),
                    CategorySummary {
                        id: c.id,
                        name: c.name,
                        slug: c.slug,
                    },
                )
            })
            .collect())
    }
}
