use anyhow::Context;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    options::ReturnDocument,
    Collection, Database,
};

use crate::errors::{AppError, AppResult};
use crate::models::banner::{Banner, BannerListQuery, BannerRequest, BannerType};
use crate::models::{new_id, now_millis};
use crate::services::category_service::CategoryService;
use crate::services::BANNERS;

pub struct BannerService {
    mongo: Database,
    banners: Collection<Banner>,
}

impl BannerService {
    pub fn new(mongo: Database) -> Self {
        Self {
            banners: mongo.collection::<Banner>(BANNERS),
            mongo,
        }
    }

    async fn check_category(&self, req: &BannerRequest) -> AppResult<()> {
        if req.kind == BannerType::Category {
            if let Some(category_id) = req.category_id.as_deref() {
                CategoryService::new(self.mongo.clone()).get(category_id).await?;
            }
        }
        Ok(())
    }

    pub async fn list(&self, query: BannerListQuery) -> AppResult<Vec<Banner>> {
        let mut filter = Document::new();
        if let Some(kind) = query.kind {
            filter.insert("type", bson::to_bson(&kind).context("Failed to encode banner type")?);
        }
        Ok(self
            .banners
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to list banners")?
            .try_collect()
            .await
            .context("Failed to read banners")?)
    }

    pub async fn get(&self, banner_id: &str) -> AppResult<Banner> {
        self.banners
            .find_one(doc! { "_id": banner_id })
            .await
            .context("Failed to load banner")?
            .ok_or_else(|| AppError::not_found("Banner"))
    }

    pub async fn create(&self, req: BannerRequest) -> AppResult<Banner> {
        let req = req.normalized()?;
        self.check_category(&req).await?;

        let now = now_millis();
        let banner = Banner {
            id: new_id(),
            kind: req.kind,
            sale_position: req.sale_position,
            category_id: req.category_id,
            image: req.image,
            created_at: now,
            updated_at: now,
        };
        self.banners
            .insert_one(&banner)
            .await
            .context("Failed to insert banner")?;
        tracing::info!(banner_id = %banner.id, "Banner created");
        Ok(banner)
    }

    pub async fn update(&self, banner_id: &str, req: BannerRequest) -> AppResult<Banner> {
        let req = req.normalized()?;
        self.check_category(&req).await?;
        let current = self.get(banner_id).await?;
        if current.kind == req.kind
            && current.sale_position == req.sale_position
            && current.category_id == req.category_id
            && current.image == req.image
        {
            return Err(AppError::NoChange);
        }

        let set = doc! {
            "type": bson::to_bson(&req.kind).context("Failed to encode banner")?,
            "salePosition": bson::to_bson(&req.sale_position).context("Failed to encode banner")?,
            "categoryId": req.category_id,
            "image": bson::to_bson(&req.image).context("Failed to encode banner")?,
            "updatedAt": now_millis(),
        };
        self.banners
            .find_one_and_update(doc! { "_id": banner_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update banner")?
            .ok_or_else(|| AppError::not_found("Banner"))
    }

    pub async fn delete(&self, banner_id: &str) -> AppResult<Banner> {
        let banner = self
            .banners
            .find_one_and_delete(doc! { "_id": banner_id })
            .await
            .context("Failed to delete banner")?
            .ok_or_else(|| AppError::not_found("Banner"))?;
        tracing::info!(banner_id, "Banner deleted");
        Ok(banner)
    }
}
