use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::course::MediaRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerType {
    Home,
    Sale,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalePosition {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Banner {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BannerType,
    #[serde(rename = "salePosition")]
    pub sale_position: Option<SalePosition>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<String>,
    pub image: MediaRef,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BannerRequest {
    #[serde(rename = "type")]
    pub kind: BannerType,
    #[serde(rename = "salePosition")]
    pub sale_position: Option<SalePosition>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<String>,
    pub image: MediaRef,
}

impl BannerRequest {
    /// Drops fields that do not apply to the banner type and checks required ones.
    pub fn normalized(mut self) -> AppResult<Self> {
        match self.kind {
            BannerType::Home => {
                self.sale_position = None;
                self.category_id = None;
            }
            BannerType::Sale => {
                if self.sale_position.is_none() {
                    return Err(AppError::Validation(
                        "Sale banners need a salePosition".to_string(),
                    ));
                }
                self.category_id = None;
            }
            BannerType::Category => {
                if self.category_id.as_deref().map_or(true, str::is_empty) {
                    return Err(AppError::Validation(
                        "Category banners need a categoryId".to_string(),
                    ));
                }
                self.sale_position = None;
            }
        }
        if self.image.location.trim().is_empty() {
            return Err(AppError::Validation("Banner image is required".to_string()));
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct BannerListQuery {
    #[serde(rename = "type")]
    pub kind: Option<BannerType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: BannerType) -> BannerRequest {
        BannerRequest {
            kind,
            sale_position: Some(SalePosition::Left),
            category_id: Some("cat".into()),
            image: MediaRef {
                bucket: "b".into(),
                key: "k".into(),
                location: "https://cdn/k".into(),
            },
        }
    }

    #[test]
    fn home_banner_drops_extra_fields() {
        let banner = request(BannerType::Home).normalized().unwrap();
        assert!(banner.sale_position.is_none());
        assert!(banner.category_id.is_none());
    }

    #[test]
    fn sale_banner_requires_position() {
        let mut req = request(BannerType::Sale);
        req.sale_position = None;
        assert!(req.normalized().is_err());
    }

    #[test]
    fn category_banner_requires_category() {
        let mut req = request(BannerType::Category);
        req.category_id = Some(String::new());
        assert!(req.normalized().is_err());
        let ok = request(BannerType::Category).normalized().unwrap();
        assert!(ok.sale_position.is_none());
    }
}
