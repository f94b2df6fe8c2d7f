use anyhow::Context;
use mongodb::{bson::doc, options::IndexOptions, Client as MongoClient, Database, IndexModel};

use crate::config::Config;
use crate::middlewares::auth::JwtService;

pub mod auth_service;
pub mod banner_service;
pub mod category_service;
pub mod course_service;
pub mod email_service;
pub mod enrollment_service;
pub mod exchange_rate;
pub mod instructor_service;
pub mod object_storage;
pub mod payment_service;
pub mod qa_service;
pub mod review_service;
pub mod stripe_client;
pub mod user_service;
pub mod vnpay;

use email_service::EmailService;
use exchange_rate::ExchangeRateClient;
use object_storage::ObjectStorageClient;
use stripe_client::StripeClient;
use vnpay::VnpayGateway;

pub const USERS: &str = "users";
pub const COURSES: &str = "courses";
pub const REVIEWS: &str = "reviews";
pub const QAS: &str = "qas";
pub const CATEGORIES: &str = "categories";
pub const BANNERS: &str = "banners";
pub const PAYMENT_ORDERS: &str = "payment_orders";

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    /// Opened per use; rate limiting tolerates an unreachable server.
    pub redis: redis::Client,
    pub jwt: JwtService,
    pub stripe: StripeClient,
    pub exchange: ExchangeRateClient,
    pub vnpay: VnpayGateway,
    pub storage: Option<ObjectStorageClient>,
    pub email: EmailService,
}

impl AppState {
    /// Wires clients from config. Performs no network I/O.
    pub fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("Failed to build HTTP client")?;

        let storage = match config.object_storage.clone() {
            Some(settings) => Some(ObjectStorageClient::new(settings, http.clone())?),
            None => {
                tracing::warn!("Object storage is not configured; media uploads are disabled");
                None
            }
        };

        Ok(Self {
            jwt: JwtService::new(&config.jwt_secret),
            stripe: StripeClient::new(config.stripe.clone(), http.clone()),
            exchange: ExchangeRateClient::new(config.exchange.clone(), http),
            vnpay: VnpayGateway::new(config.vnpay.clone()),
            email: EmailService::new(config.email.clone()),
            storage,
            mongo,
            redis: redis_client,
            config,
        })
    }

    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let unique = [
            (USERS, "email"),
            (COURSES, "draft.slug"),
            (CATEGORIES, "slug"),
            (PAYMENT_ORDERS, "txn_ref"),
        ];
        for (collection, field) in unique {
            let model = IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.mongo
                .collection::<mongodb::bson::Document>(collection)
                .create_index(model)
                .await
                .with_context(|| format!("Failed to create index {}.{}", collection, field))?;
        }

        let lookups = [
            (REVIEWS, "courseId"),
            (QAS, "courseId"),
            (COURSES, "instructor"),
        ];
        for (collection, field) in lookups {
            let model = IndexModel::builder().keys(doc! { field: 1 }).build();
            self.mongo
                .collection::<mongodb::bson::Document>(collection)
                .create_index(model)
                .await
                .with_context(|| format!("Failed to create index {}.{}", collection, field))?;
        }

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }
}

/// Reports the unique-index violation a racing insert hit.
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        _ => false,
    }
}
