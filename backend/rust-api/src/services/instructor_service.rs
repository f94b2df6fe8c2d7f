use anyhow::Context;
use mongodb::{
    bson::{self, doc},
    options::ReturnDocument,
    Collection,
};

use crate::errors::{AppError, AppResult};
use crate::models::membership::InstructorInformation;
use crate::models::now_millis;
use crate::models::user::{BecomeInstructorRequest, User, UserRole};
use crate::services::user_service::UserService;
use crate::services::{AppState, USERS};

pub struct InstructorService<'a> {
    state: &'a AppState,
    users: Collection<User>,
}

impl<'a> InstructorService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            users: state.mongo.collection::<User>(USERS),
            state,
        }
    }

    async fn update_user(&self, user_id: &str, update: bson::Document) -> AppResult<User> {
        self.users
            .find_one_and_update(doc! { "_id": user_id }, update)
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update user")?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Stores the instructor profile and grants the role. Membership fields survive.
    pub async fn become_instructor(&self, user_id: &str, req: BecomeInstructorRequest) -> AppResult<User> {
        let current = UserService::new(self.state.mongo.clone()).get(user_id).await?;
        let previous = current.instructor_information.unwrap_or_default();
        let info = InstructorInformation {
            summary: req.summary.trim().to_string(),
            position: req.position.trim().to_string(),
            yoe: req.yoe,
            social: req.social,
            ..previous
        };
        let info = bson::to_bson(&info).context("Failed to encode instructor profile")?;

        let user = self
            .update_user(
                user_id,
                doc! {
                    "$set": { "instructor_information": info, "updatedAt": now_millis() },
                    "$addToSet": { "role": UserRole::Instructor.as_str() },
                },
            )
            .await?;
        tracing::info!(user_id, "User became an instructor");
        Ok(user)
    }

    /// Returns an onboarding link, creating the connected account on first use.
    pub async fn stripe_onboarding_link(&self, user_id: &str) -> AppResult<String> {
        let user = UserService::new(self.state.mongo.clone()).get(user_id).await?;
        let account_id = match user.stripe_account_id {
            Some(id) => id,
            None => {
                let id = self.state.stripe.create_express_account().await?;
                self.users
                    .update_one(
                        doc! { "_id": user_id },
                        doc! { "$set": { "stripe_account_id": &id, "updatedAt": now_millis() } },
                    )
                    .await
                    .context("Failed to store connected account")?;
                tracing::info!(user_id, account_id = %id, "Connected account created");
                id
            }
        };
        self.state.stripe.create_onboarding_link(&account_id).await
    }

    /// Records the seller profile once the connected account can take charges.
    pub async fn stripe_account_status(&self, user_id: &str) -> AppResult<User> {
        let user = UserService::new(self.state.mongo.clone()).get(user_id).await?;
        let account_id = user.stripe_account_id.ok_or_else(|| {
            AppError::InvalidOperation("Connect a Stripe account first".to_string())
        })?;

        let account = self.state.stripe.retrieve_account(&account_id).await?;
        let charges_enabled = account
            .get("charges_enabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if !charges_enabled {
            return Err(AppError::InvalidOperation(
                "Stripe account cannot take charges yet".to_string(),
            ));
        }

        let seller = bson::to_bson(&account).context("Failed to encode seller profile")?;
        self.update_user(
            user_id,
            doc! { "$set": { "stripe_seller": seller, "updatedAt": now_millis() } },
        )
        .await
    }
}
