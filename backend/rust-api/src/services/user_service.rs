use std::collections::HashMap;

use anyhow::Context;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document, Regex},
    Collection, Database,
};

use crate::errors::{AppError, AppResult};
use crate::metrics::track_db_operation;
use crate::models::published::UserSummary;
use crate::models::user::{EditPasswordRequest, User, UserListQuery, UserProfile};
use crate::models::{now_millis, regex_literal, PageQuery, Paginated};
use crate::services::auth_service::{hash_password, verify_password};
use crate::services::USERS;

const DEFAULT_PAGE_SIZE: u64 = 20;

pub struct UserService {
    users: Collection<User>,
}

impl UserService {
    pub fn new(mongo: Database) -> Self {
        Self {
            users: mongo.collection::<User>(USERS),
        }
    }

    pub async fn get(&self, user_id: &str) -> AppResult<User> {
        track_db_operation("find_one", USERS, self.users.find_one(doc! { "_id": user_id }))
            .await
            .context("Failed to load user")?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn edit_name(&self, user_id: &str, name: &str) -> AppResult<UserProfile> {
        let name = name.trim();
        let user = self.get(user_id).await?;
        if user.name == name {
            return Err(AppError::NoChange);
        }
        self.users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "name": name, "updatedAt": now_millis() } },
            )
            .await
            .context("Failed to update profile")?;
        Ok(UserProfile::from(User {
            name: name.to_string(),
            ..user
        }))
    }

    pub async fn edit_password(&self, user_id: &str, req: EditPasswordRequest) -> AppResult<()> {
        let user = self.get(user_id).await?;
        if !verify_password(&req.old_password, &user.password)? {
            return Err(AppError::Validation("Old password is not correct".to_string()));
        }
        if req.old_password == req.new_password {
            return Err(AppError::NoChange);
        }
        self.users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "password": hash_password(&req.new_password)?, "updatedAt": now_millis() } },
            )
            .await
            .context("Failed to update password")?;
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    pub async fn list(&self, query: UserListQuery) -> AppResult<Paginated<UserProfile>> {
        let mut filter = Document::new();
        if let Some(name) = query.name.as_deref().filter(|n| !n.trim().is_empty()) {
            let regex = Regex {
                pattern: regex_literal(name),
                options: "i".to_string(),
            };
            filter.insert("$or", vec![doc! { "name": &regex }, doc! { "email": &regex }]);
        }
        if let Some(role) = query.role {
            filter.insert("role", role.as_str());
        }

        let paging = PageQuery {
            page: query.page,
            limit: query.limit,
        };
        let (_, limit) = paging.resolve(DEFAULT_PAGE_SIZE);

        let total_count = self
            .users
            .count_documents(filter.clone())
            .await
            .context("Failed to count users")?;
        let users: Vec<User> = self
            .users
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .skip(paging.skip(DEFAULT_PAGE_SIZE))
            .limit(limit as i64)
            .await
            .context("Failed to query users")?
            .try_collect()
            .await
            .context("Failed to read users")?;

        Ok(Paginated {
            paginated_results: users.into_iter().map(UserProfile::from).collect(),
            total_count,
        })
    }

    /// Public name and picture for each id that exists.
    pub async fn summaries(&self, ids: &[String]) -> AppResult<HashMap<String, UserSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users: Vec<User> = track_db_operation(
            "find",
            USERS,
            async {
                self.users
                    .find(doc! { "_id": { "$in": ids } })
                    .await?
                    .try_collect()
                    .await
            },
        )
        .await
        .context("Failed to load user summaries")?;

        Ok(users
            .into_iter()
            .map(|u| {
                (
                    u.id.clone(),
                    UserSummary {
                        id: u.id,
                        name: u.name,
                        picture: u.picture,
                    },
                )
            })
            .collect())
    }
}
