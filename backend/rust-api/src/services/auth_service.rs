use anyhow::Context;
use bcrypt::{hash, verify, DEFAULT_COST};
use mongodb::{bson::doc, Collection};
use rand::Rng;

use crate::errors::{AppError, AppResult};
use crate::middlewares::auth::JwtClaims;
use crate::models::user::{
    ActivateRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, User, UserRole,
    DEFAULT_PICTURE,
};
use crate::models::{new_id, now_millis};
use crate::services::{is_duplicate_key, AppState, USERS};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;

/// Six upper-case alphanumerics for activation and password reset.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password using bcrypt with cost 12
pub fn hash_password(password: &str) -> AppResult<String> {
    Ok(hash(password, DEFAULT_COST).context("Failed to hash password")?)
}

pub fn verify_password(password: &str, hashed: &str) -> AppResult<bool> {
    Ok(verify(password, hashed).context("Failed to verify password")?)
}

pub struct AuthService<'a> {
    state: &'a AppState,
    users: Collection<User>,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            users: state.mongo.collection::<User>(USERS),
            state,
        }
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .find_one(doc! { "email": email })
            .await
            .context("Failed to look up user by email")?)
    }

    /// Creates an inactive account and emails its activation code.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<User> {
        let email = normalize_email(&req.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "Email provided is taken, please use another one".to_string(),
            ));
        }

        let now = now_millis();
        let code = generate_code();
        let user = User {
            id: new_id(),
            name: req.name.trim().to_string(),
            email: email.clone(),
            password: hash_password(&req.password)?,
            picture: DEFAULT_PICTURE.to_string(),
            role: vec![UserRole::Subscriber],
            active: false,
            active_code: Some(code.clone()),
            password_reset_code: None,
            courses: Vec::new(),
            instructor_information: None,
            stripe_account_id: None,
            stripe_seller: None,
            stripe_session: None,
            created_at: now,
            updated_at: now,
        };

        self.users.insert_one(&user).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict("Email provided is taken, please use another one".to_string())
            } else {
                AppError::from(e)
            }
        })?;
        tracing::info!(user_id = %user.id, "User registered");

        let link = format!(
            "{}/activation/{}",
            self.state.config.client_url.trim_end_matches('/'),
            code
        );
        if let Err(e) = self
            .state
            .email
            .send_activation_email(&email, &user.name, &code, &link)
            .await
        {
            tracing::warn!(user_id = %user.id, "Activation email not sent: {:#}", e);
        }

        Ok(user)
    }

    pub async fn activate(&self, req: ActivateRequest) -> AppResult<User> {
        let email = normalize_email(&req.email);
        let code = req.code.trim().to_uppercase();
        let user = self
            .find_by_email(&email)
            .await?
            .filter(|u| u.active_code.as_deref() == Some(code.as_str()))
            .ok_or_else(|| AppError::Validation("Activation code is not valid".to_string()))?;

        self.users
            .update_one(
                doc! { "_id": &user.id },
                doc! { "$set": { "active": true, "active_code": null, "updatedAt": now_millis() } },
            )
            .await
            .context("Failed to activate user")?;

        tracing::info!(user_id = %user.id, "User activated");
        Ok(User {
            active: true,
            active_code: None,
            ..user
        })
    }

    /// Verifies credentials and issues a session token.
    pub async fn login(&self, req: LoginRequest) -> AppResult<(User, String)> {
        let email = normalize_email(&req.email);
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Validation("No user found".to_string()))?;

        if !verify_password(&req.password, &user.password)? {
            tracing::warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AppError::Validation("Wrong password".to_string()));
        }
        if !user.active {
            return Err(AppError::Validation(
                "This user hasn't been activated yet".to_string(),
            ));
        }

        let token = self.issue_token(&user)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user, token))
    }

    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        let claims = JwtClaims::new(&user.id, &user.role, self.state.config.token_ttl_days);
        self.state
            .jwt
            .generate_token(&claims)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
    }

    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let code = generate_code();
        self.users
            .update_one(
                doc! { "_id": &user.id },
                doc! { "$set": { "passwordResetCode": &code, "updatedAt": now_millis() } },
            )
            .await
            .context("Failed to store reset code")?;

        self.state
            .email
            .send_password_reset_email(&email, &user.name, &code)
            .await
            .map_err(|e| AppError::Upstream(format!("Could not send reset email: {}", e)))?;
        tracing::info!(user_id = %user.id, "Password reset code issued");
        Ok(())
    }

    pub async fn reset_password(&self, req: ResetPasswordRequest) -> AppResult<()> {
        let email = normalize_email(&req.email);
        let code = req.code.trim().to_uppercase();
        let hashed = hash_password(&req.new_password)?;

        // Single-use: the code is cleared in the same write that checks it.
        let result = self
            .users
            .update_one(
                doc! { "email": &email, "passwordResetCode": &code },
                doc! { "$set": {
                    "password": hashed,
                    "passwordResetCode": null,
                    "updatedAt": now_millis(),
                } },
            )
            .await
            .context("Failed to reset password")?;

        if result.matched_count == 0 {
            return Err(AppError::Validation("Reset code is not valid".to_string()));
        }
        tracing::info!("Password reset for {}", email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_uppercase_alphanumerics() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash("secret1", 4).unwrap();
        assert!(verify_password("secret1", &hashed).unwrap());
        assert!(!verify_password("secret2", &hashed).unwrap());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Lan@Example.COM "), "lan@example.com");
    }
}
