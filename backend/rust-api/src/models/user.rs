use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::enrollment::{Enrollment, PendingCheckout};
use crate::models::membership::{InstructorInformation, SocialLinks};

pub const DEFAULT_PICTURE: &str = "/avatar.png";

/// User model stored in MongoDB "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    /// bcrypt hash
    pub password: String,
    #[serde(default = "default_picture")]
    pub picture: String,
    #[serde(default = "default_roles")]
    pub role: Vec<UserRole>,
    #[serde(default)]
    pub active: bool,
    pub active_code: Option<String>,
    #[serde(rename = "passwordResetCode")]
    pub password_reset_code: Option<String>,
    /// Enrollment ledger.
    #[serde(default)]
    pub courses: Vec<Enrollment>,
    pub instructor_information: Option<InstructorInformation>,
    pub stripe_account_id: Option<String>,
    pub stripe_seller: Option<serde_json::Value>,
    #[serde(rename = "stripeSession")]
    pub stripe_session: Option<PendingCheckout>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

fn default_picture() -> String {
    DEFAULT_PICTURE.to_string()
}

fn default_roles() -> Vec<UserRole> {
    vec![UserRole::Subscriber]
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserRole {
    #[default]
    Subscriber,
    Instructor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Subscriber => "Subscriber",
            UserRole::Instructor => "Instructor",
            UserRole::Admin => "Admin",
        }
    }
}

impl User {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role.contains(&role)
    }

    pub fn enrollment(&self, course_id: &str) -> Option<&Enrollment> {
        self.courses.iter().find(|e| e.course_id == course_id)
    }
}

/// User profile returned to client (without sensitive data)
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
    pub role: Vec<UserRole>,
    pub active: bool,
    pub courses: Vec<Enrollment>,
    pub instructor_information: Option<InstructorInformation>,
    pub stripe_connected: bool,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            stripe_connected: user.stripe_account_id.is_some(),
            id: user.id,
            name: user.name,
            email: user.email,
            picture: user.picture,
            role: user.role,
            active: user.active,
            courses: user.courses,
            instructor_information: user.instructor_information,
            created_at: user.created_at,
        }
    }
}

/// Request to register a new user
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, max = 64, message = "Password must be 6-64 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ActivateRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(equal = 6, message = "Activation code has 6 characters"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(equal = 6, message = "Reset code has 6 characters"))]
    pub code: String,
    #[serde(rename = "newPassword")]
    #[validate(length(min = 6, max = 64, message = "Password must be 6-64 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditPasswordRequest {
    #[serde(rename = "oldPassword")]
    #[validate(length(min = 1))]
    pub old_password: String,
    #[serde(rename = "newPassword")]
    #[validate(length(min = 6, max = 64, message = "Password must be 6-64 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BecomeInstructorRequest {
    #[validate(length(min = 1, max = 1000))]
    pub summary: String,
    #[validate(length(min = 1, max = 200))]
    pub position: String,
    #[validate(range(max = 80))]
    pub yoe: Option<u32>,
    #[serde(default)]
    pub social: SocialLinks,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let user: User = serde_json::from_value(serde_json::json!({
            "_id": "u1",
            "name": "Lan",
            "email": "lan@example.com",
            "password": "hash",
            "createdAt": 1,
            "updatedAt": 1
        }))
        .unwrap();
        assert_eq!(user.picture, DEFAULT_PICTURE);
        assert_eq!(user.role, vec![UserRole::Subscriber]);
        assert!(!user.active);
        assert!(user.courses.is_empty());
    }

    #[test]
    fn profile_hides_credentials() {
        let user = User {
            id: "u1".into(),
            name: "Lan".into(),
            email: "lan@example.com".into(),
            password: "hash".into(),
            picture: DEFAULT_PICTURE.into(),
            role: vec![UserRole::Subscriber, UserRole::Instructor],
            active: true,
            active_code: Some("ABC123".into()),
            password_reset_code: None,
            courses: vec![],
            instructor_information: None,
            stripe_account_id: Some("acct_1".into()),
            stripe_seller: None,
            stripe_session: None,
            created_at: 1,
            updated_at: 1,
        };
        assert!(user.has_role(UserRole::Instructor));
        let json = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("active_code").is_none());
        assert_eq!(json["stripe_connected"], true);
        assert_eq!(json["role"][1], "Instructor");
    }
}
