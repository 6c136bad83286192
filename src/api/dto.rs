use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub phone_number: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
    pub phone_number: String,
    pub email: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("name", &self.name),
            ("username", &self.username),
            ("password", &self.password),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        if self.password != self.confirm_password {
            return Err("password confirmation does not match".to_string());
        }
        if !(10..=15).contains(&self.phone_number.len()) {
            return Err("phone number must be 10 to 15 characters".to_string());
        }
        if !self.email.contains('@') {
            return Err("email is not valid".to_string());
        }
        Ok(())
    }
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() || self.email.trim().is_empty() {
            return Err("username and email are required".to_string());
        }
        if self.password.as_deref().unwrap_or("") != self.confirm_password.as_deref().unwrap_or("") {
            return Err("password confirmation does not match".to_string());
        }
        Ok(())
    }
}

/// The uniform response envelope. Errors use the same shape with
/// `status: "error"` (rendered by `ApiError`).
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            message: "OK",
            data: Some(data),
            token: None,
        }
    }

    pub fn with_token(data: T, token: String) -> Self {
        Self {
            token: Some(token),
            ..Self::success(data)
        }
    }
}
