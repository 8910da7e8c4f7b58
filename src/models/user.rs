use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

/// Closed set of roles. Stored and transported under the role names the
/// station staff know ("Admin", "Pump Attendant").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    #[serde(rename = "Pump Attendant")]
    PumpAttendant,
}

impl Role {
    pub fn from_name(name: &str) -> Option<Role> {
        match name {
            "Admin" => Some(Role::Admin),
            "Pump Attendant" => Some(Role::PumpAttendant),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::PumpAttendant => "Pump Attendant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub full_name: String,
    pub username: String,
    pub password_hash: String,
    pub mobile_no: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub mobile_no: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub user_id: Option<String>,
    pub full_name: Option<String>,
    pub mobile_no: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub user_id: String,
    pub full_name: String,
    pub username: String,
    pub mobile_no: String,
    pub role: &'static str,
    pub is_active: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        UserView {
            user_id: user
                ._id
                .map(|id| id.to_hex())
                .unwrap_or_default(),
            full_name: user.full_name.clone(),
            username: user.username.clone(),
            mobile_no: user.mobile_no.clone(),
            role: user.role.as_name(),
            is_active: user.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        for role in [Role::Admin, Role::PumpAttendant] {
            assert_eq!(Role::from_name(role.as_name()), Some(role));
        }
    }

    #[test]
    fn unknown_role_name_is_rejected() {
        assert_eq!(Role::from_name("Supervisor"), None);
        assert_eq!(Role::from_name("admin"), None);
    }

    #[test]
    fn role_serializes_as_display_name() {
        let json = serde_json::to_string(&Role::PumpAttendant).unwrap();
        assert_eq!(json, "\"Pump Attendant\"");
    }
}
