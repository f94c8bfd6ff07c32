use crate::domain::value_objects::StudentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Student,
    Parent,
    Teacher,
    Admin,
}

/// 所有者ごとのプロフィールキャッシュのエントリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: StudentId,
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl UserProfile {
    pub fn student(id: StudentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: UserRole::Student,
            avatar_url: String::new(),
            school_id: None,
            grade: None,
            section: None,
            parent_id: None,
        }
    }
}
