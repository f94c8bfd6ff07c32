use serde::{Deserialize, Serialize};
use std::fmt;

/// ゲート通過の向き。在席状態そのものではない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceType {
    #[serde(rename = "LOGIN")]
    Login,
    #[serde(rename = "LOGOUT")]
    Logout,
}

impl AttendanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceType::Login => "LOGIN",
            AttendanceType::Logout => "LOGOUT",
        }
    }

    /// 未知の値は `None`（スキーマの揺れは欠損として扱う）
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOGIN" => Some(AttendanceType::Login),
            "LOGOUT" => Some(AttendanceType::Logout),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            AttendanceType::Login => AttendanceType::Logout,
            AttendanceType::Logout => AttendanceType::Login,
        }
    }

    pub fn verb_phrase(&self) -> &'static str {
        match self {
            AttendanceType::Login => "arrived at",
            AttendanceType::Logout => "left",
        }
    }
}

impl fmt::Display for AttendanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_known_values() {
        assert_eq!(AttendanceType::parse("LOGIN"), Some(AttendanceType::Login));
        assert_eq!(AttendanceType::parse("LOGOUT"), Some(AttendanceType::Logout));
        assert_eq!(AttendanceType::parse("login"), None);
        assert_eq!(AttendanceType::parse("PRESENT"), None);
    }

    #[test]
    fn serializes_as_upper_case() {
        let json = serde_json::to_string(&AttendanceType::Logout).unwrap();
        assert_eq!(json, "\"LOGOUT\"");
    }
}
