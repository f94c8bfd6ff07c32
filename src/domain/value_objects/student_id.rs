use serde::{Deserialize, Serialize};
use std::fmt;

/// 出欠レコードの所有者（生徒）を表す識別子
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudentId(String);

impl StudentId {
    pub fn new(value: String) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Student ID cannot be empty".to_string());
        }
        Ok(())
    }
}

impl TryFrom<String> for StudentId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StudentId> for String {
    fn from(value: StudentId) -> Self {
        value.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_ids() {
        assert!(StudentId::new("  ".into()).is_err());
        assert_eq!(StudentId::new("student-1".into()).unwrap().as_str(), "student-1");
    }

    #[test]
    fn deserialization_validates() {
        let parsed: Result<StudentId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }
}
