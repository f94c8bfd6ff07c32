use super::local_store::{Collection, LocalNamespace};
use crate::domain::entities::UserProfile;
use crate::domain::value_objects::StudentId;
use crate::infrastructure::storage::StorageError;
use crate::shared::error::AppError;
use std::collections::BTreeMap;
use std::sync::Mutex;

type ProfileMap = BTreeMap<String, UserProfile>;

/// 所有者 ID ごとのプロフィールキャッシュ
pub struct ProfileCache {
    namespace: LocalNamespace,
    gate: Mutex<()>,
}

impl ProfileCache {
    pub fn new(namespace: LocalNamespace) -> Self {
        Self {
            namespace,
            gate: Mutex::new(()),
        }
    }

    fn update<F>(&self, apply: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut ProfileMap),
    {
        let _guard = self
            .gate
            .lock()
            .map_err(|_| AppError::Storage(StorageError::LockPoisoned))?;
        let mut profiles: ProfileMap = self.namespace.load(Collection::UserProfiles)?;
        apply(&mut profiles);
        self.namespace.save(Collection::UserProfiles, &profiles)
    }

    pub fn save(&self, profile: UserProfile) -> Result<(), AppError> {
        self.update(|profiles| {
            profiles.insert(profile.id.as_str().to_string(), profile);
        })
    }

    pub fn get(&self, id: &StudentId) -> Result<Option<UserProfile>, AppError> {
        let profiles: ProfileMap = self.namespace.load(Collection::UserProfiles)?;
        Ok(profiles.get(id.as_str()).cloned())
    }

    pub fn remove(&self, id: &StudentId) -> Result<(), AppError> {
        self.update(|profiles| {
            profiles.remove(id.as_str());
        })
    }

    /// 通知文面に使う表示名。未登録なら ID をそのまま使う。
    pub fn display_name(&self, id: &StudentId) -> String {
        match self.get(id) {
            Ok(Some(profile)) if !profile.name.trim().is_empty() => profile.name,
            Ok(_) => id.to_string(),
            Err(err) => {
                tracing::warn!(
                    target: "attendance::storage",
                    student_id = %id,
                    error = %err,
                    "profile lookup failed"
                );
                id.to_string()
            }
        }
    }
}
