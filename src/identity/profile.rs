use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;
pub const MAX_STATUS_LENGTH: usize = 256;
pub const MAX_AVATAR_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub display_name: String,
    pub status: Option<String>,
    /// Base64 image data or URL
    pub avatar: Option<String>,
}

/// Partial profile change sent by the host.
///
/// Absent fields are left alone; an empty `status` or `avatar` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Profile {
    pub fn new(display_name: impl Into<String>) -> Result<Self> {
        let profile = Self {
            display_name: display_name.into(),
            status: None,
            avatar: None,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.display_name.trim();
        if name.is_empty() {
            return Err(Error::ProfileUpdateFailed("Display name cannot be empty".into()));
        }
        if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
            return Err(Error::ProfileUpdateFailed(format!(
                "Display name too long: max {} characters",
                MAX_DISPLAY_NAME_LENGTH
            )));
        }
        if self.status.as_ref().map_or(false, |s| s.chars().count() > MAX_STATUS_LENGTH) {
            return Err(Error::ProfileUpdateFailed(format!(
                "Status too long: max {} characters",
                MAX_STATUS_LENGTH
            )));
        }
        if self.avatar.as_ref().map_or(false, |a| a.len() > MAX_AVATAR_SIZE) {
            return Err(Error::ProfileUpdateFailed(format!(
                "Avatar too large: max {} bytes",
                MAX_AVATAR_SIZE
            )));
        }
        Ok(())
    }

    /// Apply `update` as a whole, or not at all.
    pub fn apply(&mut self, update: ProfileUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(name) = update.display_name {
            next.display_name = name;
        }
        if let Some(status) = update.status {
            next.status = Some(status).filter(|s| !s.is_empty());
        }
        if let Some(avatar) = update.avatar {
            next.avatar = Some(avatar).filter(|a| !a.is_empty());
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_validates_name() {
        assert!(Profile::new("Alice").is_ok());
        assert!(Profile::new("   ").is_err());
        assert!(Profile::new("x".repeat(MAX_DISPLAY_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_apply_partial_update() {
        let mut profile = Profile::new("Alice").unwrap();
        profile
            .apply(ProfileUpdate {
                status: Some("Exploring".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(profile.display_name, "Alice");
        assert_eq!(profile.status.as_deref(), Some("Exploring"));

        profile
            .apply(ProfileUpdate {
                status: Some(String::new()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(profile.status, None);
    }

    #[test]
    fn test_rejected_update_leaves_profile_untouched() {
        let mut profile = Profile::new("Alice").unwrap();
        let err = profile
            .apply(ProfileUpdate {
                display_name: Some("Bob".into()),
                status: Some("s".repeat(MAX_STATUS_LENGTH + 1)),
                avatar: None,
            })
            .unwrap_err();
        assert_eq!(err.code(), 205);
        assert_eq!(profile.display_name, "Alice");
    }
}
