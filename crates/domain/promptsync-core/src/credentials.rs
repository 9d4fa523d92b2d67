use serde::{Deserialize, Serialize};

/// Connection parameters for one WebDAV endpoint. Read-only to the engine.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub sync_path: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("sync_path", &self.sync_path)
            .finish()
    }
}

impl Credentials {
    /// Server URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.server_url.trim().trim_end_matches('/')
    }

    /// Sync path with exactly one leading slash.
    pub fn document_path(&self) -> String {
        normalize_path(&self.sync_path)
    }
}

/// Settings fields that must be present before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("WebDAV settings are incomplete. Missing: {}", .fields.join(", "))]
pub struct MissingSettings {
    pub fields: Vec<&'static str>,
}

/// Durable WebDAV settings as persisted by the settings form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDavSettings {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_sync_path")]
    pub sync_path: String,
    #[serde(default)]
    pub auto_sync_enabled: bool,
}

fn default_sync_path() -> String {
    promptsync_config::DEFAULT_SYNC_PATH.to_string()
}

impl Default for WebDavSettings {
    fn default() -> Self {
        Self {
            server_url: None,
            username: None,
            password: None,
            sync_path: default_sync_path(),
            auto_sync_enabled: false,
        }
    }
}

impl std::fmt::Debug for WebDavSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavSettings")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("sync_path", &self.sync_path)
            .field("auto_sync_enabled", &self.auto_sync_enabled)
            .finish()
    }
}

impl WebDavSettings {
    /// Credentials for the engine, or the list of fields still missing.
    ///
    /// Server URL and username are trimmed; the password is taken verbatim.
    /// An empty sync path falls back to the default.
    pub fn credentials(&self) -> Result<Credentials, MissingSettings> {
        let server_url = non_empty(self.server_url.as_deref());
        let username = non_empty(self.username.as_deref());
        let password = self.password.clone().filter(|p| !p.is_empty());

        let mut missing = Vec::new();
        if server_url.is_none() {
            missing.push("serverUrl");
        }
        if username.is_none() {
            missing.push("username");
        }
        if password.is_none() {
            missing.push("password");
        }

        match (server_url, username, password) {
            (Some(server_url), Some(username), Some(password)) => Ok(Credentials {
                server_url,
                username,
                password,
                sync_path: non_empty(Some(&self.sync_path)).unwrap_or_else(default_sync_path),
            }),
            _ => Err(MissingSettings { fields: missing }),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> WebDavSettings {
        WebDavSettings {
            server_url: Some(" https://dav.example.com/remote.php/dav/ ".into()),
            username: Some("alice".into()),
            password: Some("wonderland".into()),
            ..WebDavSettings::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = WebDavSettings::default();
        assert_eq!(settings.sync_path, "/quick-prompt/prompts.json");
        assert!(!settings.auto_sync_enabled);
        assert!(!settings.is_configured());
    }

    #[test]
    fn credentials_report_every_missing_field() {
        let err = WebDavSettings {
            username: Some("  ".into()),
            ..WebDavSettings::default()
        }
        .credentials()
        .unwrap_err();
        assert_eq!(err.fields, vec!["serverUrl", "username", "password"]);
        assert!(err.to_string().contains("serverUrl, username, password"));
    }

    #[test]
    fn credentials_trim_and_normalize() {
        let creds = complete().credentials().unwrap();
        assert_eq!(creds.server_url, "https://dav.example.com/remote.php/dav/");
        assert_eq!(creds.base_url(), "https://dav.example.com/remote.php/dav");
        assert_eq!(creds.document_path(), "/quick-prompt/prompts.json");
    }

    #[test]
    fn empty_sync_path_falls_back_to_default() {
        let mut settings = complete();
        settings.sync_path = "   ".into();
        let creds = settings.credentials().unwrap();
        assert_eq!(creds.sync_path, "/quick-prompt/prompts.json");
    }

    #[test]
    fn relative_sync_path_gets_leading_slash() {
        let mut creds = complete().credentials().unwrap();
        creds.sync_path = "backup/prompts.json".into();
        assert_eq!(creds.document_path(), "/backup/prompts.json");
    }

    #[test]
    fn debug_output_redacts_password() {
        let settings = complete();
        let creds = settings.credentials().unwrap();
        assert!(!format!("{settings:?}").contains("wonderland"));
        assert!(!format!("{creds:?}").contains("wonderland"));
        assert!(format!("{creds:?}").contains("[REDACTED]"));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: WebDavSettings =
            serde_json::from_str(r#"{"serverUrl":"https://dav.example.com"}"#).unwrap();
        assert_eq!(settings.sync_path, "/quick-prompt/prompts.json");
        assert!(!settings.auto_sync_enabled);
    }
}
