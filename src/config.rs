use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Name of the credentials file looked up in the home directory.
pub const CREDENTIALS_FILE: &str = ".hildebrand.credentials";

/// Environment variable overriding the credentials file location.
pub const CREDENTIALS_PATH_ENV: &str = "HILDEBRAND_CREDENTIALS";

/// One of the three values needed to log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    ApplicationId,
    Username,
    Password,
}

impl CredentialField {
    /// Resolution and error reporting order.
    pub const ALL: [CredentialField; 3] = [
        CredentialField::ApplicationId,
        CredentialField::Username,
        CredentialField::Password,
    ];

    /// Environment variable consulted for this field.
    ///
    /// On Windows `USERNAME` is the login name; unset it if it gets in the way.
    pub fn env_var(self) -> &'static str {
        self.file_key()
    }

    /// Key of this field in the credentials file (matched case-insensitively).
    pub fn file_key(self) -> &'static str {
        match self {
            CredentialField::ApplicationId => "APP_ID",
            CredentialField::Username => "USERNAME",
            CredentialField::Password => "PASSWORD",
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialField::ApplicationId => "application_id",
            CredentialField::Username => "username",
            CredentialField::Password => "password",
        })
    }
}

/// A fully resolved credential triple.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    application_id: String,
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(
        application_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("application_id", &self.application_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Explicitly supplied values. Any field left `None` (or empty) falls back to
/// the environment, then to the credentials file.
#[derive(Debug, Clone, Default)]
pub struct PartialCredentials {
    pub application_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl PartialCredentials {
    pub fn with_application_id(mut self, value: impl Into<String>) -> Self {
        self.application_id = Some(value.into());
        self
    }

    pub fn with_username(mut self, value: impl Into<String>) -> Self {
        self.username = Some(value.into());
        self
    }

    pub fn with_password(mut self, value: impl Into<String>) -> Self {
        self.password = Some(value.into());
        self
    }

    fn get(&self, field: CredentialField) -> Option<&str> {
        match field {
            CredentialField::ApplicationId => self.application_id.as_deref(),
            CredentialField::Username => self.username.as_deref(),
            CredentialField::Password => self.password.as_deref(),
        }
    }
}

impl From<Credentials> for PartialCredentials {
    fn from(c: Credentials) -> Self {
        Self {
            application_id: Some(c.application_id),
            username: Some(c.username),
            password: Some(c.password),
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

#[derive(Debug, Clone)]
enum FileLocation {
    Default,
    Path(PathBuf),
    Disabled,
}

/// Resolves credentials from, in order of precedence:
/// - explicit values
/// - environment variables `APP_ID` / `USERNAME` / `PASSWORD`
/// - the JSON credentials file (`HILDEBRAND_CREDENTIALS` or `~/.hildebrand.credentials`)
///
/// Each field falls back independently.
pub struct Resolver {
    env: EnvLookup,
    file: FileLocation,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// A resolver backed by the process environment and the default file.
    pub fn new() -> Self {
        Self {
            env: Box::new(|key: &str| std::env::var(key).ok()),
            file: FileLocation::Default,
        }
    }

    /// Replaces the environment lookup.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// Reads credentials from `path` instead of the default location.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = FileLocation::Path(path.into());
        self
    }

    /// Never consults a credentials file.
    pub fn without_config_file(mut self) -> Self {
        self.file = FileLocation::Disabled;
        self
    }

    pub fn resolve(&self, explicit: Option<&PartialCredentials>) -> Result<Credentials> {
        let explicit = explicit.cloned().unwrap_or_default();

        let mut values = CredentialField::ALL.map(|field| {
            non_empty(explicit.get(field).map(str::to_owned)).or_else(|| self.env_value(field))
        });

        if values.iter().any(Option::is_none) {
            if let Some(path) = self.credentials_path() {
                if path.exists() {
                    let file = read_credentials_file(&path)?;
                    for (slot, field) in values.iter_mut().zip(CredentialField::ALL) {
                        if slot.is_none() {
                            *slot = file.get(field);
                        }
                    }
                    if let Some(field) = first_missing(&values) {
                        let gap = if file.has_key(field) { "is empty" } else { "is missing" };
                        return Err(Error::ConfigParse {
                            path,
                            message: format!(
                                "key {} {} and no other source supplies {}",
                                field.file_key(),
                                gap,
                                field
                            ),
                        });
                    }
                } else {
                    log::debug!("no credentials file at {}", path.display());
                }
            }
        }

        if let Some(field) = first_missing(&values) {
            return Err(Error::MissingCredential(field));
        }

        let [application_id, username, password] = values.map(Option::unwrap_or_default);
        Ok(Credentials {
            application_id,
            username,
            password,
        })
    }

    fn env_value(&self, field: CredentialField) -> Option<String> {
        non_empty((self.env)(field.env_var()))
    }

    fn credentials_path(&self) -> Option<PathBuf> {
        match &self.file {
            FileLocation::Disabled => None,
            FileLocation::Path(p) => Some(p.clone()),
            FileLocation::Default => non_empty((self.env)(CREDENTIALS_PATH_ENV))
                .map(PathBuf::from)
                .or_else(|| dirs::home_dir().map(|home| home.join(CREDENTIALS_FILE))),
        }
    }
}

/// Resolves credentials using the process environment and the default file.
pub fn resolve(explicit: Option<&PartialCredentials>) -> Result<Credentials> {
    Resolver::new().resolve(explicit)
}

// Raw values as found in the file, blank ones included.
#[derive(Debug, Default)]
struct CredentialsFile {
    values: HashMap<&'static str, String>,
}

impl CredentialsFile {
    fn get(&self, field: CredentialField) -> Option<String> {
        non_empty(self.values.get(field.file_key()).cloned())
    }

    fn has_key(&self, field: CredentialField) -> bool {
        self.values.contains_key(field.file_key())
    }
}

fn read_credentials_file(path: &Path) -> Result<CredentialsFile> {
    log::debug!("reading credentials from {}", path.display());
    let config_error = |message: String| Error::ConfigParse {
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    let raw: Map<String, Value> =
        serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))?;

    let mut values = HashMap::new();
    for field in CredentialField::ALL {
        let name = field.file_key();
        // The upper-case spelling wins; other spellings must not collide.
        let entry = match raw.get_key_value(name) {
            Some(exact) => Some(exact),
            None => {
                let mut folded = raw.iter().filter(|(k, _)| k.eq_ignore_ascii_case(name));
                let first = folded.next();
                if let (Some((a, _)), Some((b, _))) = (first, folded.next()) {
                    return Err(config_error(format!("ambiguous keys {} and {}", a, b)));
                }
                first
            }
        };
        match entry {
            Some((_, Value::String(s))) => {
                values.insert(name, s.clone());
            }
            Some((_, Value::Null)) | None => {}
            Some((key, other)) => {
                return Err(config_error(format!(
                    "{} must be a string, found {}",
                    key, other
                )));
            }
        }
    }
    Ok(CredentialsFile { values })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_missing(values: &[Option<String>; 3]) -> Option<CredentialField> {
    values
        .iter()
        .zip(CredentialField::ALL)
        .find(|(v, _)| v.is_none())
        .map(|(_, field)| field)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    /// Credentials file in the temp dir, removed on drop.
    struct TempFile(PathBuf);

    impl TempFile {
        fn new(name: &str, contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "glowmarkt-config-{}-{}.json",
                std::process::id(),
                name
            ));
            std::fs::write(&path, contents).unwrap();
            TempFile(path)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn resolver_with_file(env: &[(&str, &str)], file: &TempFile) -> Resolver {
        Resolver::new()
            .with_env(env_from(env))
            .with_config_path(file.path())
    }

    #[test]
    fn explicit_beats_environment() {
        let resolver = Resolver::new()
            .with_env(env_from(&[("APP_ID", "Y"), ("USERNAME", "u"), ("PASSWORD", "p")]))
            .without_config_file();
        let explicit = PartialCredentials::default().with_application_id("X");

        let creds = resolver.resolve(Some(&explicit)).unwrap();
        assert_eq!(creds.application_id(), "X");
        assert_eq!(creds.username(), "u");
        assert_eq!(creds.password(), "p");
    }

    #[test]
    fn precedence_holds_for_every_field() {
        let full_file = json!({"APP_ID": "file-a", "USERNAME": "file-u", "PASSWORD": "file-p"});

        for field in CredentialField::ALL {
            let file = TempFile::new(&format!("precedence-{}", field), &full_file.to_string());
            let key = field.env_var();
            let explicit = match field {
                CredentialField::ApplicationId => PartialCredentials::default().with_application_id("arg"),
                CredentialField::Username => PartialCredentials::default().with_username("arg"),
                CredentialField::Password => PartialCredentials::default().with_password("arg"),
            };
            let pick = |creds: &Credentials| match field {
                CredentialField::ApplicationId => creds.application_id().to_string(),
                CredentialField::Username => creds.username().to_string(),
                CredentialField::Password => creds.password().to_string(),
            };

            let resolver = resolver_with_file(&[(key, "env")], &file);
            let creds = resolver.resolve(Some(&explicit)).unwrap();
            assert_eq!(pick(&creds), "arg", "explicit > env for {field}");

            let resolver = resolver_with_file(&[], &file);
            let creds = resolver.resolve(Some(&explicit)).unwrap();
            assert_eq!(pick(&creds), "arg", "explicit > file for {field}");

            let resolver = resolver_with_file(&[(key, "env")], &file);
            let creds = resolver.resolve(None).unwrap();
            assert_eq!(pick(&creds), "env", "env > file for {field}");

            let resolver = resolver_with_file(&[], &file);
            let creds = resolver.resolve(None).unwrap();
            assert_eq!(creds, Credentials::new("file-a", "file-u", "file-p"));
        }
    }

    #[test]
    fn environment_beats_file() {
        let file = TempFile::new(
            "env-beats-file",
            r#"{"APP_ID":"file-app","USERNAME":"file-user","PASSWORD":"file-pass"}"#,
        );
        let resolver = resolver_with_file(&[("USERNAME", "env-user")], &file);

        let creds = resolver.resolve(None).unwrap();
        assert_eq!(creds.application_id(), "file-app");
        assert_eq!(creds.username(), "env-user");
        assert_eq!(creds.password(), "file-pass");
    }

    #[test]
    fn file_alone_supplies_all_fields() {
        let file = TempFile::new("file-only", r#"{"APP_ID":"a","USERNAME":"u","PASSWORD":"p"}"#);
        let resolver = resolver_with_file(&[], &file);

        let creds = resolver.resolve(None).unwrap();
        assert_eq!(creds, Credentials::new("a", "u", "p"));
    }

    #[test]
    fn file_keys_are_case_insensitive() {
        let file = TempFile::new("lowercase", r#"{"app_id":"a","username":"u","password":"p"}"#);
        let resolver = resolver_with_file(&[], &file);

        assert_eq!(resolver.resolve(None).unwrap(), Credentials::new("a", "u", "p"));
    }

    #[test]
    fn upper_case_key_wins_over_other_spellings() {
        let file = TempFile::new(
            "mixed-case",
            r#"{"app_id":"lower","APP_ID":"upper","App_Id":"mixed","USERNAME":"u","PASSWORD":"p"}"#,
        );
        let resolver = resolver_with_file(&[], &file);

        assert_eq!(resolver.resolve(None).unwrap().application_id(), "upper");
    }

    #[test]
    fn colliding_spellings_without_upper_case_key_are_rejected() {
        let file = TempFile::new(
            "colliding",
            r#"{"app_id":"lower","App_Id":"mixed","USERNAME":"u","PASSWORD":"p"}"#,
        );
        let resolver = resolver_with_file(&[], &file);

        match resolver.resolve(None) {
            Err(Error::ConfigParse { message, .. }) => assert!(message.contains("ambiguous")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn empty_values_fall_through() {
        let resolver = Resolver::new()
            .with_env(env_from(&[("APP_ID", "env-app"), ("USERNAME", ""), ("PASSWORD", "p")]))
            .without_config_file();
        let explicit = PartialCredentials::default()
            .with_application_id("")
            .with_username("me");

        let creds = resolver.resolve(Some(&explicit)).unwrap();
        assert_eq!(creds.application_id(), "env-app");
        assert_eq!(creds.username(), "me");
    }

    #[test]
    fn nothing_configured_names_first_missing_field() {
        let resolver = Resolver::new()
            .with_env(env_from(&[]))
            .with_config_path(std::env::temp_dir().join("glowmarkt-does-not-exist.json"));

        match resolver.resolve(None) {
            Err(Error::MissingCredential(field)) => {
                assert_eq!(field, CredentialField::ApplicationId)
            }
            other => panic!("unexpected: {:?}", other),
        }

        let resolver = Resolver::new()
            .with_env(env_from(&[("APP_ID", "a")]))
            .without_config_file();
        match resolver.resolve(None) {
            Err(Error::MissingCredential(field)) => assert_eq!(field, CredentialField::Username),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let file = TempFile::new("invalid", "APP_ID = nope");
        let resolver = resolver_with_file(&[], &file);

        assert!(matches!(
            resolver.resolve(None),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn non_string_value_is_a_config_error() {
        let file = TempFile::new("number", r#"{"APP_ID":42,"USERNAME":"u","PASSWORD":"p"}"#);
        let resolver = resolver_with_file(&[], &file);

        match resolver.resolve(None) {
            Err(Error::ConfigParse { message, .. }) => assert!(message.contains("APP_ID")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn partial_file_without_other_source_is_a_config_error() {
        let file = TempFile::new("partial", r#"{"APP_ID":"a","USERNAME":"u"}"#);
        let resolver = resolver_with_file(&[], &file);

        match resolver.resolve(None) {
            Err(Error::ConfigParse { message, .. }) => {
                assert!(message.contains("PASSWORD is missing"), "{message}")
            }
            other => panic!("unexpected: {:?}", other),
        }

        let resolver = resolver_with_file(&[("PASSWORD", "p")], &file);
        assert_eq!(resolver.resolve(None).unwrap(), Credentials::new("a", "u", "p"));
    }

    #[test]
    fn blank_template_reports_empty_key() {
        let file = TempFile::new("template", r#"{"APP_ID":"","USERNAME":"","PASSWORD":""}"#);
        let resolver = resolver_with_file(&[], &file);

        match resolver.resolve(None) {
            Err(Error::ConfigParse { message, .. }) => {
                assert!(message.contains("APP_ID is empty"), "{message}")
            }
            other => panic!("unexpected: {:?}", other),
        }

        let resolver = resolver_with_file(&[("APP_ID", "a"), ("USERNAME", "u"), ("PASSWORD", "p")], &file);
        assert_eq!(resolver.resolve(None).unwrap(), Credentials::new("a", "u", "p"));
    }

    #[test]
    fn file_not_read_when_everything_is_supplied() {
        let file = TempFile::new("unread", "not json at all");
        let resolver = resolver_with_file(&[("APP_ID", "a"), ("USERNAME", "u"), ("PASSWORD", "p")], &file);

        assert!(resolver.resolve(None).is_ok());
    }

    #[test]
    fn path_override_comes_from_environment() {
        let file = TempFile::new("override", r#"{"APP_ID":"a","USERNAME":"u","PASSWORD":"p"}"#);
        let path_str = file.path().display().to_string();
        let resolver = Resolver::new().with_env(move |key| {
            (key == CREDENTIALS_PATH_ENV).then(|| path_str.clone())
        });

        assert_eq!(resolver.resolve(None).unwrap(), Credentials::new("a", "u", "p"));
    }

    #[test]
    fn temp_files_are_cleaned_up() {
        let path = {
            let file = TempFile::new("cleanup", "{}");
            assert!(file.path().exists());
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn debug_output_redacts_password() {
        let creds = Credentials::new("a", "u", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("redacted"));
    }
}
