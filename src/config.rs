use crate::{
    email_sender::TransportOptions,
    record::FieldPath,
    verification::{MailTemplate, URL_MARKER},
};
use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;

/// Errors when loading or validating verification configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyConfigError {
    /// Required environment variable was not provided.
    #[error("missing env var {0}")]
    MissingEnv(&'static str),

    /// An option was given a value of the wrong type.
    #[error("expected {option} to be a {expected}, got {got}")]
    Type {
        /// Option name.
        option: String,
        /// Expected JSON type.
        expected: &'static str,
        /// Actual JSON type.
        got: &'static str,
    },

    /// Configuration failed validation checks.
    #[error("invalid verify config: {0}")]
    Invalid(String),

    /// The mail transport could not be built from the configured options.
    #[error("mail transport setup failed: {0}")]
    Transport(String),
}

/// Option keys recognised by [`VerifyConfig::options_merge`].
pub const OPTION_KEYS: [&str; 10] = [
    "verification_url",
    "token_length",
    "pending_collection",
    "identity_field",
    "token_field",
    "ttl_secs",
    "verify_mail",
    "confirm_mail",
    "send_confirmation",
    "transport",
];

/// Verification workflow configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyConfig {
    /// Link sent to the user. Must contain `${URL}`, which is replaced with
    /// the token (default: `http://localhost:3000/verify/confirm?token=${URL}`)
    pub verification_url: String,

    /// Length of generated tokens (default: 48)
    pub token_length: usize,

    /// Name of the pending collection (default: "pending_records")
    pub pending_collection: String,

    /// Dotted path to the identity value, one or two levels (default: "email")
    pub identity_field: String,

    /// Field holding the token on pending records (default: "verification_token")
    pub token_field: String,

    /// Lifetime of a pending record (default: 24 hours)
    pub ttl: Duration,

    /// Template for the verification notice
    pub verify_mail: MailTemplate,

    /// Template for the confirmation notice
    pub confirm_mail: MailTemplate,

    /// Whether confirming a record sends a success notice (default: true)
    pub send_confirmation: bool,

    /// Options used to build the mail transport
    pub transport: TransportOptions,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            verification_url: "http://localhost:3000/verify/confirm?token=${URL}".to_string(),
            token_length: 48,
            pending_collection: "pending_records".to_string(),
            identity_field: "email".to_string(),
            token_field: "verification_token".to_string(),
            ttl: Duration::from_secs(24 * 60 * 60), // 24 hours
            verify_mail: MailTemplate::verification_default(),
            confirm_mail: MailTemplate::confirmation_default(),
            send_confirmation: true,
            transport: TransportOptions::default(),
        }
    }
}

impl VerifyConfig {
    /// Build verify config from environment variables.
    ///
    /// Required:
    /// - `VERIFY_URL`
    ///
    /// Optional variables fall back to `Default` values when not provided.
    pub fn from_env() -> Result<Self, VerifyConfigError> {
        let mut cfg = Self::default();
        cfg.verification_url = env_var_required("VERIFY_URL")?;
        cfg.token_length =
            env_var_parse_or_default("VERIFY_TOKEN_LENGTH", cfg.token_length, "usize")?;
        cfg.ttl = Duration::from_secs(env_var_parse_or_default(
            "VERIFY_TTL_SECS",
            cfg.ttl.as_secs(),
            "u64",
        )?);
        cfg.send_confirmation =
            env_var_bool_or_default("VERIFY_SEND_CONFIRMATION", cfg.send_confirmation)?;

        if let Some(v) = env_var_optional("VERIFY_PENDING_COLLECTION") {
            cfg.pending_collection = v;
        }
        if let Some(v) = env_var_optional("VERIFY_IDENTITY_FIELD") {
            cfg.identity_field = v;
        }
        if let Some(v) = env_var_optional("VERIFY_TOKEN_FIELD") {
            cfg.token_field = v;
        }
        if let Some(v) = env_var_optional("VERIFY_MAIL_FROM") {
            cfg.verify_mail.from = v.clone();
            cfg.confirm_mail.from = v;
        }

        cfg.transport = TransportOptions {
            service: env_var_optional("VERIFY_SMTP_SERVICE"),
            host: env_var_optional("VERIFY_SMTP_HOST"),
            port: env_var_optional("VERIFY_SMTP_PORT")
                .map(|v| {
                    v.parse::<u16>().map_err(|_| {
                        VerifyConfigError::Invalid("VERIFY_SMTP_PORT must be a valid u16".into())
                    })
                })
                .transpose()?,
            secure: env_var_bool_or_default("VERIFY_SMTP_SECURE", false)?,
            user: env_var_optional("VERIFY_SMTP_USER"),
            pass: env_var_optional("VERIFY_SMTP_PASS"),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration
    ///
    /// Checks run in a fixed order and the first violation is reported.
    pub fn validate(&self) -> Result<(), VerifyConfigError> {
        if !self.verification_url.contains(URL_MARKER) {
            return Err(VerifyConfigError::Invalid(format!(
                "verification_url does not contain {URL_MARKER}"
            )));
        }

        if self.pending_collection.trim().is_empty() {
            return Err(VerifyConfigError::Invalid(
                "pending_collection cannot be empty".to_string(),
            ));
        }

        let identity = self.identity_path()?;

        if self.token_field.is_empty() {
            return Err(VerifyConfigError::Invalid(
                "token_field cannot be empty".to_string(),
            ));
        }

        // The token is written at the top level; it must not replace the
        // identity or the object holding it.
        if self.token_field == identity.root() {
            return Err(VerifyConfigError::Invalid(format!(
                "token_field `{}` would overwrite identity_field `{}`",
                self.token_field, self.identity_field
            )));
        }

        Ok(())
    }

    /// Parsed identity path.
    pub fn identity_path(&self) -> Result<FieldPath, VerifyConfigError> {
        FieldPath::parse(&self.identity_field)
            .map_err(|e| VerifyConfigError::Invalid(format!("identity_field: {e}")))
    }

    /// Path of the token field. The name is a single top-level key.
    pub fn token_path(&self) -> FieldPath {
        FieldPath::key(&self.token_field)
    }

    /// The configuration as a flat option map, keyed by [`OPTION_KEYS`].
    pub fn options_map(&self) -> Map<String, Value> {
        let value = json!({
            "verification_url": self.verification_url,
            "token_length": self.token_length,
            "pending_collection": self.pending_collection,
            "identity_field": self.identity_field,
            "token_field": self.token_field,
            "ttl_secs": self.ttl.as_secs(),
            "verify_mail": self.verify_mail,
            "confirm_mail": self.confirm_mail,
            "send_confirmation": self.send_confirmation,
            "transport": self.transport,
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Merge a partial option object over this configuration.
    ///
    /// Keys in `patch` replace the current values wholesale (no deep merge).
    /// The merged result is validated before being returned; `self` is never
    /// modified, so a failed merge leaves the active configuration as it was.
    pub fn options_merge(&self, patch: &Value) -> Result<Self, VerifyConfigError> {
        let Value::Object(patch) = patch else {
            return Err(VerifyConfigError::Type {
                option: "configuration".to_string(),
                expected: "object",
                got: json_type_name(patch),
            });
        };

        let mut merged = self.options_map();
        for (key, value) in patch {
            if OPTION_KEYS.contains(&key.as_str()) {
                merged.insert(key.clone(), value.clone());
            } else {
                tracing::warn!(option = %key, "ignoring unknown verify option");
            }
        }

        Self::options_parse(&merged)
    }

    /// Build a configuration from a complete option map, checking types then
    /// values, fail-fast.
    pub fn options_parse(options: &Map<String, Value>) -> Result<Self, VerifyConfigError> {
        let verification_url = option_string(options, "verification_url")?;
        if !verification_url.contains(URL_MARKER) {
            return Err(VerifyConfigError::Invalid(format!(
                "verification_url does not contain {URL_MARKER}"
            )));
        }

        let token_length = option_non_negative(options, "token_length")?;
        let token_length = usize::try_from(token_length).map_err(|_| {
            VerifyConfigError::Invalid("token_length does not fit in usize".to_string())
        })?;
        let pending_collection = option_string(options, "pending_collection")?;
        let identity_field = option_string(options, "identity_field")?;
        let token_field = option_string(options, "token_field")?;
        let ttl = Duration::from_secs(option_non_negative(options, "ttl_secs")?);

        let cfg = Self {
            verification_url,
            token_length,
            pending_collection,
            identity_field,
            token_field,
            ttl,
            verify_mail: option_object(options, "verify_mail")?,
            confirm_mail: option_object(options, "confirm_mail")?,
            send_confirmation: option_bool(options, "send_confirmation")?,
            transport: option_object(options, "transport")?,
        };

        cfg.validate()?;
        Ok(cfg)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn option_get<'a>(options: &'a Map<String, Value>, key: &str) -> &'a Value {
    options.get(key).unwrap_or(&Value::Null)
}

fn option_type_error(key: &str, expected: &'static str, got: &Value) -> VerifyConfigError {
    VerifyConfigError::Type {
        option: key.to_string(),
        expected,
        got: json_type_name(got),
    }
}

fn option_string(options: &Map<String, Value>, key: &str) -> Result<String, VerifyConfigError> {
    match option_get(options, key) {
        Value::String(s) => Ok(s.clone()),
        other => Err(option_type_error(key, "string", other)),
    }
}

fn option_bool(options: &Map<String, Value>, key: &str) -> Result<bool, VerifyConfigError> {
    match option_get(options, key) {
        Value::Bool(b) => Ok(*b),
        other => Err(option_type_error(key, "boolean", other)),
    }
}

fn option_non_negative(options: &Map<String, Value>, key: &str) -> Result<u64, VerifyConfigError> {
    match option_get(options, key) {
        Value::Number(n) => n.as_u64().ok_or_else(|| {
            VerifyConfigError::Invalid(format!("{key} must be a non-negative integer"))
        }),
        other => Err(option_type_error(key, "number", other)),
    }
}

fn option_object<T: serde::de::DeserializeOwned>(
    options: &Map<String, Value>,
    key: &str,
) -> Result<T, VerifyConfigError> {
    match option_get(options, key) {
        value @ Value::Object(_) => serde_json::from_value(value.clone())
            .map_err(|e| VerifyConfigError::Invalid(format!("{key}: {e}"))),
        other => Err(option_type_error(key, "object", other)),
    }
}

fn env_var_required(key: &'static str) -> Result<String, VerifyConfigError> {
    std::env::var(key).map_err(|_| VerifyConfigError::MissingEnv(key))
}

fn env_var_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_var_parse_or_default<T: std::str::FromStr>(
    key: &str,
    default: T,
    type_name: &str,
) -> Result<T, VerifyConfigError> {
    match env_var_optional(key) {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| VerifyConfigError::Invalid(format!("{key} must be a valid {type_name}"))),
        _ => Ok(default),
    }
}

fn env_var_bool_or_default(key: &str, default: bool) -> Result<bool, VerifyConfigError> {
    match env_var_optional(key) {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(VerifyConfigError::Invalid(format!(
                "{key} must be a valid boolean"
            ))),
        },
        _ => Ok(default),
    }
}
