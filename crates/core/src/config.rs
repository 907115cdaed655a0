use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
    pub services: ServicesConfig,
    pub calendar: CalendarConfig,
    pub crm: CrmConfig,
    pub workflows: WorkflowsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_tool_rounds: u32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn configured(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub api_key: Option<SecretString>,
    pub phone_number_id: Option<String>,
    pub base_url: String,
    pub voice_id: String,
    /// Externally reachable base URL of the orchestrator, handed to the voice
    /// provider so it can call back into `/vapi/chat`.
    pub public_url: String,
}

impl VoiceConfig {
    pub fn configured(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub calendar_url: String,
    pub crm_url: String,
    pub workflows_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub api_key: Option<SecretString>,
    pub event_type_id: Option<String>,
    pub base_url: String,
    pub time_zone: String,
}

impl CalendarConfig {
    pub fn configured(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub access_token: Option<SecretString>,
    pub base_url: String,
}

impl CrmConfig {
    pub fn configured(&self) -> bool {
        self.access_token
            .as_ref()
            .map(|token| !token.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct WorkflowsConfig {
    pub webhook_base_url: Option<String>,
    pub webhook_secret: Option<SecretString>,
}

impl WorkflowsConfig {
    pub fn configured(&self) -> bool {
        self.webhook_base_url.as_ref().map(|url| !url.trim().is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub calendar_port: u16,
    pub crm_port: u16,
    pub workflows_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub voice_api_key: Option<String>,
    pub voice_public_url: Option<String>,
    pub calendar_url: Option<String>,
    pub crm_url: Option<String>,
    pub workflows_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                max_tokens: 300,
                max_tool_rounds: 3,
                timeout_secs: 30,
            },
            voice: VoiceConfig {
                api_key: None,
                phone_number_id: None,
                base_url: "https://api.vapi.ai".to_string(),
                voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
                public_url: "http://localhost:8000".to_string(),
            },
            services: ServicesConfig {
                calendar_url: "http://localhost:8001".to_string(),
                crm_url: "http://localhost:8002".to_string(),
                workflows_url: "http://localhost:8003".to_string(),
                timeout_secs: 30,
            },
            calendar: CalendarConfig {
                api_key: None,
                event_type_id: None,
                base_url: "https://api.cal.com/v1".to_string(),
                time_zone: "America/Chicago".to_string(),
            },
            crm: CrmConfig { access_token: None, base_url: "https://api.hubapi.com".to_string() },
            workflows: WorkflowsConfig { webhook_base_url: None, webhook_secret: None },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                calendar_port: 8001,
                crm_port: 8002,
                workflows_port: 8003,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ringflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(max_tool_rounds) = llm.max_tool_rounds {
                self.llm.max_tool_rounds = max_tool_rounds;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(voice) = patch.voice {
            if let Some(voice_api_key_value) = voice.api_key {
                self.voice.api_key = Some(secret_value(voice_api_key_value));
            }
            if let Some(phone_number_id) = voice.phone_number_id {
                self.voice.phone_number_id = Some(phone_number_id);
            }
            if let Some(base_url) = voice.base_url {
                self.voice.base_url = base_url;
            }
            if let Some(voice_id) = voice.voice_id {
                self.voice.voice_id = voice_id;
            }
            if let Some(public_url) = voice.public_url {
                self.voice.public_url = public_url;
            }
        }

        if let Some(services) = patch.services {
            if let Some(calendar_url) = services.calendar_url {
                self.services.calendar_url = calendar_url;
            }
            if let Some(crm_url) = services.crm_url {
                self.services.crm_url = crm_url;
            }
            if let Some(workflows_url) = services.workflows_url {
                self.services.workflows_url = workflows_url;
            }
            if let Some(timeout_secs) = services.timeout_secs {
                self.services.timeout_secs = timeout_secs;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(calendar_api_key_value) = calendar.api_key {
                self.calendar.api_key = Some(secret_value(calendar_api_key_value));
            }
            if let Some(event_type_id) = calendar.event_type_id {
                self.calendar.event_type_id = Some(event_type_id);
            }
            if let Some(base_url) = calendar.base_url {
                self.calendar.base_url = base_url;
            }
            if let Some(time_zone) = calendar.time_zone {
                self.calendar.time_zone = time_zone;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(crm_access_token_value) = crm.access_token {
                self.crm.access_token = Some(secret_value(crm_access_token_value));
            }
            if let Some(base_url) = crm.base_url {
                self.crm.base_url = base_url;
            }
        }

        if let Some(workflows) = patch.workflows {
            if let Some(webhook_base_url) = workflows.webhook_base_url {
                self.workflows.webhook_base_url = Some(webhook_base_url);
            }
            if let Some(webhook_secret_value) = workflows.webhook_secret {
                self.workflows.webhook_secret = Some(secret_value(webhook_secret_value));
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(calendar_port) = server.calendar_port {
                self.server.calendar_port = calendar_port;
            }
            if let Some(crm_port) = server.crm_port {
                self.server.crm_port = crm_port;
            }
            if let Some(workflows_port) = server.workflows_port {
                self.server.workflows_port = workflows_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RINGFLOW_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RINGFLOW_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("RINGFLOW_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("RINGFLOW_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("RINGFLOW_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("RINGFLOW_LLM_MAX_TOOL_ROUNDS") {
            self.llm.max_tool_rounds = parse_u32("RINGFLOW_LLM_MAX_TOOL_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("RINGFLOW_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("RINGFLOW_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RINGFLOW_VOICE_API_KEY") {
            self.voice.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RINGFLOW_VOICE_PHONE_NUMBER_ID") {
            self.voice.phone_number_id = Some(value);
        }
        if let Some(value) = read_env("RINGFLOW_VOICE_BASE_URL") {
            self.voice.base_url = value;
        }
        if let Some(value) = read_env("RINGFLOW_VOICE_VOICE_ID") {
            self.voice.voice_id = value;
        }
        if let Some(value) = read_env("RINGFLOW_VOICE_PUBLIC_URL") {
            self.voice.public_url = value;
        }

        if let Some(value) = read_env("RINGFLOW_SERVICES_CALENDAR_URL") {
            self.services.calendar_url = value;
        }
        if let Some(value) = read_env("RINGFLOW_SERVICES_CRM_URL") {
            self.services.crm_url = value;
        }
        if let Some(value) = read_env("RINGFLOW_SERVICES_WORKFLOWS_URL") {
            self.services.workflows_url = value;
        }
        if let Some(value) = read_env("RINGFLOW_SERVICES_TIMEOUT_SECS") {
            self.services.timeout_secs = parse_u64("RINGFLOW_SERVICES_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RINGFLOW_CALENDAR_API_KEY") {
            self.calendar.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RINGFLOW_CALENDAR_EVENT_TYPE_ID") {
            self.calendar.event_type_id = Some(value);
        }
        if let Some(value) = read_env("RINGFLOW_CALENDAR_BASE_URL") {
            self.calendar.base_url = value;
        }
        if let Some(value) = read_env("RINGFLOW_CALENDAR_TIME_ZONE") {
            self.calendar.time_zone = value;
        }

        if let Some(value) = read_env("RINGFLOW_CRM_ACCESS_TOKEN") {
            self.crm.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("RINGFLOW_CRM_BASE_URL") {
            self.crm.base_url = value;
        }

        if let Some(value) = read_env("RINGFLOW_WORKFLOWS_WEBHOOK_BASE_URL") {
            self.workflows.webhook_base_url = Some(value);
        }
        if let Some(value) = read_env("RINGFLOW_WORKFLOWS_WEBHOOK_SECRET") {
            self.workflows.webhook_secret = Some(secret_value(value));
        }

        if let Some(value) = read_env("RINGFLOW_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RINGFLOW_SERVER_PORT") {
            self.server.port = parse_u16("RINGFLOW_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("RINGFLOW_SERVER_CALENDAR_PORT") {
            self.server.calendar_port = parse_u16("RINGFLOW_SERVER_CALENDAR_PORT", &value)?;
        }
        if let Some(value) = read_env("RINGFLOW_SERVER_CRM_PORT") {
            self.server.crm_port = parse_u16("RINGFLOW_SERVER_CRM_PORT", &value)?;
        }
        if let Some(value) = read_env("RINGFLOW_SERVER_WORKFLOWS_PORT") {
            self.server.workflows_port = parse_u16("RINGFLOW_SERVER_WORKFLOWS_PORT", &value)?;
        }

        let log_level =
            read_env("RINGFLOW_LOGGING_LEVEL").or_else(|| read_env("RINGFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RINGFLOW_LOGGING_FORMAT").or_else(|| read_env("RINGFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(voice_api_key) = overrides.voice_api_key {
            self.voice.api_key = Some(secret_value(voice_api_key));
        }
        if let Some(voice_public_url) = overrides.voice_public_url {
            self.voice.public_url = voice_public_url;
        }
        if let Some(calendar_url) = overrides.calendar_url {
            self.services.calendar_url = calendar_url;
        }
        if let Some(crm_url) = overrides.crm_url {
            self.services.crm_url = crm_url;
        }
        if let Some(workflows_url) = overrides.workflows_url {
            self.services.workflows_url = workflows_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_voice(&self.voice)?;
        validate_services(&self.services)?;
        validate_calendar(&self.calendar)?;
        validate_crm(&self.crm)?;
        validate_workflows(&self.workflows)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("ringflow.toml"), PathBuf::from("config/ringflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{field} must start with http:// or https://")))
    }
}

fn validate_timeout(field: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 300 {
        return Err(ConfigError::Validation(format!("{field} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_http_url("llm.base_url", &llm.base_url)?;
    validate_timeout("llm.timeout_secs", llm.timeout_secs)?;

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }
    if llm.max_tool_rounds == 0 || llm.max_tool_rounds > 10 {
        return Err(ConfigError::Validation(
            "llm.max_tool_rounds must be in range 1..=10".to_string(),
        ));
    }

    Ok(())
}

fn validate_voice(voice: &VoiceConfig) -> Result<(), ConfigError> {
    validate_http_url("voice.base_url", &voice.base_url)?;
    validate_http_url("voice.public_url", &voice.public_url)?;

    if voice.voice_id.trim().is_empty() {
        return Err(ConfigError::Validation("voice.voice_id must not be empty".to_string()));
    }

    Ok(())
}

fn validate_services(services: &ServicesConfig) -> Result<(), ConfigError> {
    validate_http_url("services.calendar_url", &services.calendar_url)?;
    validate_http_url("services.crm_url", &services.crm_url)?;
    validate_http_url("services.workflows_url", &services.workflows_url)?;
    validate_timeout("services.timeout_secs", services.timeout_secs)
}

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    validate_http_url("calendar.base_url", &calendar.base_url)?;

    if calendar.configured() && calendar.event_type_id.is_none() {
        return Err(ConfigError::Validation(
            "calendar.event_type_id is required when calendar.api_key is set".to_string(),
        ));
    }

    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    validate_http_url("crm.base_url", &crm.base_url)
}

fn validate_workflows(workflows: &WorkflowsConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = &workflows.webhook_base_url {
        validate_http_url("workflows.webhook_base_url", base_url)?;
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    let ports = [
        ("server.port", server.port),
        ("server.calendar_port", server.calendar_port),
        ("server.crm_port", server.crm_port),
        ("server.workflows_port", server.workflows_port),
    ];
    for (field, port) in ports {
        if port == 0 {
            return Err(ConfigError::Validation(format!("{field} must be greater than zero")));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    voice: Option<VoicePatch>,
    services: Option<ServicesPatch>,
    calendar: Option<CalendarPatch>,
    crm: Option<CrmPatch>,
    workflows: Option<WorkflowsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    max_tool_rounds: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VoicePatch {
    api_key: Option<String>,
    phone_number_id: Option<String>,
    base_url: Option<String>,
    voice_id: Option<String>,
    public_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicesPatch {
    calendar_url: Option<String>,
    crm_url: Option<String>,
    workflows_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    api_key: Option<String>,
    event_type_id: Option<String>,
    base_url: Option<String>,
    time_zone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    access_token: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowsPatch {
    webhook_base_url: Option<String>,
    webhook_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    calendar_port: Option<u16>,
    crm_port: Option<u16>,
    workflows_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_fully_mock() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.llm.configured(), "llm should be unconfigured by default")?;
        ensure(!config.voice.configured(), "voice should be unconfigured by default")?;
        ensure(!config.calendar.configured(), "calendar should be unconfigured by default")?;
        ensure(!config.crm.configured(), "crm should be unconfigured by default")?;
        ensure(!config.workflows.configured(), "workflows should be unconfigured by default")?;
        ensure(config.llm.max_tool_rounds == 3, "tool round ceiling should default to 3")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ANTHROPIC_KEY", "sk-ant-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ringflow.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_ANTHROPIC_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let api_key = config
                .llm
                .api_key
                .as_ref()
                .ok_or_else(|| "api key should be present".to_string())?;
            ensure(
                api_key.expose_secret() == "sk-ant-from-env",
                "llm api key should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_ANTHROPIC_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RINGFLOW_LOG_LEVEL", "warn");
        env::set_var("RINGFLOW_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["RINGFLOW_LOG_LEVEL", "RINGFLOW_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RINGFLOW_SERVICES_CALENDAR_URL", "http://calendar-from-env:8001");
        env::set_var("RINGFLOW_LLM_MODEL", "model-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ringflow.toml");
            fs::write(
                &path,
                r#"
[llm]
model = "model-from-file"

[services]
calendar_url = "http://calendar-from-file:8001"
crm_url = "http://crm-from-file:8002"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    crm_url: Some("http://crm-from-override:8002".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.services.crm_url == "http://crm-from-override:8002",
                "programmatic override should win over file",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.services.calendar_url == "http://calendar-from-env:8001",
                "env calendar url should win over file and defaults",
            )?;
            ensure(config.llm.model == "model-from-env", "env model should win over file")
        })();

        clear_vars(&["RINGFLOW_SERVICES_CALENDAR_URL", "RINGFLOW_LLM_MODEL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RINGFLOW_SERVICES_CRM_URL", "not-a-url");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("services.crm_url")
            );
            ensure(has_message, "validation failure should mention services.crm_url")
        })();

        clear_vars(&["RINGFLOW_SERVICES_CRM_URL"]);
        result
    }

    #[test]
    fn calendar_key_without_event_type_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RINGFLOW_CALENDAR_API_KEY", "cal_live_key");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected validation failure".to_string()),
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("calendar.event_type_id")
            );
            ensure(has_message, "validation failure should mention calendar.event_type_id")
        })();

        clear_vars(&["RINGFLOW_CALENDAR_API_KEY"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RINGFLOW_LLM_API_KEY", "sk-ant-secret-value");
        env::set_var("RINGFLOW_CRM_ACCESS_TOKEN", "pat-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("sk-ant-secret-value"),
                "debug output should not contain the llm api key",
            )?;
            ensure(
                !debug.contains("pat-secret-value"),
                "debug output should not contain the crm access token",
            )?;
            ensure(config.llm.configured(), "llm should report configured")?;
            ensure(config.crm.configured(), "crm should report configured")
        })();

        clear_vars(&["RINGFLOW_LLM_API_KEY", "RINGFLOW_CRM_ACCESS_TOKEN"]);
        result
    }
}
