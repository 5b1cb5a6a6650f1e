use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Vigil";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime configuration, resolved once at startup from environment
/// variables with development defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub bind_addr: String,
    /// SQLite database path.
    pub database_path: PathBuf,
    /// Risk model artifact (JSON). Missing file means the model component
    /// reports unavailable and assessments proceed without it.
    pub model_artifact_path: PathBuf,
    /// Base URL used to build specialist magic links.
    pub public_base_url: String,
    /// Optional external handover text service. None disables the call and
    /// the deterministic fallback template is always used.
    pub handover_service_url: Option<String>,
    pub handover_timeout: Duration,
    /// Escalation token time-to-live.
    pub escalation_token_ttl: chrono::Duration,
    /// When true, advice submission revokes the escalation token.
    pub escalation_token_single_use: bool,
    /// Analyzer deadlines.
    pub rule_deadline: Duration,
    pub model_deadline: Duration,
    pub medication_deadline: Duration,
    pub composite_deadline: Duration,
    /// Seed PHW bearer tokens, `token:name:facility` entries separated by `;`.
    pub phw_seed_tokens: Vec<PhwSeed>,
}

/// One pre-provisioned PHW credential from `VIGIL_PHW_TOKENS`.
#[derive(Debug, Clone)]
pub struct PhwSeed {
    pub token: String,
    pub full_name: String,
    pub facility: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_path: PathBuf::from("vigil.db"),
            model_artifact_path: PathBuf::from("resources/model/risk_model.json"),
            public_base_url: "http://localhost:8080".into(),
            handover_service_url: None,
            handover_timeout: Duration::from_secs(5),
            escalation_token_ttl: chrono::Duration::hours(24),
            escalation_token_single_use: false,
            rule_deadline: Duration::from_millis(50),
            model_deadline: Duration::from_secs(2),
            medication_deadline: Duration::from_secs(1),
            composite_deadline: Duration::from_secs(5),
            phw_seed_tokens: Vec::new(),
        }
    }
}

impl Config {
    /// Resolve configuration from `VIGIL_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();

        if let Ok(v) = std::env::var("VIGIL_BIND_ADDR") {
            cfg.bind_addr = v;
        }
        if let Ok(v) = std::env::var("VIGIL_DATABASE_PATH") {
            cfg.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VIGIL_MODEL_PATH") {
            cfg.model_artifact_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VIGIL_PUBLIC_BASE_URL") {
            cfg.public_base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = std::env::var("VIGIL_HANDOVER_URL") {
            if !v.is_empty() {
                cfg.handover_service_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("VIGIL_TOKEN_TTL_HOURS") {
            if let Ok(hours) = v.parse::<i64>() {
                cfg.escalation_token_ttl = chrono::Duration::hours(hours);
            }
        }
        if let Ok(v) = std::env::var("VIGIL_TOKEN_SINGLE_USE") {
            cfg.escalation_token_single_use = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("VIGIL_PHW_TOKENS") {
            cfg.phw_seed_tokens = parse_phw_seeds(&v);
        }

        cfg
    }
}

fn parse_phw_seeds(raw: &str) -> Vec<PhwSeed> {
    raw.split(';')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let token = parts.next()?.trim();
            if token.is_empty() {
                return None;
            }
            Some(PhwSeed {
                token: token.to_string(),
                full_name: parts.next().unwrap_or("Unknown").trim().to_string(),
                facility: parts.next().unwrap_or("Unknown").trim().to_string(),
            })
        })
        .collect()
}
