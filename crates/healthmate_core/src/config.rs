use crate::HealthError;
use secrecy::SecretString;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub water_goal_ml: i64,
    pub step_goal: i64,
    pub wellness_api_base_url: Option<String>,
    pub wellness_api_timeout: Duration,
    pub auth_token: SecretString,
    pub owner_phone: String,
}

pub const DEFAULT_WATER_GOAL_ML: i64 = 2500;
pub const DEFAULT_STEP_GOAL: i64 = 10_000;

impl Config {
    pub fn from_env() -> Result<Self, HealthError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function. This avoids mutating global environment in tests and keeps
    /// `from_env()` small and safe.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, HealthError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let database_url =
            get("HEALTHMATE_DATABASE_URL").unwrap_or_else(|| "sqlite://healthmate.db".into());
        let water_goal_ml = parse_positive(&mut get, "HEALTHMATE_WATER_GOAL_ML")?
            .unwrap_or(DEFAULT_WATER_GOAL_ML);
        let step_goal =
            parse_positive(&mut get, "HEALTHMATE_STEP_GOAL")?.unwrap_or(DEFAULT_STEP_GOAL);
        let wellness_api_base_url =
            get("HEALTHMATE_WELLNESS_API_URL").filter(|s| !s.trim().is_empty());
        let timeout_secs = parse_positive(&mut get, "HEALTHMATE_WELLNESS_API_TIMEOUT_SECS")?
            .map(|v| v as u64)
            .unwrap_or(30);
        let auth_token = get("HEALTHMATE_AUTH_TOKEN").unwrap_or_else(|| "dev-token".into());
        let owner_phone = get("HEALTHMATE_OWNER_PHONE").unwrap_or_else(|| "0000000000".into());

        Ok(Self {
            database_url,
            water_goal_ml,
            step_goal,
            wellness_api_base_url,
            wellness_api_timeout: Duration::from_secs(timeout_secs),
            auth_token: SecretString::new(auth_token.into()),
            owner_phone,
        })
    }
}

fn parse_positive<F>(get: &mut F, key: &str) -> Result<Option<i64>, HealthError>
where
    F: FnMut(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => {
            let v: i64 = raw
                .trim()
                .parse()
                .map_err(|_| HealthError::Config(format!("{key} must be an integer, got {raw:?}")))?;
            if v <= 0 {
                return Err(HealthError::Config(format!("{key} must be positive")));
            }
            Ok(Some(v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let cfg = Config::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg.database_url, "sqlite://healthmate.db");
        assert_eq!(cfg.water_goal_ml, DEFAULT_WATER_GOAL_ML);
        assert_eq!(cfg.step_goal, DEFAULT_STEP_GOAL);
        assert!(cfg.wellness_api_base_url.is_none());
        assert_eq!(cfg.wellness_api_timeout, Duration::from_secs(30));
    }

    #[test]
    fn from_env_reads_values() {
        let get = |k: &str| match k {
            "HEALTHMATE_DATABASE_URL" => Some("sqlite::memory:".into()),
            "HEALTHMATE_WATER_GOAL_ML" => Some("3000".into()),
            "HEALTHMATE_STEP_GOAL" => Some("8000".into()),
            "HEALTHMATE_WELLNESS_API_URL" => Some("http://localhost:9000".into()),
            "HEALTHMATE_OWNER_PHONE" => Some("919876543210".into()),
            _ => None,
        };
        let cfg = Config::from_env_with(get).expect("cfg");
        assert_eq!(cfg.water_goal_ml, 3000);
        assert_eq!(cfg.step_goal, 8000);
        assert_eq!(
            cfg.wellness_api_base_url.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(cfg.owner_phone, "919876543210");
    }

    #[test]
    fn rejects_non_numeric_goal() {
        let get = |k: &str| match k {
            "HEALTHMATE_WATER_GOAL_ML" => Some("plenty".into()),
            _ => None,
        };
        assert!(Config::from_env_with(get).is_err());
    }

    #[test]
    fn rejects_zero_goal() {
        let get = |k: &str| match k {
            "HEALTHMATE_STEP_GOAL" => Some("0".into()),
            _ => None,
        };
        assert!(Config::from_env_with(get).is_err());
    }
}
