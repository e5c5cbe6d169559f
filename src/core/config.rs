//! Application configuration from environment variables.
//!
//! Load configuration using `AppConfig::from_env()` after calling
//! `dotenvy::dotenv()`. Database and JWT settings live in their own
//! config types next to the code they drive.

/// Application-level configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Deployment environment name. Anything other than "production"
    /// counts as a non-production environment.
    pub environment: String,

    /// Address the HTTP server listens on
    pub bind_addr: String,

    /// Role granted to newly registered users
    pub default_user_role: String,

    /// Lifetime of password reset tokens in seconds
    pub password_reset_expiry_secs: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            default_user_role: "subscriber".to_string(),
            password_reset_expiry_secs: 3600,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from a `.env` file.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            environment: std::env::var("APP_ENV").unwrap_or(defaults.environment),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            default_user_role: std::env::var("DEFAULT_USER_ROLE")
                .unwrap_or(defaults.default_user_role),
            password_reset_expiry_secs: std::env::var("PASSWORD_RESET_EXPIRY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.password_reset_expiry_secs),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Raw reset tokens may be echoed in API responses outside production
    /// to ease testing. Production responses never contain them.
    pub fn expose_reset_tokens(&self) -> bool {
        !self.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Default and Accessor Tests
    // ========================================================================

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.environment, "production");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.default_user_role, "subscriber");
        assert_eq!(config.password_reset_expiry_secs, 3600);
    }

    #[test]
    fn test_is_production() {
        let mut config = AppConfig::default();
        assert!(config.is_production());

        config.environment = "development".to_string();
        assert!(!config.is_production());

        config.environment = "staging".to_string();
        assert!(!config.is_production());
    }

    #[test]
    fn test_expose_reset_tokens_only_outside_production() {
        let mut config = AppConfig::default();
        assert!(!config.expose_reset_tokens());

        config.environment = "development".to_string();
        assert!(config.expose_reset_tokens());
    }

    #[test]
    fn test_config_clone_and_debug() {
        let config = AppConfig::default();
        let cloned = config.clone();

        assert_eq!(config.environment, cloned.environment);
        assert_eq!(config.bind_addr, cloned.bind_addr);

        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("AppConfig"));
        assert!(debug_str.contains("bind_addr"));
    }

    // ========================================================================
    // Environment Loading Tests
    // ========================================================================

    #[test]
    fn test_from_env_uses_defaults_when_unset() {
        let saved_env = std::env::var("APP_ENV").ok();
        let saved_expiry = std::env::var("PASSWORD_RESET_EXPIRY").ok();
        unsafe {
            std::env::remove_var("APP_ENV");
            std::env::remove_var("PASSWORD_RESET_EXPIRY");
        }

        let config = AppConfig::from_env();
        assert_eq!(config.environment, "production");
        assert_eq!(config.password_reset_expiry_secs, 3600);

        unsafe {
            if let Some(v) = saved_env {
                std::env::set_var("APP_ENV", v);
            }
            if let Some(v) = saved_expiry {
                std::env::set_var("PASSWORD_RESET_EXPIRY", v);
            }
        }
    }

    #[test]
    fn test_from_env_reads_overrides() {
        let saved = std::env::var("DEFAULT_USER_ROLE").ok();
        unsafe {
            std::env::set_var("DEFAULT_USER_ROLE", "member");
        }

        let config = AppConfig::from_env();
        assert_eq!(config.default_user_role, "member");

        unsafe {
            match saved {
                Some(v) => std::env::set_var("DEFAULT_USER_ROLE", v),
                None => std::env::remove_var("DEFAULT_USER_ROLE"),
            }
        }
    }

    #[test]
    fn test_from_env_ignores_unparseable_expiry() {
        let saved = std::env::var("PASSWORD_RESET_EXPIRY").ok();
        unsafe {
            std::env::set_var("PASSWORD_RESET_EXPIRY", "not-a-number");
        }

        let config = AppConfig::from_env();
        assert_eq!(config.password_reset_expiry_secs, 3600);

        unsafe {
            match saved {
                Some(v) => std::env::set_var("PASSWORD_RESET_EXPIRY", v),
                None => std::env::remove_var("PASSWORD_RESET_EXPIRY"),
            }
        }
    }
}
