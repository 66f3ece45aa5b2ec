#[cfg(test)]
mod tests {
    use crate::env::{DEFAULT_DATABASE_URL, database_url, env_files};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_development_env_files_by_default() {
        temp_env::with_var_unset("ROCKET_PROFILE", || {
            assert_eq!(
                env_files(),
                vec!["config/common.env", "config/dev.env", ".secrets.env"]
            );
        });
    }

    #[test]
    #[serial]
    fn test_production_env_files() {
        temp_env::with_var("ROCKET_PROFILE", Some("production"), || {
            assert_eq!(
                env_files(),
                vec!["config/common.env", "config/prod.env", ".secrets.env"]
            );
        });
    }

    #[test]
    #[serial]
    fn test_database_url_default() {
        temp_env::with_var_unset("DATABASE_URL", || {
            assert_eq!(database_url(), DEFAULT_DATABASE_URL);
        });

        temp_env::with_var("DATABASE_URL", Some("  "), || {
            assert_eq!(database_url(), DEFAULT_DATABASE_URL);
        });
    }

    #[test]
    #[serial]
    fn test_database_url_from_environment() {
        temp_env::with_var("DATABASE_URL", Some("sqlite://otra.db"), || {
            assert_eq!(database_url(), "sqlite://otra.db");
        });
    }
}
