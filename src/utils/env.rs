/// Get environment variable with KAKASAKU_ prefix, falling back to unprefixed version
///
/// Checks `KAKASAKU_{key}` first, then `{key}`, so deployments can keep the
/// bare `FASPAY_*` names the payment setup already uses.
///
/// # Examples
///
/// ```rust
/// use kakasaku::utils::get_env_with_prefix;
///
/// // Checks KAKASAKU_FASPAY_USER_ID first, then FASPAY_USER_ID
/// let user_id = get_env_with_prefix("FASPAY_USER_ID");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("KAKASAKU_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("KAKASAKU_ENV_TEST_PREFIXED", "prefixed_value");
            std::env::set_var("ENV_TEST_PREFIXED", "bare_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_TEST_PREFIXED"),
            Some("prefixed_value".to_string())
        );

        unsafe {
            std::env::set_var("ENV_TEST_FALLBACK", "unprefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_TEST_FALLBACK"),
            Some("unprefixed_value".to_string())
        );

        unsafe {
            std::env::remove_var("KAKASAKU_ENV_TEST_PREFIXED");
            std::env::remove_var("ENV_TEST_PREFIXED");
            std::env::remove_var("ENV_TEST_FALLBACK");
        }

        assert_eq!(get_env_with_prefix("ENV_TEST_MISSING"), None);
    }
}
