/// Resolve environment variables in a string.
/// Supports ${VAR_NAME} syntax; unset variables resolve to the empty string.
pub fn resolve_env(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + len];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_resolve_env() {
        std::env::set_var("GTIDFLOW_TEST_VAR", "hello");

        assert_eq!(resolve_env("${GTIDFLOW_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env("prefix_${GTIDFLOW_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env("no_vars"), "no_vars");
        assert_eq!(resolve_env("unterminated ${GTIDFLOW_TEST_VAR"), "unterminated ${GTIDFLOW_TEST_VAR");

        std::env::remove_var("GTIDFLOW_TEST_VAR");
    }

    #[test]
    #[serial]
    fn test_resolve_env_unset_is_empty() {
        std::env::remove_var("GTIDFLOW_UNSET_VAR");
        assert_eq!(resolve_env("a${GTIDFLOW_UNSET_VAR}b"), "ab");
    }

    #[test]
    #[serial]
    fn test_resolved_value_is_not_rescanned() {
        std::env::set_var("GTIDFLOW_NESTED", "${HOME}");
        assert_eq!(resolve_env("${GTIDFLOW_NESTED}"), "${HOME}");
        std::env::remove_var("GTIDFLOW_NESTED");
    }
}
