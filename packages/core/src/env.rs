//! Environment variable helpers shared by the `from_env` constructors.

use std::time::Duration;

/// Value of `var_name`, trimmed, or `None` when unset or blank.
pub fn var_non_empty(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a whole number of seconds that must be greater than zero.
///
/// The error names the variable and is meant for an `InvalidConfig` variant.
pub fn parse_positive_secs(var_name: &str, value: &str) -> Result<Duration, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(format!("{var_name}=0 must be at least 1 second")),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(format!("{var_name}={value} is not a number of seconds")),
    }
}

/// Read an optional positive number of seconds from `var_name`.
pub fn positive_secs_var(var_name: &str) -> Result<Option<Duration>, String> {
    var_non_empty(var_name)
        .map(|v| parse_positive_secs(var_name, &v))
        .transpose()
}
