//! Custom validation functions for configuration.
//!
//! Provides shared validation logic used across multiple configuration modules.

use ipnetwork::IpNetwork;
use validator::ValidationError;

/// Validate that the provided CIDR list does not contain any invalid ranges.
pub fn validate_cidr_list(cidrs: &[IpNetwork]) -> Result<(), ValidationError> {
    if cidrs.iter().any(|n| match n {
        IpNetwork::V4(net) => net.ip().octets() == [0, 0, 0, 0],
        IpNetwork::V6(_) => false,
    }) {
        return Err(ValidationError::new("invalid_cidr"));
    }
    Ok(())
}

/// Validate that every interface name follows Linux naming conventions.
pub fn validate_interfaces(names: &[String]) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^[a-zA-Z0-9_.@-]+$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;

    let valid = names
        .iter()
        .all(|name| !name.is_empty() && name.len() <= 15 && re.is_match(name));

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that a program name is present and has no surrounding whitespace.
pub fn validate_command(command: &str) -> Result<(), ValidationError> {
    if command.is_empty() || command.trim() != command {
        return Err(ValidationError::new("invalid_command"));
    }
    Ok(())
}
