// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Replaces `${VAR_NAME}` references with values from the environment.
///
/// An unterminated or empty reference is kept literally. A reference to a
/// variable that is not set is an error.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(0) | None => {
                // Malformed reference -- keep it as written
                out.push_str("${");
                rest = after;
            }
            Some(end) => {
                let name = &after[..end];
                let value = std::env::var(name).map_err(|_| ConfigError::UndefinedVariable {
                    name: name.to_string(),
                })?;
                out.push_str(&value);
                rest = &after[end + 1..];
            }
        }
    }
    out.push_str(rest);

    Ok(out)
}
