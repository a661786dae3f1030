//! Shape check applied to each raw layer before merging, so a bad value is
//! reported against the file that introduced it.

use crate::{ConfigError, MAX_FIND_LIMIT};
use serde_json::Value;

/// Expected shape of one setting.
enum Rule {
    Text,
    OneOf(&'static [&'static str]),
    Flag,
    /// Non-negative integer in `min..=max`.
    Count { min: u64, max: u64, hint: &'static str },
    Block(&'static [(&'static str, Rule)]),
}

const ROOT: Rule = Rule::Block(&[
    ("$schema", Rule::Text),
    (
        "classifier",
        Rule::Block(&[
            ("provider", Rule::OneOf(&["openai"])),
            ("model", Rule::Text),
            ("api_key_env", Rule::Text),
            (
                "timeout_ms",
                Rule::Count {
                    min: 0,
                    max: u64::MAX,
                    hint: "expected integer",
                },
            ),
            ("append_instructions", Rule::Text),
        ]),
    ),
    (
        "store",
        Rule::Block(&[
            ("provider", Rule::OneOf(&["document", "csv"])),
            ("path", Rule::Text),
            ("collection", Rule::Text),
            ("id_collision_check", Rule::Flag),
            (
                "fallback",
                Rule::Block(&[("enabled", Rule::Flag), ("path", Rule::Text)]),
            ),
        ]),
    ),
    (
        "executor",
        Rule::Block(&[(
            "find_limit",
            Rule::Count {
                min: 1,
                max: MAX_FIND_LIMIT as u64,
                hint: "expected 1..=200",
            },
        )]),
    ),
    (
        "sessions",
        Rule::Block(&[
            ("provider", Rule::OneOf(&["memory", "file"])),
            ("path", Rule::Text),
            ("default_session_id", Rule::Text),
            ("serialize_commands", Rule::Flag),
        ]),
    ),
    (
        "server",
        Rule::Block(&[
            ("address", Rule::Text),
            (
                "port",
                Rule::Count {
                    min: 0,
                    max: u16::MAX as u64,
                    hint: "expected port number",
                },
            ),
        ]),
    ),
]);

/// Check `value` against the settings layout. Errors carry
/// `<origin>:<dotted.path>`.
pub(super) fn check(value: &Value, origin: &str) -> Result<(), ConfigError> {
    check_rule(&ROOT, value, origin, "")
}

fn check_rule(rule: &Rule, value: &Value, origin: &str, path: &str) -> Result<(), ConfigError> {
    let fail = |message: &str| {
        Err(ConfigError::InvalidField {
            path: format!("{origin}:{}", if path.is_empty() { "root" } else { path }),
            message: message.to_string(),
        })
    };
    match rule {
        Rule::Text if value.is_string() => Ok(()),
        Rule::Text => fail("expected string"),
        Rule::Flag if value.is_boolean() => Ok(()),
        Rule::Flag => fail("expected bool"),
        Rule::OneOf(allowed) => match value.as_str() {
            Some(text) if allowed.contains(&text) => Ok(()),
            Some(_) => fail(&format!("expected one of: {}", allowed.join(", "))),
            None => fail("expected string"),
        },
        Rule::Count { min, max, hint } => match value.as_u64() {
            Some(count) if (*min..=*max).contains(&count) => Ok(()),
            Some(_) => fail(hint),
            None => fail("expected integer"),
        },
        Rule::Block(fields) => {
            let Value::Object(map) = value else {
                return fail("expected object");
            };
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match fields.iter().find(|(name, _)| *name == key.as_str()) {
                    Some((_, rule)) => check_rule(rule, child, origin, &child_path)?,
                    None => {
                        return Err(ConfigError::InvalidField {
                            path: format!("{origin}:{child_path}"),
                            message: "unknown key".to_string(),
                        });
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::check;
    use crate::ConfigError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn failure(value: serde_json::Value) -> (String, String) {
        match check(&value, "test") {
            Err(ConfigError::InvalidField { path, message }) => (path, message),
            other => panic!("expected a field error, got {other:?}"),
        }
    }

    #[test]
    fn nested_blocks_are_checked() {
        assert_eq!(
            failure(json!({ "store": { "fallback": { "enabled": "on" } } })),
            (
                "test:store.fallback.enabled".to_string(),
                "expected bool".to_string()
            )
        );
    }

    #[test]
    fn port_must_fit() {
        assert_eq!(
            failure(json!({ "server": { "port": 70000 } })).1,
            "expected port number"
        );
    }

    #[test]
    fn non_object_root_is_reported_as_root() {
        assert_eq!(failure(json!([1])).0, "test:root");
    }

    #[test]
    fn full_layout_is_accepted() {
        check(
            &json!({
                "classifier": { "provider": "openai", "timeout_ms": 5000 },
                "store": { "provider": "csv", "path": "data", "fallback": { "enabled": false } },
                "executor": { "find_limit": 200 },
                "sessions": { "provider": "file", "path": "sessions" },
                "server": { "address": "0.0.0.0", "port": 8080 },
            }),
            "test",
        )
        .expect("valid");
    }
}
