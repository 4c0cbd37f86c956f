//! Workload schema validation: hand-rolled checks over a decoded
//! `serde_json::Value` for the four fixed action shapes (no general JSON
//! Schema crate needed for such a small, fixed set of documents).

use serde_json::{Map, Value};

use rimm_core::{PACKER_NAMES, SPLITTER_NAMES};

use crate::error::WorkloadError;

const TOP_LEVEL_ACTIONS: &[&str] = &["endsim", "newcheck", "removecheck", "changevars"];
const KNOWN_VARS: &[&str] =
    &["taskgran", "smmpersecond", "smmoverhead", "binsize", "cpus", "binpacker", "checksplitter", "rantask"];
const CHECK_FIELDS: &[&str] = &["group", "name", "cost", "priority", "misc"];
const SHORTCHECK_FIELDS: &[&str] = &["group", "name"];

/// Validates one decoded workload event. A violation does not say which
/// layer (schema vs domain) rejected it; callers decide fatal-vs-warn
/// based on `--interactive`.
pub fn validate(value: &Value) -> Result<(), WorkloadError> {
    let obj = value.as_object().ok_or_else(|| violation("event must be a JSON object"))?;

    let action = obj
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| violation("missing or non-string `action`"))?;
    if !TOP_LEVEL_ACTIONS.contains(&action) {
        return Err(violation(format!("unknown action `{action}`")));
    }

    let time = obj.get("time").ok_or_else(|| violation("missing `time`"))?;
    let time = time.as_i64().ok_or_else(|| violation("`time` must be an integer"))?;
    if time < 0 {
        return Err(violation("`time` must be >= 0"));
    }

    match action {
        "endsim" => Ok(()),
        "newcheck" => validate_checks(obj, true),
        "removecheck" => validate_checks(obj, false),
        "changevars" => validate_vars(obj),
        _ => unreachable!("checked against TOP_LEVEL_ACTIONS above"),
    }
}

fn violation(msg: impl Into<String>) -> WorkloadError {
    WorkloadError::SchemaViolation(msg.into())
}

fn validate_checks(obj: &Map<String, Value>, full: bool) -> Result<(), WorkloadError> {
    let checks =
        obj.get("checks").and_then(Value::as_array).ok_or_else(|| violation("missing `checks` array"))?;
    if checks.is_empty() {
        return Err(violation("`checks` must be non-empty"));
    }
    let allowed = if full { CHECK_FIELDS } else { SHORTCHECK_FIELDS };

    for check in checks {
        let check_obj = check.as_object().ok_or_else(|| violation("check entry must be an object"))?;
        for key in check_obj.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(violation(format!("unexpected field `{key}` in check entry")));
            }
        }
        if check_obj.get("group").and_then(Value::as_str).is_none()
            || check_obj.get("name").and_then(Value::as_str).is_none()
        {
            return Err(violation("check entry requires `group` and `name` strings"));
        }
        if full {
            match check_obj.get("cost").and_then(Value::as_u64) {
                Some(c) if c >= 1 => {}
                _ => return Err(violation("`cost` must be an integer >= 1")),
            }
            match check_obj.get("priority").and_then(Value::as_u64) {
                Some(p) if (1..=20).contains(&p) => {}
                _ => return Err(violation("`priority` must be an integer in 1..=20")),
            }
        }
    }
    Ok(())
}

fn validate_vars(obj: &Map<String, Value>) -> Result<(), WorkloadError> {
    let vars = obj.get("vars").and_then(Value::as_object).ok_or_else(|| violation("missing `vars` object"))?;

    for (key, value) in vars {
        if !KNOWN_VARS.contains(&key.as_str()) {
            return Err(violation(format!("unknown var `{key}`")));
        }
        match key.as_str() {
            "binpacker" => {
                let name = value.as_str().ok_or_else(|| violation("`binpacker` must be a string"))?;
                if !PACKER_NAMES.contains(&name) {
                    return Err(violation(format!("unknown binpacker `{name}`")));
                }
            }
            "checksplitter" => {
                let name = value.as_str().ok_or_else(|| violation("`checksplitter` must be a string"))?;
                if !SPLITTER_NAMES.contains(&name) {
                    return Err(violation(format!("unknown checksplitter `{name}`")));
                }
            }
            "rantask" => {
                let name = value.as_str().ok_or_else(|| violation("`rantask` must be a string"))?;
                if name != "reschedule" && name != "discard" {
                    return Err(violation(format!("unknown rantask policy `{name}`")));
                }
            }
            _ => {
                if value.as_u64().is_none() {
                    return Err(violation(format!("`{key}` must be a non-negative integer")));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_well_formed_newcheck() {
        let value = serde_json::json!({
            "action": "newcheck",
            "time": 0,
            "checks": [{"group": "G", "name": "C", "cost": 120, "priority": 10}],
        });
        assert!(validate(&value).is_ok());
    }

    #[test]
    fn rejects_negative_time() {
        let value = serde_json::json!({"action": "endsim", "time": -1});
        assert!(validate(&value).is_err());
    }

    #[test]
    fn rejects_unknown_var_key() {
        let value = serde_json::json!({"action": "changevars", "time": 0, "vars": {"bogus": 1}});
        assert!(validate(&value).is_err());
    }

    #[test]
    fn rejects_unknown_binpacker_name() {
        let value =
            serde_json::json!({"action": "changevars", "time": 0, "vars": {"binpacker": "NotAPacker"}});
        assert!(validate(&value).is_err());
    }

    #[test]
    fn rejects_additional_properties_on_check_entry() {
        let value = serde_json::json!({
            "action": "newcheck",
            "time": 0,
            "checks": [{"group": "G", "name": "C", "cost": 1, "priority": 1, "extra": true}],
        });
        assert!(validate(&value).is_err());
    }
}
