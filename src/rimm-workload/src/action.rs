//! Workload actions: the typed shape of each decoded JSON event.

use serde::Deserialize;
use serde_json::Value;

use rimm_core::VarValue;

use crate::error::WorkloadError;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckDescriptor {
    pub group: String,
    pub name: String,
    pub cost: u64,
    pub priority: u8,
    #[serde(default)]
    pub misc: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortCheck {
    pub group: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum Action {
    NewCheck(Vec<CheckDescriptor>),
    RemoveCheck(Vec<ShortCheck>),
    ChangeVars(Vec<(String, VarValue)>),
    EndSim,
}

#[derive(Debug, Clone)]
pub struct WorkloadEvent {
    pub time: u64,
    pub action: Action,
}

/// Parses one already-decoded JSON object into a [`WorkloadEvent`]. Called
/// regardless of whether schema validation ran first (`--validate` is
/// optional; this must not panic on a shape `schema::validate` would have
/// rejected).
pub fn parse_event(value: &Value) -> Result<WorkloadEvent, WorkloadError> {
    let obj = value
        .as_object()
        .ok_or_else(|| WorkloadError::SchemaViolation("workload event must be a JSON object".into()))?;

    let action_name = obj
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| WorkloadError::SchemaViolation("missing or non-string `action`".into()))?;

    let time = obj
        .get("time")
        .and_then(Value::as_u64)
        .ok_or_else(|| WorkloadError::SchemaViolation("missing or invalid `time`".into()))?;

    let action = match action_name {
        "endsim" => Action::EndSim,
        "newcheck" => {
            let checks = obj.get("checks").cloned().unwrap_or(Value::Array(Vec::new()));
            Action::NewCheck(serde_json::from_value(checks)?)
        }
        "removecheck" => {
            let checks = obj.get("checks").cloned().unwrap_or(Value::Array(Vec::new()));
            Action::RemoveCheck(serde_json::from_value(checks)?)
        }
        "changevars" => {
            let vars = obj.get("vars").and_then(Value::as_object).cloned().unwrap_or_default();
            let mut pairs = Vec::with_capacity(vars.len());
            for (key, value) in vars {
                let var_value = match value {
                    Value::String(s) => VarValue::Str(s),
                    Value::Number(n) if n.is_u64() => VarValue::Int(n.as_u64().unwrap()),
                    other => {
                        return Err(WorkloadError::SchemaViolation(format!(
                            "unsupported value for `{key}`: {other}"
                        )))
                    }
                };
                pairs.push((key, var_value));
            }
            Action::ChangeVars(pairs)
        }
        other => return Err(WorkloadError::SchemaViolation(format!("unknown action `{other}`"))),
    };

    Ok(WorkloadEvent { time, action })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_newcheck() {
        let value = serde_json::json!({
            "action": "newcheck",
            "time": 0,
            "checks": [{"group": "G", "name": "C", "cost": 120, "priority": 10}],
        });
        let event = parse_event(&value).unwrap();
        assert_eq!(event.time, 0);
        match event.action {
            Action::NewCheck(checks) => {
                assert_eq!(checks.len(), 1);
                assert_eq!(checks[0].cost, 120);
            }
            _ => panic!("expected NewCheck"),
        }
    }

    #[test]
    fn parses_changevars_with_mixed_types() {
        let value = serde_json::json!({
            "action": "changevars",
            "time": 5,
            "vars": {"binpacker": "LeastRecentBin", "binsize": 200},
        });
        let event = parse_event(&value).unwrap();
        match event.action {
            Action::ChangeVars(vars) => {
                assert_eq!(vars.len(), 2);
                assert!(vars.iter().any(|(k, v)| k == "binpacker" && *v == VarValue::Str("LeastRecentBin".into())));
                assert!(vars.iter().any(|(k, v)| k == "binsize" && *v == VarValue::Int(200)));
            }
            _ => panic!("expected ChangeVars"),
        }
    }

    #[test]
    fn rejects_unknown_action() {
        let value = serde_json::json!({"action": "frobnicate", "time": 0});
        assert!(parse_event(&value).is_err());
    }
}
