use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize an id that can be either a number or a numeric string.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    id_from_value(&val).map_err(serde::de::Error::custom)
}

pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(None),
        other => id_from_value(&other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

pub(crate) fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<Value> = Vec::deserialize(deserializer)?;
    values
        .iter()
        .map(|val| id_from_value(val).map_err(serde::de::Error::custom))
        .collect()
}

pub(crate) fn id_from_value(val: &Value) -> Result<u64, String> {
    match val {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("id must be a non-negative integer, got {n}")),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|err| format!("invalid id '{s}': {err}")),
        _ => Err("expected string or number for id".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        assert_eq!(id_from_value(&json!(7)), Ok(7));
        assert_eq!(id_from_value(&json!(" 12 ")), Ok(12));
        assert!(id_from_value(&json!(-1)).is_err());
        assert!(id_from_value(&json!(1.5)).is_err());
        assert!(id_from_value(&json!({"id": 1})).is_err());
    }
}
