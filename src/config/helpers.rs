use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Custom deserializer for Duration from milliseconds
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Custom deserializer for Duration from seconds
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Custom serializer for Duration to milliseconds
pub fn serialize_duration_to_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Custom serializer for Duration to seconds
pub fn serialize_duration_to_seconds<S>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct TestDurationMs {
        #[serde(
            deserialize_with = "deserialize_duration_from_ms",
            serialize_with = "serialize_duration_to_ms"
        )]
        duration: Duration,
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct TestDurationSecs {
        #[serde(
            deserialize_with = "deserialize_duration_from_seconds",
            serialize_with = "serialize_duration_to_seconds"
        )]
        duration: Duration,
    }

    #[test]
    fn test_deserialize_duration_from_ms() {
        let json = r#"{"duration": 5000}"#;
        let actual: TestDurationMs = serde_json::from_str(json).unwrap();
        assert_eq!(actual, TestDurationMs { duration: Duration::from_millis(5000) });
    }

    #[test]
    fn test_serialize_duration_to_ms() {
        let data = TestDurationMs { duration: Duration::from_millis(5000) };
        assert_eq!(serde_json::to_string(&data).unwrap(), r#"{"duration":5000}"#);
    }

    #[test]
    fn test_deserialize_duration_from_seconds() {
        let json = r#"{"duration": 7200}"#;
        let actual: TestDurationSecs = serde_json::from_str(json).unwrap();
        assert_eq!(actual, TestDurationSecs { duration: Duration::from_secs(7200) });
    }

    #[test]
    fn test_serialize_duration_to_seconds() {
        let data = TestDurationSecs { duration: Duration::from_secs(5) };
        assert_eq!(serde_json::to_string(&data).unwrap(), r#"{"duration":5}"#);
    }

    #[test]
    fn test_deserialize_negative_duration_fails() {
        let json = r#"{"duration": -1}"#;
        let result: Result<TestDurationSecs, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
