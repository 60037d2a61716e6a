use agentsms::models::EventMetadata;
use chrono::{Duration, Utc};
use serde_json::json;

#[test]
fn default_metadata_has_no_backoff_and_zero_retries() {
    let metadata = EventMetadata::default();
    assert_eq!(metadata.retry_count, 0);
    assert!(metadata.last_error.is_none());
    assert!(metadata.not_before.is_none());
}

#[test]
fn to_json_and_from_json_round_trip() {
    let mut metadata = EventMetadata::default();
    metadata.retry_count = 2;
    metadata.last_error = Some("handler panicked".into());
    metadata.not_before = Some(Utc::now() + Duration::seconds(60));

    let restored = EventMetadata::from_json(&metadata.to_json());

    assert_eq!(restored.retry_count, metadata.retry_count);
    assert_eq!(restored.last_error, metadata.last_error);
    assert_eq!(restored.not_before, metadata.not_before);
}

#[test]
fn missing_fields_default_rather_than_failing_to_parse() {
    let metadata = EventMetadata::from_json(&json!({}));
    assert_eq!(metadata.retry_count, 0);
    assert!(metadata.not_before.is_none());
}
