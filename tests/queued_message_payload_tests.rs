use agentsms::models::QueuedMessagePayload;

#[test]
fn welcome_and_other_share_no_semantic_slot_topic() {
    let welcome = QueuedMessagePayload::Welcome { persona: None };
    assert_eq!(welcome.semantic_slot(), ("welcome", None));
    assert_eq!(welcome.type_tag(), "welcome");
}

#[test]
fn solution_update_slot_is_keyed_by_topic() {
    let first = QueuedMessagePayload::SolutionUpdate { topic: "billing".into(), summary: "first pass".into() };
    let second = QueuedMessagePayload::SolutionUpdate { topic: "billing".into(), summary: "revised".into() };
    let other_topic = QueuedMessagePayload::SolutionUpdate { topic: "onboarding".into(), summary: "first pass".into() };

    assert_eq!(first.semantic_slot(), second.semantic_slot());
    assert_ne!(first.semantic_slot(), other_topic.semantic_slot());
}

#[test]
fn unknown_type_tag_deserializes_to_other_instead_of_failing() {
    let raw = serde_json::json!({ "type": "some_future_producer_type", "whatever": "field" });
    let payload: QueuedMessagePayload = serde_json::from_value(raw).expect("unknown payload types must not fail to parse");

    assert!(matches!(payload, QueuedMessagePayload::Other));
    assert_eq!(payload.type_tag(), "other");
}

#[test]
fn known_type_tag_deserializes_to_its_variant() {
    let raw = serde_json::json!({
        "type": "intro_opportunity",
        "topic": "partnership",
        "contact_name": "Alex",
    });
    let payload: QueuedMessagePayload = serde_json::from_value(raw).unwrap();

    match payload {
        QueuedMessagePayload::IntroOpportunity { topic, contact_name } => {
            assert_eq!(topic, "partnership");
            assert_eq!(contact_name, "Alex");
        }
        other => panic!("expected IntroOpportunity, got {other:?}"),
    }
}
