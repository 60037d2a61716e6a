use agentsms::app::renderer::{Renderer, TemplateRenderer, UserContext};
use agentsms::models::DieselUlid;
use serde_json::json;

fn empty_context() -> UserContext {
    UserContext { user_id: DieselUlid::new(), recent_messages: Vec::new() }
}

#[tokio::test]
async fn renders_known_payload_types_from_their_template() {
    let renderer = TemplateRenderer::new();
    let payload = json!({ "type": "solution_update", "topic": "billing", "summary": "fixed the invoice bug" });

    let text = renderer.render(&payload, &empty_context()).await.unwrap();

    assert_eq!(text, "Update on billing: fixed the invoice bug");
}

#[tokio::test]
async fn unregistered_payload_type_falls_back_to_the_other_template() {
    let renderer = TemplateRenderer::new();
    let payload = json!({ "type": "some_future_producer_type" });

    let text = renderer.render(&payload, &empty_context()).await.unwrap();

    assert_eq!(text, "You have a new update.");
}

#[tokio::test]
async fn missing_type_tag_also_falls_back_to_other() {
    let renderer = TemplateRenderer::new();
    let payload = json!({ "topic": "no type field here" });

    let text = renderer.render(&payload, &empty_context()).await.unwrap();

    assert_eq!(text, "You have a new update.");
}
