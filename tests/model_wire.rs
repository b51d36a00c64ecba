mod common;

use common::{openai_text, openai_tool_calls, spawn, FakeModel};
use serde_json::json;
use wizard_agent::{
    AgentConfig, AgentError, AnthropicClient, LanguageModel, Message, OpenAiClient, Provider,
    ToolCall, ToolResult, ToolsConfig,
};

async fn config_for(fake: &FakeModel, provider: Provider) -> AgentConfig {
    let base = spawn(fake.router()).await;
    let mut cfg = AgentConfig::new("sk-test").unwrap();
    cfg.provider = provider;
    cfg.endpoint = base;
    cfg
}

fn schemas() -> Vec<wizard_agent::ToolSchema> {
    wizard_agent::standard_toolkit(&ToolsConfig::default())
        .unwrap()
        .schemas()
}

#[tokio::test]
async fn openai_request_carries_auth_and_function_tools() {
    let fake = FakeModel::new(vec![openai_tool_calls(&[(
        "call_1",
        "book_recs",
        json!({"topic": "mystery", "limit": 2}),
    )])]);
    let cfg = config_for(&fake, Provider::OpenAi).await;
    let client = OpenAiClient::from_config(&cfg).unwrap();

    let completion = client
        .complete_chat(&[Message::system("sys"), Message::user("books")], &schemas())
        .await
        .unwrap();

    assert_eq!(
        completion.tool_calls,
        vec![ToolCall::new("call_1", "book_recs", json!({"topic": "mystery", "limit": 2}))]
    );

    let sent = &fake.recorded()[0];
    assert_eq!(sent.headers["authorization"], "Bearer sk-test");
    assert_eq!(sent.body["model"], cfg.model);
    assert_eq!(sent.body["temperature"], json!(0.7));
    assert_eq!(sent.body["max_tokens"], json!(4096));
    assert_eq!(sent.body["tool_choice"], "auto");
    let tools = sent.body["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 5);
    assert_eq!(tools[0]["type"], "function");
    assert_eq!(tools[0]["function"]["name"], "get_weather");
    assert_eq!(
        tools[1]["function"]["parameters"]["required"],
        json!(["topic"])
    );
}

#[tokio::test]
async fn openai_omits_tools_when_none_are_given() {
    let fake = FakeModel::new(vec![openai_text("hello")]);
    let cfg = config_for(&fake, Provider::OpenAi).await;
    let client = OpenAiClient::from_config(&cfg).unwrap();

    let completion = client.complete_chat(&[Message::user("hi")], &[]).await.unwrap();

    assert_eq!(completion.content.as_deref(), Some("hello"));
    let body = &fake.recorded()[0].body;
    assert!(body.get("tools").is_none());
    assert!(body.get("tool_choice").is_none());
}

#[tokio::test]
async fn openai_assigns_ids_when_the_endpoint_omits_them() {
    let fake = FakeModel::new(vec![json!({
        "choices": [{
            "message": {
                "content": null,
                "tool_calls": [
                    {"type": "function", "function": {"name": "random_joke", "arguments": ""}},
                    {"type": "function", "function": {"name": "random_joke", "arguments": ""}}
                ]
            }
        }]
    })]);
    let cfg = config_for(&fake, Provider::OpenAi).await;
    let client = OpenAiClient::from_config(&cfg).unwrap();

    let completion = client.complete_chat(&[Message::user("jokes")], &schemas()).await.unwrap();

    let ids: Vec<&str> = completion.tool_calls.iter().map(|c| c.id.as_str()).collect();
    assert!(ids.iter().all(|id| id.starts_with("call_")));
    assert_ne!(ids[0], ids[1]);
    assert_eq!(completion.tool_calls[0].arguments, json!({}));
}

#[tokio::test]
async fn server_errors_are_model_unavailable() {
    let fake = FakeModel::new(Vec::new());
    let cfg = config_for(&fake, Provider::OpenAi).await;
    let client = OpenAiClient::from_config(&cfg).unwrap();

    let err = client.complete_chat(&[Message::user("hi")], &[]).await.unwrap_err();

    match err {
        AgentError::ModelUnavailable(message) => assert!(message.contains("500")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn anthropic_request_uses_nested_tools_and_tool_result_blocks() {
    let fake = FakeModel::new(vec![json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [
            {"type": "thinking", "thinking": "hmm"},
            {"type": "text", "text": "Let me check."},
            {"type": "tool_use", "id": "toolu_2", "name": "trivia", "input": {}}
        ],
        "stop_reason": "tool_use"
    })]);
    let cfg = config_for(&fake, Provider::Anthropic).await;
    let client = AnthropicClient::from_config(&cfg).unwrap();

    let history = vec![
        Message::system("be brief"),
        Message::user("dog then trivia"),
        Message::assistant_with_calls(None, vec![ToolCall::new("toolu_1", "random_dog", json!({}))]),
        Message::tool(ToolResult {
            tool_call_id: "toolu_1".into(),
            name: "random_dog".into(),
            output: json!({"image_url": "https://images.dog.ceo/x.jpg"}),
        }),
    ];
    let completion = client.complete_chat(&history, &schemas()).await.unwrap();

    assert_eq!(completion.content.as_deref(), Some("Let me check."));
    assert_eq!(completion.tool_calls[0].id, "toolu_2");
    assert_eq!(completion.tool_calls[0].name, "trivia");

    let sent = &fake.recorded()[0];
    assert_eq!(sent.headers["x-api-key"], "sk-test");
    assert_eq!(sent.headers["anthropic-version"], "2023-06-01");
    assert_eq!(sent.body["system"], "be brief");
    assert_eq!(sent.body["tools"][0]["name"], "get_weather");
    assert!(sent.body["tools"][0]["input_schema"]["properties"]["latitude"].is_object());
    assert!(sent.body["tools"][0].get("function").is_none());

    let messages = sent.body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["content"][0]["type"], "tool_use");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"][0]["type"], "tool_result");
    assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
}
