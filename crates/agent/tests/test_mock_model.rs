//! Agent runs against a mockall model client

use std::sync::Arc;

use analyzer_agent::{Agent, AgentError, Role};
use analyzer_llm::{LlmError, Message, ModelClient};
use async_trait::async_trait;
use mockall::predicate::function;
use mockall::{mock, Sequence};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

mock! {
    pub Model {}

    #[async_trait]
    impl ModelClient for Model {
        async fn call(&self, cancel: &CancellationToken, messages: &[Message]) -> Result<Message, LlmError>;
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct Verdict {
    label: String,
    confidence: f64,
}

fn classifier(model: MockModel) -> Agent<Verdict> {
    Agent::<Verdict>::builder("classifier")
        .behavior("Label the sentiment of the input text")
        .model_client(Arc::new(model))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_first_call_sees_system_and_user() {
    let mut model = MockModel::new();
    model
        .expect_call()
        .with(
            mockall::predicate::always(),
            function(|messages: &[Message]| {
                messages.len() == 2
                    && messages[0].role == Role::System
                    && messages[0].content.contains("Label the sentiment")
                    && messages[0].content.contains("\"confidence\"")
                    && messages[1].role == Role::User
                    && messages[1].content == "\"great movie\""
            }),
        )
        .times(1)
        .returning(|_, _| {
            Ok(Message::finish(
                r#"{"label": "positive", "confidence": 0.9}"#,
            ))
        });

    let agent = classifier(model);
    let result = agent
        .run(&CancellationToken::new(), "great movie")
        .await
        .unwrap();

    assert_eq!(result.data.label, "positive");
    assert!(result.data.confidence > 0.8);
}

#[tokio::test]
async fn test_non_terminal_text_turn_continues() {
    let mut model = MockModel::new();
    let mut seq = Sequence::new();
    model
        .expect_call()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Message::assistant("Let me think.")));
    model
        .expect_call()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, messages| {
            assert_eq!(messages.len(), 3);
            Ok(Message::finish(r#"{"label": "neutral", "confidence": 0.5}"#))
        });

    let agent = classifier(model);
    let result = agent.run(&CancellationToken::new(), "meh").await.unwrap();

    assert_eq!(result.data.label, "neutral");
    assert_eq!(result.messages.len(), 4);
}

#[tokio::test]
async fn test_model_cancellation_maps_to_cancelled() {
    let mut model = MockModel::new();
    model
        .expect_call()
        .times(1)
        .returning(|_, _| Err(LlmError::Cancelled));

    let agent = classifier(model);
    let err = agent.run(&CancellationToken::new(), "x").await.unwrap_err();

    assert!(matches!(err.error, AgentError::Cancelled));
}
