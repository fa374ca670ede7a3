//! Integration tests for the producer over the HTTP transport
//!
//! These tests verify:
//! - Queue URL lookup happens once per queue and is then reused
//! - A single send reaches the service with the Headers attribute
//! - A batch with a rejected entry fails as a whole

use sqs_producer::{ProducerError, SqsConnectionConfig, SqsContext, SqsMessage};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUEUE_URL: &str = "http://localhost:4566/000000000000/orders";

fn context_for(server: &MockServer) -> SqsContext {
    let config = SqsConnectionConfig::from_dsn(&format!(
        "sqs:?key=test&secret=test&region=us-east-1&endpoint={}",
        server.uri()
    ))
    .expect("valid DSN");
    SqsContext::from_config(config).expect("transport")
}

async fn mount_queue_url(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("Action=GetQueueUrl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<GetQueueUrlResponse><GetQueueUrlResult><QueueUrl>{}</QueueUrl></GetQueueUrlResult></GetQueueUrlResponse>",
            QUEUE_URL
        )))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_send_resolves_queue_once_and_sends() {
    let server = MockServer::start().await;
    mount_queue_url(&server).await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("Action=SendMessage"))
        .and(body_string_contains("MessageAttribute.1.Name=Headers"))
        .and(body_string_contains("DelaySeconds=5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<SendMessageResponse><SendMessageResult><MessageId>abc-123</MessageId></SendMessageResult></SendMessageResponse>",
        ))
        .expect(2)
        .mount(&server)
        .await;

    let context = context_for(&server);
    let mut producer = context.create_producer();
    producer.set_delivery_delay(Some(5000));
    let queue = context.create_queue("orders");

    for body in ["first", "second"] {
        let sent = producer
            .send(&queue, &context.create_message(body).with_header("hkey", "hvalue"))
            .await
            .expect("message sent");
        assert_eq!(sent.message_id.as_str(), "abc-123");
    }
}

#[tokio::test]
async fn test_batch_with_rejected_entry_fails() {
    let server = MockServer::start().await;
    mount_queue_url(&server).await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("Action=SendMessageBatch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<SendMessageBatchResponse><SendMessageBatchResult>\
             <SendMessageBatchResultEntry><Id>msg-0</Id><MessageId>ok-0</MessageId></SendMessageBatchResultEntry>\
             <BatchResultErrorEntry><Id>msg-1</Id><Code>InternalError</Code><Message>boom</Message><SenderFault>false</SenderFault></BatchResultErrorEntry>\
             </SendMessageBatchResult></SendMessageBatchResponse>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let context = context_for(&server);
    let producer = context.create_producer();

    let result = producer
        .send_all(
            &context.create_queue("orders"),
            &[SqsMessage::new("one"), SqsMessage::new("two")],
        )
        .await;

    match result {
        Err(error @ ProducerError::BatchPartialFailure { .. }) => {
            assert_eq!(
                error.to_string(),
                r#"Messages were not sent: [{"Code":"InternalError","Id":"msg-1","Message":"boom","SenderFault":false}]"#
            );
            assert!(error.is_transient());
        }
        other => panic!("expected BatchPartialFailure, got {:?}", other),
    }
}
