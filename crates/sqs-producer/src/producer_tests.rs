//! Tests for the SQS producer.

use super::*;
use crate::error::TransportError;
use crate::providers::InMemoryTransport;
use crate::transport::{BatchResultErrorEntry, SendMessageBatchOutput, SendMessageOutput};
use serde_json::json;
use std::sync::Arc;

const QUEUE_URL: &str = "theQueueUrl";

fn setup() -> (InMemoryTransport, SqsProducer) {
    let transport = InMemoryTransport::new().with_queue("queue-name", QUEUE_URL);
    let producer = SqsContext::new(Arc::new(transport.clone())).create_producer();
    (transport, producer)
}

fn destination() -> SqsDestination {
    SqsDestination::new("queue-name")
}

fn accepted(message_id: &str) -> SendMessageOutput {
    SendMessageOutput {
        message_id: Some(message_id.to_string()),
        ..SendMessageOutput::default()
    }
}

fn batch_entry(id: &str, message_id: &str) -> BatchResultEntry {
    BatchResultEntry {
        id: id.to_string(),
        message_id: message_id.to_string(),
        md5_of_message_body: None,
        md5_of_message_attributes: None,
        sequence_number: None,
    }
}

fn failed_entry(id: &str, sender_fault: bool) -> BatchResultErrorEntry {
    BatchResultErrorEntry {
        code: format!("code-{}", id),
        id: id.to_string(),
        message: format!("message {}", id),
        sender_fault,
    }
}

// ============================================================================
// Single Send
// ============================================================================

mod send {
    use super::*;

    #[tokio::test]
    async fn test_send_passes_full_argument_set() {
        let (transport, producer) = setup();
        transport.push_send_result(Ok(accepted("theMessageId")));

        let message = SqsMessage::new("theBody")
            .with_header("hkey", "hvaleu")
            .with_property("key", "value")
            .with_delay_seconds(12345)
            .with_message_deduplication_id("theDeduplicationId")
            .with_message_group_id("groupId");

        let sent = producer.send(&destination(), &message).await.unwrap();

        assert_eq!(sent.message_id.as_str(), "theMessageId");

        let requests = transport.queue_url_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].queue_name, "queue-name");

        let calls = transport.sent_messages();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            serde_json::to_value(&calls[0]).unwrap(),
            json!({
                "MessageAttributes": {
                    "Headers": {
                        "DataType": "String",
                        "StringValue": r#"[{"hkey":"hvaleu"},{"key":"value"}]"#,
                    },
                },
                "MessageBody": "theBody",
                "QueueUrl": "theQueueUrl",
                "DelaySeconds": 12345,
                "MessageDeduplicationId": "theDeduplicationId",
                "MessageGroupId": "groupId",
            })
        );
    }

    #[tokio::test]
    async fn test_producer_delivery_delay_is_used_when_message_has_none() {
        let (transport, mut producer) = setup();
        producer.set_delivery_delay(Some(5000));

        producer
            .send(&destination(), &SqsMessage::new("theBody"))
            .await
            .unwrap();

        assert_eq!(transport.sent_messages()[0].message.delay_seconds, Some(5));
    }

    #[tokio::test]
    async fn test_message_delay_overrides_producer_delivery_delay() {
        let (transport, mut producer) = setup();
        producer.set_delivery_delay(Some(5000));

        let message = SqsMessage::new("theBody").with_delay_seconds(12345);
        producer.send(&destination(), &message).await.unwrap();

        assert_eq!(
            transport.sent_messages()[0].message.delay_seconds,
            Some(12345)
        );
    }

    #[tokio::test]
    async fn test_no_delay_key_without_any_delay() {
        let (transport, producer) = setup();

        producer
            .send(&destination(), &SqsMessage::new("theBody"))
            .await
            .unwrap();

        let value = serde_json::to_value(&transport.sent_messages()[0]).unwrap();
        assert!(value.get("DelaySeconds").is_none());
    }

    #[tokio::test]
    async fn test_empty_body_fails_without_remote_calls() {
        let (transport, producer) = setup();

        let result = producer.send(&destination(), &SqsMessage::new("")).await;

        match result {
            Err(ProducerError::InvalidMessage { message }) => {
                assert_eq!(message, "The message body must be a non-empty string.");
            }
            other => panic!("expected InvalidMessage, got {:?}", other),
        }
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_body_is_checked_before_destination() {
        let (transport, producer) = setup();

        let result = producer
            .send(&SqsDestination::new(""), &SqsMessage::new(""))
            .await;

        assert!(matches!(result, Err(ProducerError::InvalidMessage { .. })));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_message_id_is_send_failure() {
        let (transport, producer) = setup();
        transport.push_send_result(Ok(SendMessageOutput::default()));

        let result = producer
            .send(&destination(), &SqsMessage::new("theBody"))
            .await;

        match result {
            Err(error @ ProducerError::SendFailed { source: None }) => {
                assert_eq!(error.to_string(), "Message was not sent");
            }
            other => panic!("expected SendFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_send_failure_with_source() {
        let (transport, producer) = setup();
        transport.push_send_result(Err(TransportError::Network("reset".to_string())));

        let result = producer
            .send(&destination(), &SqsMessage::new("theBody"))
            .await;

        match result {
            Err(error @ ProducerError::SendFailed { .. }) => {
                assert!(error.is_transient());
                assert!(matches!(
                    error,
                    ProducerError::SendFailed {
                        source: Some(TransportError::Network(_))
                    }
                ));
            }
            other => panic!("expected SendFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_queue_is_resolution_error() {
        let (transport, producer) = setup();

        let result = producer
            .send(&SqsDestination::new("missing"), &SqsMessage::new("body"))
            .await;

        assert!(matches!(result, Err(ProducerError::Resolution(_))));
        assert!(transport.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_sequence_number_is_passed_through() {
        let (transport, producer) = setup();
        transport.push_send_result(Ok(SendMessageOutput {
            sequence_number: Some("18849496460467696128".to_string()),
            ..accepted("theMessageId")
        }));

        let sent = producer
            .send(&SqsDestination::new("queue.fifo").with_queue_url(QUEUE_URL), &SqsMessage::new("body").with_message_group_id("g"))
            .await
            .unwrap();

        assert_eq!(
            sent.sequence_number.as_deref(),
            Some("18849496460467696128")
        );
    }

    #[tokio::test]
    async fn test_destination_region_reaches_transport() {
        let (transport, producer) = setup();

        producer
            .send(
                &destination().with_region("eu-west-1"),
                &SqsMessage::new("body"),
            )
            .await
            .unwrap();

        assert_eq!(
            transport.queue_url_requests()[0].region.as_deref(),
            Some("eu-west-1")
        );
        assert_eq!(
            transport.sent_messages()[0].region.as_deref(),
            Some("eu-west-1")
        );
    }
}

// ============================================================================
// Batch Send
// ============================================================================

mod send_all {
    use super::*;

    #[tokio::test]
    async fn test_batch_returns_ids_in_caller_order() {
        let (transport, producer) = setup();
        transport.push_batch_result(Ok(SendMessageBatchOutput {
            successful: vec![batch_entry("msg-1", "second"), batch_entry("msg-0", "first")],
            failed: Vec::new(),
        }));

        let sent = producer
            .send_all(
                &destination(),
                &[SqsMessage::new("one"), SqsMessage::new("two")],
            )
            .await
            .unwrap();

        let ids: Vec<_> = sent.iter().map(|e| e.message_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(sent[0].id, "msg-0");
    }

    #[tokio::test]
    async fn test_batch_entries_use_message_ids() {
        let (transport, producer) = setup();
        producer
            .send_all(
                &destination(),
                &[
                    SqsMessage::new("one").with_message_id("first"),
                    SqsMessage::new("two"),
                ],
            )
            .await
            .unwrap();

        let batches = transport.sent_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].queue_url, QUEUE_URL);
        let ids: Vec<_> = batches[0].entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "msg-1"]);
    }

    #[tokio::test]
    async fn test_batch_applies_delay_precedence_per_entry() {
        let (transport, mut producer) = setup();
        producer.set_delivery_delay(Some(3000));

        producer
            .send_all(
                &destination(),
                &[
                    SqsMessage::new("one").with_delay_seconds(7),
                    SqsMessage::new("two"),
                ],
            )
            .await
            .unwrap();

        let entries = &transport.sent_batches()[0].entries;
        assert_eq!(entries[0].message.delay_seconds, Some(7));
        assert_eq!(entries[1].message.delay_seconds, Some(3));
    }

    #[tokio::test]
    async fn test_any_failed_entry_fails_the_batch() {
        let (transport, producer) = setup();
        transport.push_batch_result(Ok(SendMessageBatchOutput {
            successful: vec![batch_entry("msg-0", "first")],
            failed: vec![BatchResultErrorEntry {
                code: "code".to_string(),
                id: "id".to_string(),
                message: "MESSAGE".to_string(),
                sender_fault: true,
            }],
        }));

        let result = producer
            .send_all(
                &destination(),
                &[SqsMessage::new("one"), SqsMessage::new("two")],
            )
            .await;

        match result {
            Err(error @ ProducerError::BatchPartialFailure { .. }) => {
                assert_eq!(
                    error.to_string(),
                    r#"Messages were not sent: [{"Code":"code","Id":"id","Message":"MESSAGE","SenderFault":true}]"#
                );
                assert!(!error.is_transient());
            }
            other => panic!("expected BatchPartialFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_entries_follow_caller_order() {
        let (transport, producer) = setup();
        transport.push_batch_result(Ok(SendMessageBatchOutput {
            successful: vec![batch_entry("msg-1", "second")],
            failed: vec![
                failed_entry("unknown", false),
                failed_entry("msg-2", false),
                failed_entry("msg-0", true),
            ],
        }));

        let result = producer
            .send_all(
                &destination(),
                &[
                    SqsMessage::new("one"),
                    SqsMessage::new("two"),
                    SqsMessage::new("three"),
                ],
            )
            .await;

        match result {
            Err(ProducerError::BatchPartialFailure { ref failed }) => {
                assert_eq!(
                    failed,
                    &vec![
                        failed_entry("msg-0", true),
                        failed_entry("msg-2", false),
                        failed_entry("unknown", false),
                    ]
                );
            }
            ref other => panic!("expected BatchPartialFailure, got {:?}", other),
        }
        assert_eq!(
            result.unwrap_err().to_string(),
            concat!(
                "Messages were not sent: [",
                r#"{"Code":"code-msg-0","Id":"msg-0","Message":"message msg-0","SenderFault":true},"#,
                r#"{"Code":"code-msg-2","Id":"msg-2","Message":"message msg-2","SenderFault":false},"#,
                r#"{"Code":"code-unknown","Id":"unknown","Message":"message unknown","SenderFault":false}"#,
                "]"
            )
        );
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_remote_call() {
        let (transport, producer) = setup();

        let sent = producer.send_all(&destination(), &[]).await.unwrap();

        assert!(sent.is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let (transport, producer) = setup();
        let messages: Vec<_> = (0..11)
            .map(|i| SqsMessage::new(format!("body-{}", i)))
            .collect();

        let result = producer.send_all(&destination(), &messages).await;

        assert!(matches!(
            result,
            Err(ProducerError::BatchTooLarge {
                size: 11,
                max_size: 10
            })
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_body_in_batch_fails_without_remote_calls() {
        let (transport, producer) = setup();

        let result = producer
            .send_all(
                &destination(),
                &[SqsMessage::new("one"), SqsMessage::new("")],
            )
            .await;

        assert!(matches!(result, Err(ProducerError::InvalidMessage { .. })));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unaccounted_entry_is_send_failure() {
        let (transport, producer) = setup();
        transport.push_batch_result(Ok(SendMessageBatchOutput {
            successful: vec![batch_entry("msg-0", "first")],
            failed: Vec::new(),
        }));

        let result = producer
            .send_all(
                &destination(),
                &[SqsMessage::new("one"), SqsMessage::new("two")],
            )
            .await;

        assert!(matches!(
            result,
            Err(ProducerError::SendFailed { source: None })
        ));
    }

    #[tokio::test]
    async fn test_batch_transport_error_is_send_failure() {
        let (transport, producer) = setup();
        transport.push_batch_result(Err(TransportError::Service {
            code: "ServiceUnavailable".to_string(),
            message: "try later".to_string(),
        }));

        let result = producer
            .send_all(&destination(), &[SqsMessage::new("one")])
            .await;

        assert!(matches!(
            result,
            Err(ProducerError::SendFailed {
                source: Some(TransportError::Service { .. })
            })
        ));
    }
}

// ============================================================================
// Producer Settings
// ============================================================================

mod settings {
    use super::*;

    #[test]
    fn test_delivery_delay_round_trips() {
        let (_, mut producer) = setup();

        assert_eq!(producer.delivery_delay(), None);
        producer.set_delivery_delay(Some(5000));
        assert_eq!(producer.delivery_delay(), Some(5000));
        producer.set_delivery_delay(None);
        assert_eq!(producer.delivery_delay(), None);
    }

    #[test]
    fn test_priority_is_unsupported() {
        let (_, mut producer) = setup();

        assert!(producer.set_priority(None).is_ok());
        assert_eq!(producer.priority(), None);

        let error = producer.set_priority(Some(4)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "The provider does not support priority feature"
        );
    }

    #[test]
    fn test_time_to_live_is_unsupported() {
        let (_, mut producer) = setup();

        assert!(producer.set_time_to_live(None).is_ok());
        assert_eq!(producer.time_to_live(), None);

        let error = producer.set_time_to_live(Some(1000)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "The provider does not support time to live feature"
        );
    }
}

// ============================================================================
// FIFO Queues
// ============================================================================

mod fifo {
    use super::*;

    #[test]
    fn test_missing_group_id_detection() {
        let fifo = SqsDestination::new("orders.fifo");
        let standard = SqsDestination::new("orders");

        assert!(is_missing_group_id(&fifo, &SqsMessage::new("body")));
        assert!(is_missing_group_id(
            &fifo,
            &SqsMessage::new("body").with_message_group_id("")
        ));
        assert!(!is_missing_group_id(
            &fifo,
            &SqsMessage::new("body").with_message_group_id("group")
        ));
        assert!(!is_missing_group_id(&standard, &SqsMessage::new("body")));
    }

    #[tokio::test]
    async fn test_missing_group_id_is_still_sent() {
        let (transport, producer) = setup();
        let fifo = SqsDestination::new("orders.fifo").with_queue_url(QUEUE_URL);

        producer
            .send(&fifo, &SqsMessage::new("body"))
            .await
            .unwrap();

        let calls = transport.sent_messages();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].message.message_group_id, None);
    }
}
