//! Integration tests for events

#[cfg(test)]
mod tests {
    use batchwrite_errors::WriteError;
    use batchwrite_events::*;
    use std::io;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_event_sender_emit() {
        let (tx, mut rx) = channel();
        let batch_id = Uuid::new_v4();

        tx.emit(WriteEvent::BatchStarted { batch_id, files: 2 });
        tx.emit(WriteEvent::CleanupSwept { removed: 0 });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.batch_id(), Some(batch_id));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second, WriteEvent::CleanupSwept { removed: 0 }));
        assert_eq!(second.batch_id(), None);
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit(WriteEvent::CleanupSwept { removed: 3 });
    }

    #[test]
    fn test_absent_sender_is_silent() {
        let sender: Option<EventSender> = None;
        sender.emit(WriteEvent::CleanupSwept { removed: 1 });
    }

    #[test]
    fn test_log_levels() {
        let failure = FailureContext::from_error(&WriteError::commit(
            "/tmp/a",
            "/srv/a",
            io::Error::from(io::ErrorKind::NotFound),
        ));
        assert_eq!(failure.code.as_deref(), Some("write.commit_failed"));

        let failed = WriteEvent::BatchFailed {
            batch_id: Uuid::new_v4(),
            phase: "commit".into(),
            failure,
        };
        assert_eq!(failed.log_level(), tracing::Level::ERROR);
        assert_eq!(failed.log_target(), "batchwrite::events::batch");

        let swept = WriteEvent::CleanupSwept { removed: 2 };
        assert_eq!(swept.log_level(), tracing::Level::WARN);
        let idle = WriteEvent::CleanupSwept { removed: 0 };
        assert_eq!(idle.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_event_serialization() {
        let event = WriteEvent::CleanupSwept { removed: 4 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"cleanup_swept","removed":4}"#);
    }
}
