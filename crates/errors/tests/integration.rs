//! Integration tests for error types

#[cfg(test)]
mod tests {
    use batchwrite_errors::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_error_conversion() {
        let write_err = WriteError::commit(
            "/tmp/.batchwrite-1",
            "/srv/app.conf",
            io::Error::from(io::ErrorKind::NotFound),
        );
        let err: Error = write_err.into();
        assert!(matches!(err, Error::Write(_)));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::InvalidValue {
            field: "BATCHWRITE_STAGING".into(),
            value: "nowhere".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for BATCHWRITE_STAGING: nowhere"
        );
    }

    #[test]
    fn test_write_error_is_transparent() {
        let err: Error = WriteError::InvalidEncoding {
            name: "ebcdic".into(),
        }
        .into();
        assert_eq!(err.to_string(), "unknown encoding: ebcdic");
    }

    #[test]
    fn test_raw_os_error_preserved() {
        let source = io::Error::from_raw_os_error(18);
        let err = WriteError::commit("/tmp/a", "/mnt/b", source);
        assert_eq!(err.raw_os_error(), Some(18));
        assert_eq!(err.phase(), Phase::Commit);
    }

    #[test]
    fn test_error_clone() {
        let err = WriteError::stage(
            PathBuf::from("/srv/a"),
            PathBuf::from("/tmp/a"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert_eq!(cloned.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_phase_classification() {
        let resolve = WriteError::metadata("/srv/a", io::Error::from(io::ErrorKind::Other));
        assert_eq!(resolve.phase(), Phase::Resolve);

        let content = WriteError::InvalidContent {
            path: "/srv/a".into(),
            encoding: "hex".into(),
            message: "odd number of digits".into(),
        };
        assert_eq!(content.phase(), Phase::Stage);
        assert_eq!(content.kind(), io::ErrorKind::InvalidInput);
        assert!(content.io_error().is_none());
    }

    #[test]
    fn test_user_facing_codes() {
        let err: Error = WriteError::commit(
            "/tmp/a",
            "/srv/a",
            io::Error::from(io::ErrorKind::PermissionDenied),
        )
        .into();
        assert_eq!(err.user_code(), Some("write.commit_failed"));
        assert!(err.user_hint().is_some());
        assert!(!err.is_retryable());
    }
}
