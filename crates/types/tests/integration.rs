//! Integration tests for types

#[cfg(test)]
mod tests {
    use batchwrite_errors::WriteError;
    use batchwrite_types::*;
    use std::path::Path;
    use std::str::FromStr;

    #[test]
    fn test_request_defaults() {
        let request = WriteRequest::new("foo.txt", "foo");
        assert_eq!(request.effective_encoding(), Encoding::Utf8);
        assert!(request.mode.is_none());
        assert!(request.ownership.is_none());
        assert_eq!(request.contents, FileContents::Text("foo".to_string()));
    }

    #[test]
    fn test_mode_is_masked_to_permission_bits() {
        let request = WriteRequest::new("foo.txt", "foo").with_mode(0o100_741);
        assert_eq!(request.mode, Some(0o741));
    }

    #[test]
    fn test_zero_mode_is_explicit() {
        let request = WriteRequest::new("foo.txt", "foo").with_mode(0);
        assert_eq!(request.mode, Some(0));
    }

    #[test]
    fn test_bytes_ignore_encoding() {
        let contents = FileContents::from(vec![0xDE, 0xAD]);
        let bytes = contents.encode(Encoding::Hex, Path::new("foo.bin")).unwrap();
        assert_eq!(bytes.as_ref(), &[0xDE, 0xAD]);
    }

    #[test]
    fn test_text_uses_encoding() {
        let contents = FileContents::from("666f6f");
        let bytes = contents.encode(Encoding::Hex, Path::new("foo.txt")).unwrap();
        assert_eq!(bytes.as_ref(), b"foo");
    }

    #[test]
    fn test_invalid_content_names_path() {
        let contents = FileContents::from("not hex");
        match contents.encode(Encoding::Hex, Path::new("foo.txt")) {
            Err(WriteError::InvalidContent { path, encoding, .. }) => {
                assert_eq!(path, std::path::PathBuf::from("foo.txt"));
                assert_eq!(encoding, "hex");
            }
            other => panic!("expected InvalidContent, got {other:?}"),
        }
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(Encoding::from_str("UTF-8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::from_str("ucs2").unwrap(), Encoding::Utf16Le);
        assert_eq!(Encoding::from_str("binary").unwrap(), Encoding::Latin1);
        assert!(matches!(
            Encoding::from_str("ebcdic"),
            Err(WriteError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn test_encoding_serde() {
        let json = serde_json::to_string(&Encoding::Base64Url).unwrap();
        assert_eq!(json, "\"base64url\"");
        let parsed: Encoding = serde_json::from_str("\"utf-8\"").unwrap();
        assert_eq!(parsed, Encoding::Utf8);
    }

    #[test]
    fn test_ownership_serde() {
        let owner: Ownership = serde_json::from_str(r#"{"uid":420,"gid":430}"#).unwrap();
        assert_eq!(owner, Ownership::new(420, 430));
    }
}
