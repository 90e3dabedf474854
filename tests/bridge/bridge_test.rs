//! Integration tests for the bridge client against an in-process parent.

#[path = "../common/mod.rs"]
mod common;

use common::Loopback;
use srcbridge::bridge::BridgeError;

// ============================================================================
// Round Trips
// ============================================================================

#[test]
fn test_read_returns_exact_bytes() {
    let parent = Loopback::new([
        ("a.ts", "export x = 1"),
        ("unicode.ts", "let s = \"héllo → wörld\"\n"),
        ("empty.ts", ""),
    ]);
    let client = parent.client();

    assert_eq!(
        client.read_file("a.ts").unwrap().as_deref(),
        Some(&b"export x = 1"[..])
    );
    assert_eq!(
        client.read_file("unicode.ts").unwrap().as_deref(),
        Some("let s = \"héllo → wörld\"\n".as_bytes())
    );
    assert_eq!(client.read_file("empty.ts").unwrap(), Some(Vec::new()));
}

#[test]
fn test_unknown_file_is_absent_not_error() {
    let parent = Loopback::new([("a.ts", "1")]);
    let client = parent.client();

    assert_eq!(client.read_file("missing.ts").unwrap(), None);
    assert!(!client.file_exists("missing.ts").unwrap());
    assert!(client.file_exists("a.ts").unwrap());

    // The session is still usable afterwards.
    assert_eq!(client.read_file("a.ts").unwrap(), Some(b"1".to_vec()));
    assert!(!client.is_poisoned());
}

#[test]
fn test_sequential_requests_stay_in_step() {
    let files: Vec<(String, String)> = (0..50)
        .map(|i| (format!("f{i}.ts"), format!("let v{i} = {}", i * i)))
        .collect();
    let parent = Loopback::new(files.iter().map(|(p, c)| (p.as_str(), c.as_str())));
    let client = parent.client();

    for (i, (path, contents)) in files.iter().enumerate() {
        if i % 3 == 0 {
            assert!(client.file_exists(path).unwrap());
        }
        assert_eq!(
            client.read_file(path).unwrap(),
            Some(contents.as_bytes().to_vec()),
            "response {i} out of step"
        );
    }

    assert_eq!(client.round_trips(), 50 + 17);
    assert_eq!(parent.requests().len(), 50 + 17);
}

#[test]
fn test_request_lines_on_the_wire() {
    let parent = Loopback::new([("lib/a.ts", "1")]);
    let client = parent.client();

    client.file_exists("lib/a.ts").unwrap();
    client.read_file("lib/a.ts").unwrap();

    assert_eq!(
        parent.request_lines(),
        vec![
            "SRCBRIDGE_FILEEXISTSlib/a.ts".to_string(),
            "SRCBRIDGE_READFILElib/a.ts".to_string(),
        ]
    );
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_truncated_body_is_an_error() {
    // "12 export x = 1" cut after the header and four body bytes.
    let parent = Loopback::new([("a.ts", "export x = 1")]).truncate("a.ts", 7);
    let client = parent.client();

    let err = client.read_file("a.ts").unwrap_err();
    match err {
        BridgeError::TruncatedStream { expected, received } => {
            assert_eq!(expected, 12);
            assert_eq!(received, 4);
        }
        other => panic!("expected TruncatedStream, got {other:?}"),
    }
    assert!(client.is_poisoned());
    assert!(matches!(
        client.read_file("a.ts"),
        Err(BridgeError::Poisoned)
    ));
}

#[test]
fn test_truncated_header_is_an_error() {
    let parent = Loopback::new([("a.ts", "export x = 1")]).truncate("a.ts", 1);
    let client = parent.client();

    assert!(matches!(
        client.read_file("a.ts"),
        Err(BridgeError::TruncatedStream { .. })
    ));
}

#[test]
fn test_newline_in_path_is_rejected_without_poisoning() {
    let parent = Loopback::new([("a.ts", "1")]);
    let client = parent.client();

    assert!(matches!(
        client.read_file("a\n.ts"),
        Err(BridgeError::InvalidPath(_))
    ));
    assert!(parent.requests().is_empty());
    assert_eq!(client.read_file("a.ts").unwrap(), Some(b"1".to_vec()));
}
