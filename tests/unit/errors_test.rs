use vocab_gateway::types::errors::*;

// === TransportError -> GatewayError classification ===

#[test]
fn transport_401_and_403_are_auth_failures() {
    for status in [401u16, 403] {
        let err: GatewayError = TransportError::HttpStatus { status, body: String::new() }.into();
        assert_eq!(err, GatewayError::AuthFailure { status });
        assert_eq!(err.code(), "auth_failure");
    }
}

#[test]
fn transport_429_is_rate_limited() {
    let err: GatewayError = TransportError::HttpStatus { status: 429, body: "slow down".into() }.into();
    assert_eq!(err, GatewayError::RateLimited);
    assert_eq!(err.code(), "rate_limited");
}

#[test]
fn transport_other_status_keeps_body() {
    let err: GatewayError = TransportError::HttpStatus { status: 503, body: "overloaded".into() }.into();
    assert_eq!(err, GatewayError::Upstream { status: 503, body: "overloaded".into() });
    assert!(err.to_string().contains("503"));
}

#[test]
fn transport_timeout_and_network() {
    let timeout: GatewayError = TransportError::Timeout(1500).into();
    assert_eq!(timeout.code(), "timeout");
    assert_eq!(timeout.to_string(), "Upstream call timed out after 1500 ms");

    let network: GatewayError = TransportError::Network("refused".into()).into();
    assert_eq!(network.code(), "network_error");
}

#[test]
fn transport_invalid_request_is_not_a_call_failure() {
    let err: GatewayError = TransportError::InvalidRequest("builder error".into()).into();
    assert_eq!(err.code(), "validation_error");
    assert!(!err.is_call_failure());
}

// === Other conversions ===

#[test]
fn extract_errors_convert() {
    let malformed: GatewayError = ExtractError::MalformedResponse("eof".into()).into();
    assert_eq!(malformed.code(), "malformed_response");

    let empty: GatewayError = ExtractError::NoContentExtracted("choices[0].message.content".into()).into();
    assert_eq!(empty.code(), "no_content_extracted");
    assert!(empty.to_string().contains("choices[0].message.content"));
}

#[test]
fn crypto_errors_convert() {
    let too_large: GatewayError = CryptoError::PayloadTooLarge { len: 300, max: 190 }.into();
    assert_eq!(too_large, GatewayError::PayloadTooLarge { len: 300, max: 190 });

    let failed: GatewayError = CryptoError::DecryptionFailed("padding".into()).into();
    assert_eq!(failed.code(), "decryption_failed");

    let invalid: GatewayError = CryptoError::InvalidInput("empty".into()).into();
    assert_eq!(invalid.code(), "invalid_input");

    let key: GatewayError = CryptoError::InvalidKey("not pem".into()).into();
    assert_eq!(key.code(), "crypto_error");
}

#[test]
fn store_errors_convert() {
    let missing: GatewayError = StoreError::NotFound("abc".into()).into();
    assert_eq!(missing, GatewayError::NotFound("abc".into()));

    let invalid: GatewayError = StoreError::Validation("bad url".into()).into();
    assert_eq!(invalid.code(), "validation_error");

    let crypto: GatewayError = StoreError::Crypto(CryptoError::PayloadTooLarge { len: 200, max: 190 }).into();
    assert_eq!(crypto.code(), "payload_too_large");

    let db: GatewayError = StoreError::Database("locked".into()).into();
    assert_eq!(db.code(), "storage_error");
}

#[test]
fn path_error_is_validation() {
    let err: GatewayError = PathError::Invalid { path: "a..b".into(), reason: "empty segment".into() }.into();
    assert_eq!(err.code(), "validation_error");
    assert!(err.to_string().contains("a..b"));
}

#[test]
fn only_call_failures_flip_availability() {
    let call_failures = [
        GatewayError::AuthFailure { status: 401 },
        GatewayError::RateLimited,
        GatewayError::Timeout(10),
        GatewayError::Upstream { status: 500, body: String::new() },
        GatewayError::Network("x".into()),
        GatewayError::MalformedResponse("x".into()),
        GatewayError::NoContentExtracted("x".into()),
    ];
    for err in &call_failures {
        assert!(err.is_call_failure(), "{:?}", err);
    }

    let local = [
        GatewayError::Validation("x".into()),
        GatewayError::MissingSecret("x".into()),
        GatewayError::DecryptionFailed("x".into()),
        GatewayError::InvalidInput("x".into()),
        GatewayError::NotFound("x".into()),
    ];
    for err in &local {
        assert!(!err.is_call_failure(), "{:?}", err);
    }
}

#[test]
fn errors_implement_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(GatewayError::RateLimited);
    assert!(err.source().is_none());

    let err: Box<dyn std::error::Error> = Box::new(SettingsError::InvalidKey("nope".into()));
    assert_eq!(err.to_string(), "Invalid settings key: nope");
}
