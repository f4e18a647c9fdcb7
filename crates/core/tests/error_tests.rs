// ═══════════════════════════════════════════════════════════════════
// Error Tests — CoreError variants, Display formatting, From impls
// ═══════════════════════════════════════════════════════════════════

use stock_tracker_core::errors::CoreError;

// ── Display formatting ──────────────────────────────────────────────

mod display {
    use super::*;

    #[test]
    fn storage() {
        let err = CoreError::Storage("disk full".into());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn serialization() {
        let err = CoreError::Serialization("bad value".into());
        assert_eq!(err.to_string(), "Serialization error: bad value");
    }

    #[test]
    fn deserialization() {
        let err = CoreError::Deserialization("unexpected EOF".into());
        assert_eq!(err.to_string(), "Deserialization error: unexpected EOF");
    }

    #[test]
    fn api() {
        let err = CoreError::Api {
            provider: "Yahoo Finance".into(),
            message: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "API error (Yahoo Finance): rate limited");
    }

    #[test]
    fn network() {
        let err = CoreError::Network("connection refused".into());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn no_provider() {
        let err = CoreError::NoProvider;
        assert_eq!(err.to_string(), "No quote provider configured");
    }

    #[test]
    fn validation() {
        let err = CoreError::ValidationError("volume must be positive".into());
        assert_eq!(err.to_string(), "Validation failed: volume must be positive");
    }

    #[test]
    fn invalid_ticker() {
        let err = CoreError::InvalidTicker("not a ticker!".into());
        assert_eq!(err.to_string(), "Invalid ticker symbol: not a ticker!");
    }

    #[test]
    fn stock_not_found() {
        let err = CoreError::StockNotFound("XXXX".into());
        assert_eq!(err.to_string(), "Unknown stock: XXXX");
    }

    #[test]
    fn transaction_not_found() {
        let err = CoreError::TransactionNotFound("abc-123".into());
        assert_eq!(err.to_string(), "Transaction not found: abc-123");
    }

    #[test]
    fn price_not_available() {
        let err = CoreError::PriceNotAvailable {
            ticker: "AAPL".into(),
            date: "2026-01-15".into(),
        };
        assert_eq!(
            err.to_string(),
            "Price not available for AAPL on 2026-01-15"
        );
    }
}

// ── From conversions ────────────────────────────────────────────────

mod conversions {
    use super::*;

    #[test]
    fn from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CoreError = io.into();
        match err {
            CoreError::Storage(msg) => assert!(msg.contains("denied")),
            other => panic!("expected Storage, got {other:?}"),
        }
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn io_not_found_becomes_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}

// ── Error trait object compatibility ────────────────────────────────

mod trait_object {
    use super::*;

    #[test]
    fn is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(CoreError::NoProvider);
        assert_eq!(err.to_string(), "No quote provider configured");
    }

    #[test]
    fn debug_format_names_variant() {
        let err = CoreError::Network("timeout".into());
        let debug = format!("{err:?}");
        assert!(debug.contains("Network"));
        assert!(debug.contains("timeout"));
    }
}
