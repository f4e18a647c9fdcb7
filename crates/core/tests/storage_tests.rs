// ═══════════════════════════════════════════════════════════════════
// Storage Tests — document layout, atomic JSON I/O, StorageManager
// ═══════════════════════════════════════════════════════════════════

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};

use stock_tracker_core::errors::CoreError;
use stock_tracker_core::models::portfolio::Portfolio;
use stock_tracker_core::models::price::{PricePoint, QuoteSnapshot};
use stock_tracker_core::models::short_interest::{
    ShortHistoryPoint, ShortInterestDocument, ShortPosition,
};
use stock_tracker_core::models::stock::Stock;
use stock_tracker_core::models::transaction::{Transaction, TransactionKind};
use stock_tracker_core::storage::manager::StorageManager;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// Directory handling
// ═══════════════════════════════════════════════════════════════════

mod directory {
    use super::*;

    #[test]
    fn new_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep").join("data");
        let storage = StorageManager::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(storage.data_dir(), nested);
    }

    #[test]
    fn new_fails_when_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("blocker");
        std::fs::write(&file, b"x").unwrap();
        let err = StorageManager::new(&file).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn document_paths_live_in_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        assert_eq!(
            storage.portfolio_path().file_name().unwrap(),
            "portfolio.json"
        );
        assert_eq!(storage.quotes_path().file_name().unwrap(), "quotes.json");
        assert_eq!(storage.history_path().file_name().unwrap(), "history.json");
        assert_eq!(
            storage.short_interest_path().file_name().unwrap(),
            "short_interest.json"
        );
        assert_eq!(
            storage.short_history_path().file_name().unwrap(),
            "short_history.json"
        );
    }
}

// ═══════════════════════════════════════════════════════════════════
// Portfolio document
// ═══════════════════════════════════════════════════════════════════

mod portfolio_document {
    use super::*;

    fn sample_portfolio() -> Portfolio {
        let mut portfolio = Portfolio::default();
        portfolio
            .stocks
            .push(Stock::new("AAPL", "Apple Inc.", "USD").unwrap());
        portfolio.transactions.push(Transaction::new(
            TransactionKind::Buy,
            "AAPL",
            10,
            150.0,
            1.0,
            d(2026, 1, 5),
        ));
        portfolio
    }

    #[test]
    fn save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        storage.save_portfolio(&sample_portfolio()).unwrap();
        let loaded = storage.load_portfolio().unwrap().unwrap();
        assert_eq!(loaded.stocks.len(), 1);
        assert_eq!(loaded.transactions.len(), 1);
        assert_eq!(loaded.transactions[0].ticker, "AAPL");
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        assert!(storage.load_portfolio().unwrap().is_none());
    }

    #[test]
    fn load_corrupt_file_is_deserialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        std::fs::write(storage.portfolio_path(), b"{ truncated").unwrap();

        let err = storage.load_portfolio().unwrap_err();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        storage.save_portfolio(&sample_portfolio()).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn save_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        storage.save_portfolio(&sample_portfolio()).unwrap();
        let mut updated = sample_portfolio();
        updated
            .stocks
            .push(Stock::new("MSFT", "Microsoft", "USD").unwrap());
        storage.save_portfolio(&updated).unwrap();

        let loaded = storage.load_portfolio().unwrap().unwrap();
        assert_eq!(loaded.stocks.len(), 2);
    }

    #[test]
    fn document_is_human_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        storage.save_portfolio(&sample_portfolio()).unwrap();

        let text = std::fs::read_to_string(storage.portfolio_path()).unwrap();
        assert!(text.contains("\"AAPL\""));
        assert!(text.contains('\n')); // pretty-printed
    }
}

// ═══════════════════════════════════════════════════════════════════
// Quote cache documents
// ═══════════════════════════════════════════════════════════════════

mod quote_documents {
    use super::*;

    #[test]
    fn snapshots_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let mut snapshots = HashMap::new();
        snapshots.insert(
            "AAPL".to_string(),
            QuoteSnapshot {
                price: 150.0,
                date: d(2026, 1, 5),
                last_fetch: Some(Utc::now()),
                fallback: false,
            },
        );
        storage.save_quote_snapshots(&snapshots).unwrap();

        let loaded = storage.load_quote_snapshots().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!((loaded["AAPL"].price - 150.0).abs() < f64::EPSILON);
        assert!(loaded["AAPL"].last_fetch.is_some());
    }

    #[test]
    fn history_round_trip_keyed_by_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let mut history = HashMap::new();
        history.insert(
            "AAPL".to_string(),
            vec![
                PricePoint {
                    date: d(2026, 1, 2),
                    price: 150.0,
                },
                PricePoint {
                    date: d(2026, 1, 3),
                    price: 151.0,
                },
            ],
        );
        storage.save_price_history(&history).unwrap();

        let loaded = storage.load_price_history().unwrap().unwrap();
        assert_eq!(loaded["AAPL"].len(), 2);
        assert_eq!(loaded["AAPL"][0].date, d(2026, 1, 2));
    }

    #[test]
    fn missing_cache_documents_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        assert!(storage.load_quote_snapshots().unwrap().is_none());
        assert!(storage.load_price_history().unwrap().is_none());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Short interest documents
// ═══════════════════════════════════════════════════════════════════

mod short_documents {
    use super::*;

    #[test]
    fn document_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let doc = ShortInterestDocument {
            last_updated: Some(Utc::now()),
            positions: vec![ShortPosition {
                ticker: "VOLV-B.ST".into(),
                percent_of_shares: 4.2,
                holders: vec![],
                date: d(2026, 8, 1),
            }],
        };
        storage.save_short_interest(&doc).unwrap();

        let loaded = storage.load_short_interest().unwrap().unwrap();
        assert_eq!(loaded.positions.len(), 1);
        assert_eq!(loaded.positions[0].ticker, "VOLV-B.ST");
    }

    #[test]
    fn history_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let mut history = HashMap::new();
        history.insert(
            "VOLV-B.ST".to_string(),
            vec![ShortHistoryPoint {
                date: d(2026, 8, 1),
                percent: 4.2,
            }],
        );
        storage.save_short_history(&history).unwrap();

        let loaded = storage.load_short_history().unwrap().unwrap();
        assert_eq!(loaded["VOLV-B.ST"].len(), 1);
    }
}
