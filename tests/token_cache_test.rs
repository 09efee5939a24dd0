mod common;

use common::{CountingExchange, gateway};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_one_exchange_then_cache_hits() {
    let exchange = Arc::new(CountingExchange::default());
    let gateway = gateway(exchange.clone());

    let first = gateway.access_token().await.unwrap();
    assert_eq!(exchange.calls(), 1);

    let second = gateway.access_token().await.unwrap();
    assert_eq!(exchange.calls(), 1);
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_single_flight() {
    let exchange = Arc::new(CountingExchange {
        delay: Some(Duration::from_millis(50)),
        ..CountingExchange::default()
    });
    let gateway = gateway(exchange.clone());

    let mut handles = Vec::new();
    for _ in 0..20 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move { gateway.access_token().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().secret(), "token-1");
    }
    assert_eq!(exchange.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_token_triggers_one_refresh() {
    let exchange = Arc::new(CountingExchange::default());
    let gateway = gateway(exchange.clone());

    gateway.access_token().await.unwrap();
    tokio::time::advance(Duration::from_secs(3501)).await;

    let refreshed = gateway.access_token().await.unwrap();
    assert_eq!(refreshed.secret(), "token-2");
    gateway.access_token().await.unwrap();
    assert_eq!(exchange.calls(), 2);
}

#[tokio::test]
async fn test_failed_exchange_yields_none() {
    let exchange = Arc::new(CountingExchange {
        fail: true,
        ..CountingExchange::default()
    });
    let gateway = gateway(exchange.clone());

    assert!(gateway.access_token().await.is_none());
    // failures are not cached
    assert!(gateway.access_token().await.is_none());
    assert_eq!(exchange.calls(), 2);
}
