use std::time::Duration;

use hedger_core::{BrokerGateway, Direction, GatewayError, MarketOrderRequest};
use hedger_mt5::{BridgeConfig, Mt5BridgeClient};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Mt5BridgeClient {
    Mt5BridgeClient::new(BridgeConfig {
        base_url: server.uri(),
        request_timeout: Duration::from_secs(2),
    })
    .unwrap()
}

#[tokio::test]
async fn positions_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/positions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "ticket": 7001,
                "symbol": "XAUUSD",
                "direction": "buy",
                "volume": "0.10",
                "open_price": "2650.50",
                "profit": "-21.40",
                "comment": "original"
            },
            {
                "ticket": 7002,
                "symbol": "XAUUSD",
                "direction": "sell",
                "volume": "0.10",
                "open_price": "2641.00",
                "profit": "3.10",
                "stop_loss": null,
                "comment": "hedge:7001"
            }
        ])))
        .mount(&server)
        .await;

    let positions = client_for(&server).list_open_positions().await.unwrap();

    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].ticket, 7001);
    assert_eq!(positions[0].profit, dec!(-21.40));
    assert_eq!(positions[1].direction, Direction::Sell);
    assert_eq!(positions[1].comment, "hedge:7001");
}

#[tokio::test]
async fn unknown_symbol_tick_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/symbols/NOPE/tick"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tick = client_for(&server).symbol_tick("NOPE").await.unwrap();
    assert!(tick.is_none());
}

#[tokio::test]
async fn symbol_is_escaped_as_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/symbols/EUR%2FUSD%23/tick"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bid": "1.1000",
            "ask": "1.1002"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tick = client_for(&server).symbol_tick("EUR/USD#").await.unwrap().unwrap();
    assert_eq!(tick.ask, dec!(1.1002));
}

#[tokio::test]
async fn base_url_path_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bridge/account"))
        .respond_with(ResponseTemplate::new(409).set_body_string("terminal not initialized"))
        .mount(&server)
        .await;

    let client = Mt5BridgeClient::new(BridgeConfig {
        base_url: format!("{}/bridge/", server.uri()),
        request_timeout: Duration::from_secs(2),
    })
    .unwrap();
    let err = client.account_summary().await.unwrap_err();
    assert!(matches!(err, GatewayError::Terminal(_)));
}

#[test]
fn invalid_base_url_is_refused() {
    let result = Mt5BridgeClient::new(BridgeConfig {
        base_url: "127.0.0.1:8228".to_string(),
        request_timeout: Duration::from_secs(2),
    });
    assert!(result.is_err());
}

#[tokio::test]
async fn conflict_means_terminal_detached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(ResponseTemplate::new(409).set_body_string("terminal not initialized"))
        .mount(&server)
        .await;

    let err = client_for(&server).account_summary().await.unwrap_err();
    assert_eq!(err, GatewayError::Terminal("terminal not initialized".to_string()));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/positions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).list_open_positions().await.unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_body_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server).account_summary().await.unwrap_err();
    assert!(matches!(err, GatewayError::Protocol(_)));
}

#[tokio::test]
async fn rejected_order_returns_retcode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_partial_json(json!({ "symbol": "XAUUSD", "tag": "hedge:7001" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retcode": 10019,
            "comment": "No money"
        })))
        .mount(&server)
        .await;

    let request = MarketOrderRequest::open(
        "XAUUSD",
        Direction::Sell,
        dec!(0.1),
        dec!(2641.00),
        20,
        "hedge:7001",
    );
    let result = client_for(&server).submit_market_order(&request).await.unwrap();

    assert!(!result.is_done());
    assert_eq!(result.retcode, 10019);
    assert!(result.position_id.is_none());
}

#[tokio::test]
async fn margin_estimate_is_posted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/margin"))
        .and(body_partial_json(json!({ "symbol": "EURUSD", "direction": "buy" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "margin": "110.02" })))
        .mount(&server)
        .await;

    let margin = client_for(&server)
        .estimate_margin(Direction::Buy, "EURUSD", dec!(1), dec!(1.1002))
        .await
        .unwrap();
    assert_eq!(margin, dec!(110.02));
}
