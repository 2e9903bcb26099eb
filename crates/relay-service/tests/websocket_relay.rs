//! End-to-end relay tests over real WebSocket connections.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use relay_service::config::DEFAULT_ACK_MESSAGE;
use relay_service::transport::TransportSettings;
use relay_test_utils::{MockTicketService, TestRelayServer, WsClient, WsEvent};
use std::sync::Arc;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(200);

async fn join(server: &TestRelayServer) -> WsClient {
    let mut client = WsClient::connect(&server.ws_url()).await.unwrap();
    assert_eq!(client.next_text().await, DEFAULT_ACK_MESSAGE);
    client
}

async fn join_admitted(server: &TestRelayServer, ticket: &str) -> WsClient {
    let mut client = join(server).await;
    let before = server.tickets().validate_calls();
    client.send_text(ticket).await;
    // Admission produces no reply; wait until the hub has consumed the ticket.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while server.tickets().validate_calls() == before || server.tickets().is_valid(ticket) {
        assert!(tokio::time::Instant::now() < deadline, "ticket never validated");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    client
}

#[tokio::test]
async fn test_connect_receives_acknowledgement() {
    let server = TestRelayServer::spawn(Arc::new(MockTicketService::new()))
        .await
        .unwrap();

    let _client = join(&server).await;

    server.wait_for_connections(1).await;
}

#[tokio::test]
async fn test_admitted_message_reaches_peers_not_sender() {
    let tickets = Arc::new(MockTicketService::with_tickets(&["T1"]));
    let server = TestRelayServer::spawn(tickets).await.unwrap();

    let mut x = join_admitted(&server, "T1").await;
    let mut y = join(&server).await;
    let mut z = join(&server).await;
    server.wait_for_connections(3).await;

    x.send_text("p(3,4)").await;

    assert_eq!(y.next_text().await, "p(3,4)");
    assert_eq!(z.next_text().await, "p(3,4)");
    x.expect_silence(QUIET).await;
}

#[tokio::test]
async fn test_invalid_ticket_closes_socket() {
    let tickets = Arc::new(MockTicketService::with_tickets(&["T1"]));
    let server = TestRelayServer::spawn(tickets).await.unwrap();

    let mut observer = join(&server).await;
    let mut y = join(&server).await;
    server.wait_for_connections(2).await;

    y.send_text("bogus").await;

    assert_eq!(y.expect_closed().await, Some(1008));
    server.wait_for_connections(1).await;
    observer.expect_silence(QUIET).await;
}

#[tokio::test]
async fn test_backend_outage_closes_socket() {
    let server = TestRelayServer::spawn(Arc::new(MockTicketService::failing()))
        .await
        .unwrap();

    let mut client = join(&server).await;
    client.send_text("1").await;

    assert_eq!(client.expect_closed().await, Some(1008));
    server.wait_for_connections(0).await;
}

#[tokio::test]
async fn test_two_publishers_exchange_messages() {
    let tickets = Arc::new(MockTicketService::with_tickets(&["TA", "TB"]));
    let server = TestRelayServer::spawn(tickets).await.unwrap();

    let mut a = join_admitted(&server, "TA").await;
    let mut b = join_admitted(&server, "TB").await;

    a.send_text("m1").await;
    assert_eq!(b.next_text().await, "m1");

    b.send_text("m2").await;
    assert_eq!(a.next_text().await, "m2");

    a.expect_silence(QUIET).await;
    b.expect_silence(QUIET).await;
}

#[tokio::test]
async fn test_issued_ticket_admits_over_websocket() {
    let server = TestRelayServer::spawn(Arc::new(MockTicketService::new()))
        .await
        .unwrap();

    let body: serde_json::Value = reqwest::get(format!("{}/getticket", server.url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ticket = body["ticket"].as_u64().unwrap().to_string();

    let mut sender = join_admitted(&server, &ticket).await;
    let mut peer = join(&server).await;
    server.wait_for_connections(2).await;

    sender.send_text("hello").await;
    assert_eq!(peer.next_text().await, "hello");
}

#[tokio::test]
async fn test_utf8_binary_frame_is_relayed_as_text() {
    let tickets = Arc::new(MockTicketService::with_tickets(&["T1"]));
    let server = TestRelayServer::spawn(tickets).await.unwrap();

    let mut sender = join_admitted(&server, "T1").await;
    let mut peer = join(&server).await;
    server.wait_for_connections(2).await;

    sender.send_binary(vec![0xff, 0xfe]).await;
    sender.send_binary(b"p(1,2)".to_vec()).await;

    assert_eq!(peer.next_text().await, "p(1,2)");
}

#[tokio::test]
async fn test_client_close_removes_connection() {
    let tickets = Arc::new(MockTicketService::with_tickets(&["T1"]));
    let server = TestRelayServer::spawn(tickets).await.unwrap();

    let mut sender = join_admitted(&server, "T1").await;
    let leaving = join(&server).await;
    server.wait_for_connections(2).await;

    leaving.close().await;
    server.wait_for_connections(1).await;

    // Fan-out with nobody left to receive still works.
    sender.send_text("anyone?").await;
    sender.expect_silence(QUIET).await;
    assert_eq!(server.hub().connection_count(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let server = TestRelayServer::spawn(Arc::new(MockTicketService::new()))
        .await
        .unwrap();

    let mut client = join(&server).await;
    server.wait_for_connections(1).await;

    server.cancel_connections();

    assert_eq!(client.expect_closed().await, Some(1001));
    server.wait_for_connections(0).await;
}

#[tokio::test]
async fn test_small_queue_still_delivers_in_order() {
    let tickets = Arc::new(MockTicketService::with_tickets(&["T1"]));
    let server = TestRelayServer::spawn_with_settings(
        tickets,
        TransportSettings {
            send_queue_capacity: 4,
            send_timeout: Duration::from_secs(2),
        },
    )
    .await
    .unwrap();

    let mut sender = join_admitted(&server, "T1").await;
    let mut peer = join(&server).await;
    server.wait_for_connections(2).await;

    for i in 0..3 {
        sender.send_text(&format!("m{i}")).await;
        assert_eq!(peer.next_text().await, format!("m{i}"));
    }

    match peer.next_event_within(QUIET).await {
        None => {}
        Some(WsEvent::Text(text)) => panic!("unexpected message {text:?}"),
        Some(WsEvent::Closed(code)) => panic!("unexpected close {code:?}"),
    }
}
