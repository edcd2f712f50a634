//! End-to-end runs over real sockets against a local echo server.

mod harness;

use std::time::Duration;

use harness::EchoServer;
use wsbench::{
    BenchConfig, Connection, CountPolicy, Driver, Error, FixedWorkload, SizePolicy, Transport,
    WsTransport,
};

#[tokio::test]
async fn test_echo_round_trip() {
    let server = EchoServer::spawn().await;
    let mut conn = WsTransport::new()
        .dial(&server.url(), &server.origin())
        .await
        .unwrap();

    let message = vec![b'A'; 37];
    assert_eq!(conn.write(&message).await.unwrap(), 37);
    let mut buf = [0u8; 128];
    let n = conn.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], message.as_slice());

    conn.close().await.unwrap();
    server.shutdown();
}

#[tokio::test]
async fn test_binary_frames_echo() {
    let server = EchoServer::spawn().await;
    let mut conn = WsTransport::binary()
        .dial(&server.url(), &server.origin())
        .await
        .unwrap();

    conn.write(&[0, 1, 2, 255]).await.unwrap();
    let mut buf = [0u8; 16];
    let n = conn.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], &[0, 1, 2, 255]);

    conn.close().await.unwrap();
    server.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_driver_over_sockets() {
    let server = EchoServer::spawn().await;
    let config = BenchConfig::new()
        .with_url(server.url())
        .with_origin(server.origin())
        .with_concurrency(4)
        .with_target_total(500);

    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        Driver::new(WsTransport::new(), config)
            .with_workload(FixedWorkload::new(50, 24))
            .run(),
    )
    .await
    .expect("run did not finish")
    .unwrap();

    assert_eq!(summary.target_total, 500);
    assert!(summary.completed > 500);
    assert_eq!(summary.completed % 50, 0);
    assert!(summary.megabytes_per_sec.is_some());
    assert!(server.accepted() >= 11);
    server.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_random_workload_over_sockets() {
    let server = EchoServer::spawn().await;
    let config = BenchConfig::new()
        .with_url(server.url())
        .with_origin(server.origin())
        .with_concurrency(2)
        .with_target_total(100)
        .with_count(CountPolicy::Uniform { min: 10, max: 30 })
        .with_size(SizePolicy::Uniform { min: 20, max: 40 });

    let summary = Driver::new(WsTransport::new(), config).run().await.unwrap();
    assert!(summary.completed > 100);
    assert!(summary.megabytes_per_sec.is_none());
    server.shutdown();
}

#[tokio::test]
async fn test_rejected_upgrade_is_connection_error() {
    let server = EchoServer::spawn_rejecting().await;

    let err = WsTransport::new()
        .dial(&server.url(), &server.origin())
        .await
        .unwrap_err();
    assert!(err.is_connection(), "got {:?}", err);

    let config = BenchConfig::new()
        .with_url(server.url())
        .with_origin(server.origin())
        .with_concurrency(2)
        .with_target_total(10);
    let err = Driver::new(WsTransport::new(), config)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "got {:?}", err);
    server.shutdown();
}
