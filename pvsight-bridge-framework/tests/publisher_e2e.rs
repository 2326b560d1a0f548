//! End-to-end tests for the Zenoh transport publisher.
//!
//! Note: Zenoh requires multi-thread tokio runtime.

use std::time::Duration;

use pvsight_bridge_framework::{
    BridgeError, LinkState, Qos, TransportPublisher, ZenohConfig, ZenohPublisher,
};

fn unique_topic() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}/inverter/data", nanos)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_reaches_subscriber() {
    let topic = unique_topic();
    let mut publisher = ZenohPublisher::new(ZenohConfig::default());
    publisher.connect().await.expect("Failed to connect");
    assert_eq!(publisher.state(), LinkState::Connected);

    let subscriber = publisher
        .session()
        .expect("session should be open")
        .declare_subscriber(&topic)
        .await
        .expect("Failed to create subscriber");

    tokio::time::sleep(Duration::from_millis(100)).await;

    for qos in [Qos::AtLeastOnce, Qos::AtMostOnce] {
        let body = format!(r#"{{"qos":"{:?}"}}"#, qos);
        publisher
            .publish(&topic, body.clone().into_bytes(), qos)
            .await
            .expect("Failed to publish");

        let sample = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
            .await
            .expect("Timeout waiting for message")
            .expect("Failed to receive message");

        assert_eq!(sample.payload().to_bytes().as_ref(), body.as_bytes());
    }

    drop(subscriber);
    publisher.disconnect().await;
    assert_eq!(publisher.state(), LinkState::Disconnected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_connect_is_rejected() {
    let mut publisher = ZenohPublisher::new(ZenohConfig::default());
    publisher.connect().await.expect("Failed to connect");

    let err = publisher.connect().await.unwrap_err();
    assert!(matches!(err, BridgeError::AlreadyConnected));

    publisher.disconnect().await;
    publisher.disconnect().await;
    assert_eq!(publisher.state(), LinkState::Disconnected);
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reliable_publish_fails_after_router_loss() {
    let endpoint = format!("tcp/127.0.0.1:{}", free_port());
    let topic = unique_topic();

    let router = pvsight_common::connect(&ZenohConfig {
        mode: "router".to_string(),
        listen: vec![endpoint.clone()],
        ..Default::default()
    })
    .await
    .expect("Failed to start router");

    let mut publisher = ZenohPublisher::new(ZenohConfig {
        mode: "client".to_string(),
        connect: vec![endpoint],
        ..Default::default()
    });
    publisher.connect().await.expect("Failed to connect");

    publisher
        .publish(&topic, b"{}".to_vec(), Qos::AtLeastOnce)
        .await
        .expect("Publish with a live router should succeed");

    router.close().await.expect("Failed to stop router");

    // The client notices the closed transport asynchronously.
    let mut outcome = Ok(());
    for _ in 0..50 {
        outcome = publisher
            .publish(&topic, b"{}".to_vec(), Qos::AtLeastOnce)
            .await;
        if outcome.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    match outcome {
        Err(BridgeError::Publish { key, .. }) => assert_eq!(key, topic),
        other => panic!("expected a publish failure, got {:?}", other),
    }

    publisher.disconnect().await;
}
