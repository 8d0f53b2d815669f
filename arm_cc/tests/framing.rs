/// The framing layer has to tell a half-received message apart from a
/// broken one: the first keeps accumulating under a timeout, the second
/// surfaces immediately so the session can answer with an error reply.
use std::time::Duration;

use arm_cc::framing::{Frame, MessageReader};
use arm_cc::CcError;
use tokio::io::{duplex, AsyncWriteExt};
use tokio::time::Instant;

const TEST_TIMEOUT: Duration = Duration::from_millis(200);

#[tokio::test]
async fn whole_message_in_one_chunk() {
    let (mut client, server) = duplex(1024);
    let mut reader = MessageReader::with_timeout(server, TEST_TIMEOUT);

    let raw = br#"{"CD":259,"PR":1,"DT":0,"DA":"{}"}"#;
    client.write_all(raw).await.unwrap();

    match reader.read_message().await.unwrap().unwrap() {
        Frame::Complete(bytes) => assert_eq!(bytes, raw),
        other => panic!("expected a complete frame, got {:?}", other),
    }
}

#[tokio::test]
async fn split_message_is_reassembled() {
    let (mut client, server) = duplex(1024);
    let mut reader = MessageReader::with_timeout(server, TEST_TIMEOUT);

    let writer = tokio::spawn(async move {
        client.write_all(br#"{"CD":259,"PR":1,"#).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.write_all(br#""DT":0,"DA":"{}"}"#).await.unwrap();
        client
    });

    match reader.read_message().await.unwrap().unwrap() {
        Frame::Complete(bytes) => {
            assert_eq!(bytes, br#"{"CD":259,"PR":1,"DT":0,"DA":"{}"}"#);
        }
        other => panic!("expected a complete frame, got {:?}", other),
    }
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn invalid_input_surfaces_without_waiting() {
    let (mut client, server) = duplex(1024);
    let mut reader = MessageReader::with_timeout(server, Duration::from_secs(30));

    client.write_all(b"}{ not json").await.unwrap();

    let started = Instant::now();
    match reader.read_message().await.unwrap().unwrap() {
        Frame::Malformed(bytes) => assert_eq!(bytes, b"}{ not json"),
        other => panic!("expected a malformed frame, got {:?}", other),
    }
    // must not have sat out the 30 second continuation timeout
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn stalled_message_times_out_as_malformed() {
    let (mut client, server) = duplex(1024);
    let mut reader = MessageReader::with_timeout(server, TEST_TIMEOUT);

    client.write_all(br#"{"CD":259"#).await.unwrap();

    let started = Instant::now();
    match reader.read_message().await.unwrap().unwrap() {
        Frame::Malformed(bytes) => assert_eq!(bytes, br#"{"CD":259"#),
        other => panic!("expected a malformed frame, got {:?}", other),
    }
    assert!(started.elapsed() >= TEST_TIMEOUT);
}

#[tokio::test]
async fn close_before_any_byte_is_a_clean_end() {
    let (client, server) = duplex(1024);
    let mut reader = MessageReader::with_timeout(server, TEST_TIMEOUT);
    drop(client);
    assert!(reader.read_message().await.unwrap().is_none());
}

#[tokio::test]
async fn close_mid_message_is_a_connection_error() {
    let (mut client, server) = duplex(1024);
    let mut reader = MessageReader::with_timeout(server, TEST_TIMEOUT);

    client.write_all(br#"{"CD":259"#).await.unwrap();
    drop(client);

    match reader.read_message().await {
        Err(CcError::Disconnected) => {}
        other => panic!("expected a disconnect, got {:?}", other),
    }
}
