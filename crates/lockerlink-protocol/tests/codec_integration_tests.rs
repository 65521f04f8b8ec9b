//! Integration tests for LockerCodec over Tokio streams.
//!
//! One side of a duplex pipe plays the host through `Framed`, the other side
//! plays a locker controller writing raw bytes.

mod common;

use futures::{SinkExt, StreamExt};
use lockerlink_protocol::{CommandKind, CommandRequestBuilder, LockerCodec};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

fn host_and_controller() -> (Framed<DuplexStream, LockerCodec>, DuplexStream) {
    let (host, controller) = tokio::io::duplex(1024);
    (Framed::new(host, LockerCodec::new()), controller)
}

#[tokio::test]
async fn test_open_door_reaches_controller() {
    let (mut host, mut controller) = host_and_controller();

    let command = CommandRequestBuilder::new()
        .cell_number("133_1")
        .unwrap()
        .build()
        .unwrap();
    host.send(command).await.unwrap();

    let mut buf = vec![0u8; 64];
    let n = controller.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"POST:1,133,8,4,FFFF=6CA4\r\n");
}

#[tokio::test]
async fn test_status_report_reaches_host() {
    let (mut host, mut controller) = host_and_controller();

    controller
        .write_all(common::status_report(4, 0x0005).as_bytes())
        .await
        .unwrap();

    let report = host.next().await.unwrap().unwrap();
    assert_eq!(report.kind, CommandKind::Status);
    assert_eq!(report.locker_part, Some(4));
    assert_eq!(report.cells, Some(vec![1, 3]));
}

#[tokio::test]
async fn test_report_split_across_writes() {
    let (mut host, mut controller) = host_and_controller();
    let frame = common::inbound_frame(12, 1, 3, "12345678");

    let writer = tokio::spawn(async move {
        for byte in frame.as_bytes() {
            controller.write_all(&[*byte]).await.unwrap();
            tokio::task::yield_now().await;
        }
        controller
    });

    let report = tokio::time::timeout(Duration::from_secs(5), host.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(report.kind, CommandKind::OnCardRead);
    assert_eq!(report.payload, "12345678");

    writer.await.unwrap();
}

#[tokio::test]
async fn test_noise_between_reports_is_skipped() {
    let (mut host, mut controller) = host_and_controller();

    let mut stream = Vec::new();
    stream.extend_from_slice(b"boot v1.2\r\n");
    stream.extend_from_slice(common::inbound_frame(1, 1, 99, "0001").as_bytes());
    stream.extend_from_slice(common::status_report(1, 0x0001).as_bytes());
    stream.extend_from_slice(common::inbound_frame(1, 1, 2, "ABC123").as_bytes());
    controller.write_all(&stream).await.unwrap();

    let first = host.next().await.unwrap().unwrap();
    assert_eq!(first.kind, CommandKind::Status);

    let second = host.next().await.unwrap().unwrap();
    assert_eq!(second.kind, CommandKind::OnBarcodeRead);
    assert_eq!(second.payload, "ABC123");

    assert_eq!(host.codec().dropped_frames(), 1);
}

#[tokio::test]
async fn test_stream_ends_when_controller_closes() {
    let (mut host, controller) = host_and_controller();
    drop(controller);

    assert!(host.next().await.is_none());
}
