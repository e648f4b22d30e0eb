use std::sync::Once;
use std::time::Duration;

use broadcast_bytes::{BroadcastBuffer, BufferConfig, ByteSequence, ByteStreamExt, PipeBytes};

static INIT_LOGGING: Once = Once::new();

fn init_tracing() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "broadcast_bytes=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

#[tokio::test]
async fn early_and_late_subscribers_see_same_lines() {
    init_tracing();
    let buffer = BroadcastBuffer::new();

    let early_lines = buffer.lines();
    let early_data = buffer.subscribe();

    buffer.append("hello\n").unwrap();
    buffer.append("world").unwrap();

    let late_lines = buffer.lines();
    let late_data = buffer.subscribe();

    buffer.close();

    assert_eq!(early_lines.collect_all().await, vec!["hello", "world"]);
    assert_eq!(late_lines.collect_all().await, vec!["hello", "world"]);
    assert_eq!(&early_data.collect_bytes().await[..], b"hello\nworld");
    assert_eq!(&late_data.collect_bytes().await[..], b"hello\nworld");
}

#[tokio::test]
async fn subscriber_after_close_does_not_wait() {
    init_tracing();
    let buffer = BroadcastBuffer::new();
    buffer.append("all of it").unwrap();
    buffer.close();

    let text = tokio::time::timeout(Duration::from_secs(1), buffer.string())
        .await
        .expect("closed buffer should not block")
        .unwrap();
    assert_eq!(text, "all of it");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_each_get_every_byte_once() {
    init_tracing();
    let buffer = BroadcastBuffer::with_config(BufferConfig::named("stress"));
    let seq = buffer.bytes();

    let mut readers = Vec::new();
    for _ in 0..8 {
        let seq = seq.clone();
        readers.push(tokio::spawn(async move {
            let mut sub = seq.subscribe();
            let mut seen = Vec::new();
            while let Some(byte) = sub.next().await {
                seen.push(byte);
            }
            seen
        }));
    }

    for i in 0..5000u32 {
        buffer.append(vec![(i % 256) as u8]).unwrap();
        if i % 500 == 0 {
            // Join mid-stream as well
            let seq = seq.clone();
            readers.push(tokio::spawn(async move { seq.data().await.to_vec() }));
        }
    }
    buffer.close();

    let expected: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
    for reader in readers {
        assert_eq!(reader.await.unwrap(), expected);
    }
    assert_eq!(buffer.subscriber_count(), 0);
}

#[tokio::test]
async fn cancelled_readers_do_not_accumulate() {
    init_tracing();
    let buffer = BroadcastBuffer::new();
    buffer.append("churn").unwrap();

    for _ in 0..100 {
        let mut sub = buffer.subscribe();
        assert_eq!(sub.next().await, Some(b'c'));
    }
    assert_eq!(buffer.subscriber_count(), 0);

    // Timing out a read cancels its subscription
    let sub = buffer.subscribe();
    let result = tokio::time::timeout(Duration::from_millis(20), sub.collect_bytes()).await;
    assert!(result.is_err());
    assert_eq!(buffer.subscriber_count(), 0);
}

#[tokio::test]
async fn empty_sequence_ends_immediately() {
    init_tracing();
    let seq = ByteSequence::empty();
    assert!(seq.data().await.is_empty());
    assert_eq!(seq.string().await.unwrap(), "");
}

#[cfg(unix)]
#[tokio::test]
async fn child_process_output_shared_between_readers() {
    use std::process::Stdio;

    init_tracing();
    let mut child = tokio::process::Command::new("printf")
        .arg("hello\\nworld")
        .stdout(Stdio::piped())
        .spawn()
        .expect("printf should be available");
    let stdout = child.stdout.take().unwrap();

    let buffer = BroadcastBuffer::with_config(BufferConfig::named("stdout"));
    let lines = buffer.lines();
    let copied = buffer.spawn_pump(stdout).await.unwrap().unwrap();
    child.wait().await.unwrap();

    assert_eq!(copied, 11);
    assert_eq!(lines.collect_all().await, vec!["hello", "world"]);
    assert_eq!(buffer.string().await.unwrap(), "hello\nworld");
}

#[cfg(unix)]
#[tokio::test]
async fn child_process_pipe_as_byte_stream() {
    use std::process::Stdio;

    init_tracing();
    let mut child = tokio::process::Command::new("printf")
        .arg("hello\\nworld")
        .stdout(Stdio::piped())
        .spawn()
        .expect("printf should be available");
    let stdout = child.stdout.take().unwrap();

    let lines = PipeBytes::forwarding_to(stdout, Vec::new()).lines();
    assert_eq!(lines.collect_all().await, vec!["hello", "world"]);
    child.wait().await.unwrap();
}
