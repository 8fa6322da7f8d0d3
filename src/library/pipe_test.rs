use super::pipe::PipeStream;
use crate::error::AdbError;
use std::sync::Arc;
use std::time::Duration;

fn ascending() -> Vec<u8> {
    (0..255).map(|i| i as u8).collect()
}

fn descending() -> Vec<u8> {
    (0..255).map(|i| (255 - i) as u8).collect()
}

fn pipe_with_two_chunks() -> (PipeStream, Vec<u8>) {
    let pipe = PipeStream::new();
    let first = ascending();
    let second = descending();
    pipe.write(first.clone());
    pipe.write(second.clone());
    let mut expected = first;
    expected.extend_from_slice(&second);
    (pipe, expected)
}

async fn read_in_steps(pipe: &PipeStream, sizes: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    for &size in sizes {
        let mut buf = vec![0u8; size];
        pipe.fill(&mut buf).await.expect("fill should succeed");
        out.extend_from_slice(&buf);
    }
    out
}

#[tokio::test]
async fn test_read_matches_write_sizes() {
    let (pipe, expected) = pipe_with_two_chunks();

    let mut first = vec![0u8; 255];
    assert_eq!(pipe.read(&mut first).await, 255);
    assert_eq!(&first[..], &expected[..255]);

    let mut second = vec![0u8; 255];
    assert_eq!(pipe.read(&mut second).await, 255);
    assert_eq!(&second[..], &expected[255..]);
}

#[tokio::test]
async fn test_single_read_spans_both_chunks() {
    let (pipe, expected) = pipe_with_two_chunks();

    let mut buf = vec![0u8; 510];
    assert_eq!(pipe.read(&mut buf).await, 510);
    assert_eq!(buf, expected);
}

#[tokio::test]
async fn test_boundary_inside_second_chunk() {
    let (pipe, expected) = pipe_with_two_chunks();
    assert_eq!(read_in_steps(&pipe, &[265, 245]).await, expected);
}

#[tokio::test]
async fn test_boundary_inside_first_chunk() {
    let (pipe, expected) = pipe_with_two_chunks();
    assert_eq!(read_in_steps(&pipe, &[245, 265]).await, expected);
}

#[tokio::test]
async fn test_read_returns_short_when_less_is_queued() {
    let pipe = PipeStream::new();
    pipe.write(vec![1u8, 2, 3]);

    let mut buf = [0u8; 16];
    assert_eq!(pipe.read(&mut buf).await, 3);
    assert_eq!(&buf[..3], &[1, 2, 3]);
}

#[tokio::test]
async fn test_partial_chunk_cursor_survives_between_calls() {
    let pipe = PipeStream::new();
    pipe.write(b"hello world".to_vec());

    let mut head = [0u8; 5];
    assert_eq!(pipe.read(&mut head).await, 5);
    assert_eq!(&head, b"hello");
    assert_eq!(pipe.pending_chunks(), 0);

    let mut tail = [0u8; 6];
    pipe.fill(&mut tail).await.unwrap();
    assert_eq!(&tail, b" world");
}

#[tokio::test]
async fn test_fill_waits_for_later_chunks() {
    let pipe = Arc::new(PipeStream::new());

    let writer = {
        let pipe = pipe.clone();
        tokio::spawn(async move {
            for chunk in [b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()] {
                tokio::time::sleep(Duration::from_millis(5)).await;
                pipe.write(chunk);
            }
        })
    };

    let mut buf = [0u8; 6];
    tokio::time::timeout(Duration::from_secs(5), pipe.fill(&mut buf))
        .await
        .expect("fill should complete")
        .unwrap();
    assert_eq!(&buf, b"abcdef");
    writer.await.unwrap();
}

#[tokio::test]
async fn test_fill_fails_when_closed_short() {
    let pipe = PipeStream::new();
    pipe.write(vec![9u8; 4]);
    pipe.close();

    let mut buf = [0u8; 8];
    let err = pipe.fill(&mut buf).await.unwrap_err();
    assert!(matches!(err, AdbError::StreamClosed));
}

#[tokio::test]
async fn test_read_drains_after_close_then_returns_zero() {
    let pipe = PipeStream::new();
    pipe.write(vec![7u8; 4]);
    pipe.close();
    assert!(!pipe.write(vec![8u8; 4]));

    let mut buf = [0u8; 8];
    assert_eq!(pipe.read(&mut buf).await, 4);
    assert_eq!(pipe.read(&mut buf).await, 0);
}

#[tokio::test]
async fn test_close_wakes_blocked_reader() {
    let pipe = Arc::new(PipeStream::new());

    let reader = {
        let pipe = pipe.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 4];
            pipe.read(&mut buf).await
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    pipe.close();

    let n = tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("reader should wake")
        .unwrap();
    assert_eq!(n, 0);
}
