use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use stream_buffers::{DEFAULT_FREQUENCY, Downstream, Error, ReadSource, ReadState};
use tokio::time::{Instant, timeout};

const UNICODE: &str = "\u{bd} + \u{bc} = \u{be}";

fn binary_data() -> Vec<u8> {
    (0..64).collect()
}

async fn collect(source: &mut ReadSource) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = source.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_end_when_stopped() {
    let mut source = ReadSource::new();
    source.stop().unwrap();
    assert!(source.next().await.is_none());
    // end-of-data is delivered once, then the stream stays terminated
    assert!(source.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_end_after_data() {
    let mut source = ReadSource::new();
    source.put(UNICODE).unwrap();
    source.stop().unwrap();
    assert_eq!(collect(&mut source).await, UNICODE.as_bytes());
}

#[tokio::test(start_paused = true)]
async fn test_read_when_empty_waits_for_data() {
    let mut source = ReadSource::new();

    // nothing buffered yet: no chunk and no premature end
    assert!(
        timeout(DEFAULT_FREQUENCY * 5, source.next())
            .await
            .is_err()
    );

    let handle = source.handle();
    let producer = tokio::spawn(async move {
        tokio::time::sleep(DEFAULT_FREQUENCY + Duration::from_millis(1)).await;
        handle.put(UNICODE).unwrap();
        handle.stop().unwrap();
    });

    assert_eq!(collect(&mut source).await, UNICODE.as_bytes());
    producer.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_binary_data_in_one_chunk() {
    let mut source = ReadSource::new();
    source.put(binary_data()).unwrap();
    let chunk = source.next().await.unwrap().unwrap();
    assert_eq!(chunk, binary_data());
    assert_eq!(source.size(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_chunk_size() {
    let mut source = ReadSource::from_value(json!({ "chunkSize": 2 })).unwrap();
    source.put(binary_data()).unwrap();

    let first = source.next().await.unwrap().unwrap();
    assert_eq!(first, binary_data()[..2]);
    assert_eq!(source.size(), 62);

    source.stop().unwrap();
    let mut chunks = vec![first];
    while let Some(chunk) = source.next().await {
        chunks.push(chunk.unwrap());
    }
    assert_eq!(chunks.len(), 32);
    assert!(chunks.iter().all(|chunk| chunk.len() == 2));
    assert_eq!(chunks.concat(), binary_data());
}

#[tokio::test(start_paused = true)]
async fn test_custom_frequency() {
    let mut source = ReadSource::from_value(json!({ "frequency": 300 })).unwrap();
    let start = Instant::now();
    source.put(binary_data()).unwrap();
    source.next().await.unwrap().unwrap();
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_pace_emission() {
    let mut source = ReadSource::builder()
        .chunk_size(1)
        .frequency(Duration::from_millis(100))
        .build()
        .unwrap();
    source.put("abc").unwrap();
    source.stop().unwrap();

    let start = Instant::now();
    assert_eq!(collect(&mut source).await, b"abc");
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_error_surfaces_on_next_read() {
    let mut source = ReadSource::new();
    source.put("never emitted").unwrap();
    source.error().unwrap();

    assert!(matches!(source.next().await, Some(Err(Error::Upstream))));
    assert!(source.next().await.is_none());
    assert!(source.put("more").is_err());
}

#[tokio::test(start_paused = true)]
async fn test_pause_suspends_emission() {
    let mut source = ReadSource::new();
    source.pause();
    source.put("held").unwrap();

    assert!(
        timeout(DEFAULT_FREQUENCY * 10, source.next())
            .await
            .is_err()
    );
    assert_eq!(source.size(), 4);

    source.resume();
    assert_eq!(source.next().await.unwrap().unwrap(), "held");
}

#[tokio::test(start_paused = true)]
async fn test_stopped_while_paused_drains_after_resume() {
    let mut source = ReadSource::new();
    source.pause();
    source.put("held").unwrap();
    source.stop().unwrap();
    assert_eq!(source.state(), ReadState::Stopped);

    // neither the bytes nor end-of-data are delivered while paused
    assert!(
        timeout(DEFAULT_FREQUENCY * 10, source.next())
            .await
            .is_err()
    );
    assert_eq!(source.size(), 4);

    source.resume();
    assert_eq!(collect(&mut source).await, b"held");
    assert!(source.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fifo_across_puts() {
    let mut source = ReadSource::builder().chunk_size(3).build().unwrap();
    let handle = source.handle();
    for part in ["ab", "cde", "f", "ghij"] {
        handle.put(part).unwrap();
    }
    handle.stop().unwrap();
    assert_eq!(collect(&mut source).await, b"abcdefghij");
}

#[derive(Default)]
struct Recorder {
    chunks: Vec<Bytes>,
    ended: usize,
    errors: Vec<String>,
}

impl Downstream for Recorder {
    fn push(&mut self, chunk: Bytes) -> bool {
        self.chunks.push(chunk);
        // ask for a break after the first chunk
        self.chunks.len() != 1
    }

    fn end(&mut self) {
        self.ended += 1;
    }

    fn error(&mut self, err: &Error) {
        self.errors.push(err.to_string());
    }
}

#[tokio::test(start_paused = true)]
async fn test_pipe_backpressure() {
    let mut source = ReadSource::builder().chunk_size(2).build().unwrap();
    let handle = source.handle();
    handle.put("abcdef").unwrap();
    handle.stop().unwrap();

    let mut downstream = Recorder::default();
    let resumer = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        // still holding the rest while the downstream is not ready
        assert_eq!(handle.size(), 4);
        handle.resume();
    };
    let (piped, ()) = tokio::join!(source.pipe_to(&mut downstream), resumer);

    piped.unwrap();
    assert_eq!(downstream.chunks, ["ab", "cd", "ef"]);
    assert_eq!(downstream.ended, 1);
    assert!(downstream.errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pipe_error() {
    let mut source = ReadSource::new();
    let handle = source.handle();
    let mut downstream = Recorder::default();

    let producer = async {
        tokio::time::sleep(DEFAULT_FREQUENCY * 3).await;
        handle.error().unwrap();
    };
    let (piped, ()) = tokio::join!(source.pipe_to(&mut downstream), producer);

    assert!(matches!(piped, Err(Error::Upstream)));
    assert!(downstream.chunks.is_empty());
    assert_eq!(downstream.ended, 0);
    assert_eq!(downstream.errors, [Error::Upstream.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_pipe_into_vec() {
    let mut source = ReadSource::builder().chunk_size(4).build().unwrap();
    source.put(UNICODE).unwrap();
    source.stop().unwrap();

    let mut chunks: Vec<Bytes> = Vec::new();
    source.pipe_to(&mut chunks).await.unwrap();
    assert_eq!(chunks.concat(), UNICODE.as_bytes());
    assert_eq!(source.state(), ReadState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_pipe_into_vec_tells_error_from_end() {
    let mut errored = ReadSource::new();
    errored.put("dropped").unwrap();
    errored.error().unwrap();
    let mut chunks: Vec<Bytes> = Vec::new();
    let result = errored.pipe_to(&mut chunks).await;
    assert!(matches!(result, Err(Error::Upstream)));
    assert!(chunks.is_empty());

    let mut stopped = ReadSource::new();
    stopped.stop().unwrap();
    let mut chunks: Vec<Bytes> = Vec::new();
    assert!(stopped.pipe_to(&mut chunks).await.is_ok());
    assert!(chunks.is_empty());
}

#[test]
fn test_constructor_rejects_non_integers() {
    for key in ["chunkSize", "frequency", "initialSize", "incrementAmount"] {
        for value in [json!(42.5), json!("some"), json!({})] {
            let mut options = serde_json::Map::new();
            options.insert(key.to_owned(), value);
            let result = ReadSource::from_value(serde_json::Value::Object(options));
            assert!(matches!(result, Err(Error::InvalidOption(_))));
        }
    }
}
