//! MJPEG multipart stream for `<img src="/stream">`.
//!
//! Each viewer gets its own lazy loop that re-acquires the camera under the
//! hardware lock for every frame. There is no broadcaster: with one robot and
//! a handful of viewers, per-viewer reads keep the camera state machine the
//! single source of truth. The loop ends only when the consumer drops it.

use std::convert::Infallible;

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::Stream;
use tokio::time::Instant;
use tracing::debug;

use crate::jpeg;
use crate::pipeline::CameraPipeline;

/// Multipart boundary token.
pub const BOUNDARY: &str = "frame";

/// Body sent in place of a frame while the camera cannot be read.
pub const PLACEHOLDER_TEXT: &str = "Camera not available. Check /dev/video* or the camera device setting.";

/// `Content-Type` header value for the stream response.
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={BOUNDARY}")
}

/// One `image/jpeg` part including its trailing CRLF.
pub fn jpeg_part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut buf = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    buf.put_slice(head.as_bytes());
    buf.put_slice(jpeg);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// The `text/plain` part sent while no frame is available.
pub fn placeholder_part() -> Bytes {
    Bytes::from(format!(
        "--{BOUNDARY}\r\nContent-Type: text/plain\r\n\r\n{PLACEHOLDER_TEXT}\r\n"
    ))
}

/// Endless stream of multipart parts.
pub fn mjpeg_stream(pipeline: CameraPipeline) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        let settings = pipeline.settings().clone();
        let interval = settings.frame_interval();
        let mut last_sent: Option<Instant> = None;

        loop {
            if let (Some(interval), Some(at)) = (interval, last_sent) {
                tokio::time::sleep_until(at + interval).await;
            }

            let frame = match pipeline.grab_frame().await {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(error = %e, "stream frame unavailable");
                    yield Ok(placeholder_part());
                    tokio::time::sleep(settings.unavailable_backoff).await;
                    continue;
                }
            };

            let quality = settings.jpeg_quality;
            let encoded = tokio::task::spawn_blocking(move || jpeg::encode_frame(frame, quality)).await;
            match encoded {
                Ok(Ok(jpeg)) => {
                    last_sent = Some(Instant::now());
                    yield Ok(jpeg_part(&jpeg));
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "stream frame encode failed");
                    tokio::time::sleep(settings.encode_retry).await;
                }
                Err(e) => {
                    debug!(error = %e, "stream encoder task failed");
                    tokio::time::sleep(settings.encode_retry).await;
                }
            }
        }
    }
}
