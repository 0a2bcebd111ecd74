// SPDX-License-Identifier: MIT OR Apache-2.0
//! Streaming upload size monitor (§4.6).
//!
//! A pass-through byte stream that counts every chunk it forwards and
//! destroys the source the moment the running total crosses a cap,
//! surfacing a `payloadTooLarge` error instead of any further bytes.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use bytes::Bytes;
use futures_core::Stream;
use hub_error::HubError;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Compute the cap a streamed upload must not exceed: the client-reported
/// `Content-Length` when it is a positive, finite value at or below the
/// configured maximum, else the configured maximum itself.
pub fn compute_cap(content_length: Option<u64>, configured_max: u64) -> u64 {
    match content_length {
        Some(len) if len > 0 && len <= configured_max => len,
        _ => configured_max,
    }
}

pin_project! {
    /// Wraps a `Stream<Item = Result<Bytes, HubError>>`, counting bytes as
    /// they pass through and aborting once `cap` is exceeded.
    ///
    /// Once the cap is crossed the wrapped stream is never polled again:
    /// the overrun error is yielded exactly once and the stream then ends.
    pub struct SizeMonitoredStream<S> {
        #[pin]
        inner: S,
        seen: u64,
        cap: u64,
        aborted: bool,
    }
}

impl<S> SizeMonitoredStream<S> {
    /// Wrap `inner`, aborting once more than `cap` bytes have passed through.
    pub fn new(inner: S, cap: u64) -> Self {
        Self {
            inner,
            seen: 0,
            cap,
            aborted: false,
        }
    }

    /// Total bytes forwarded so far.
    pub fn bytes_seen(&self) -> u64 {
        self.seen
    }
}

impl<S, E> Stream for SizeMonitoredStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<HubError>,
{
    type Item = Result<Bytes, HubError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.aborted {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Ready(Some(Err(err))) => {
                *this.aborted = true;
                Poll::Ready(Some(Err(err.into())))
            }
            Poll::Ready(Some(Ok(chunk))) => {
                *this.seen += chunk.len() as u64;
                if *this.seen > *this.cap {
                    *this.aborted = true;
                    return Poll::Ready(Some(Err(HubError::new(
                        hub_error::HubErrorCode::PayloadTooLarge,
                        format!("upload exceeded cap of {} bytes", this.cap),
                    )
                    .with_context("cap", *this.cap)
                    .with_context("seen", *this.seen))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
        }
    }
}

/// Drive `upload` (the driver write, consuming the monitored stream) and
/// `pipeline` (any other future that must observe the same stream's
/// completion, e.g. a checksum) concurrently, surfacing whichever error
/// occurs first and cancelling the other.
pub async fn race_upload<T1, T2>(
    upload: impl std::future::Future<Output = Result<T1, HubError>>,
    pipeline: impl std::future::Future<Output = Result<T2, HubError>>,
) -> Result<(T1, T2), HubError> {
    futures::try_join!(upload, pipeline)
}
