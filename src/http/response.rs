//! Response body metering.
//!
//! # Design Decisions
//! - Counts the data bytes actually yielded by the body, streamed or not
//! - Reports exactly once: when the body ends, fails, or is dropped unread
//! - An already finished body (empty, HEAD-like) reports at construction

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Bytes, HttpBody};
use http_body::{Frame, SizeHint};
use pin_project::pin_project;

/// Body wrapper calling `on_finish` with the number of bytes written.
#[pin_project]
pub struct MeteredBody<B, F: FnOnce(u64)> {
    #[pin]
    inner: B,
    meter: Meter<F>,
}

struct Meter<F: FnOnce(u64)> {
    written: u64,
    on_finish: Option<F>,
}

impl<F: FnOnce(u64)> Meter<F> {
    fn finish(&mut self) {
        if let Some(on_finish) = self.on_finish.take() {
            on_finish(self.written);
        }
    }
}

impl<F: FnOnce(u64)> Drop for Meter<F> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<B, F> MeteredBody<B, F>
where
    B: HttpBody<Data = Bytes>,
    F: FnOnce(u64),
{
    pub fn new(inner: B, on_finish: F) -> Self {
        let mut meter = Meter {
            written: 0,
            on_finish: Some(on_finish),
        };
        if inner.is_end_stream() {
            meter.finish();
        }
        Self { inner, meter }
    }
}

impl<B, F> HttpBody for MeteredBody<B, F>
where
    B: HttpBody<Data = Bytes>,
    F: FnOnce(u64),
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, B::Error>>> {
        let mut this = self.project();
        let polled = this.inner.as_mut().poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.meter.written += data.len() as u64;
                }
                if this.inner.is_end_stream() {
                    this.meter.finish();
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.meter.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
