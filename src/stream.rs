//! Cancellable, channel-backed answer stream.
//!
//! [`ResponseStream`] is what [`ChatEngine::get_response`] hands to the
//! caller. A spawned producer task pulls fragments from the model and pushes
//! them into a bounded channel; the caller pulls from the other end.
//!
//! - Fragments arrive in model order, so any prefix of them concatenated is
//!   a prefix of the final answer.
//! - An upstream error is delivered as the last item; the stream then ends.
//! - Dropping the stream or calling [`cancel`](ResponseStream::cancel)
//!   aborts the producer, which drops the upstream HTTP body.
//!
//! [`ChatEngine::get_response`]: crate::chat::ChatEngine::get_response

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mishkat_core::language::LanguageProfile;
use mishkat_core::llm::FragmentStream;
use mishkat_core::models::ScoredChunk;
use mishkat_core::Result;

const CHANNEL_CAPACITY: usize = 32;

pub struct ResponseStream {
    profile: LanguageProfile,
    standalone_query: String,
    sources: Vec<ScoredChunk>,
    rx: mpsc::Receiver<Result<String>>,
    task: JoinHandle<()>,
    finished: bool,
}

impl ResponseStream {
    /// Start forwarding `upstream`, preceded by `prefix`.
    pub(crate) fn spawn(
        profile: LanguageProfile,
        standalone_query: String,
        sources: Vec<ScoredChunk>,
        prefix: String,
        mut upstream: FragmentStream,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            if tx.send(Ok(prefix)).await.is_err() {
                return;
            }
            while let Some(item) = upstream.next().await {
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    return;
                }
            }
        });

        Self {
            profile,
            standalone_query,
            sources,
            rx,
            task,
            finished: false,
        }
    }

    pub fn profile(&self) -> LanguageProfile {
        self.profile
    }

    /// The question actually sent to retrieval and the model.
    pub fn standalone_query(&self) -> &str {
        &self.standalone_query
    }

    /// Retrieved chunks, best match first.
    pub fn sources(&self) -> &[ScoredChunk] {
        &self.sources
    }

    /// Stop the upstream call. The stream yields nothing further.
    pub fn cancel(&mut self) {
        self.task.abort();
        self.rx.close();
        self.finished = true;
    }

    /// Drain the stream into one string, failing on the first error.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(fragment) = self.next().await {
            out.push_str(&fragment?);
        }
        Ok(out)
    }
}

impl Stream for ResponseStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Some(Ok(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FusedStream for ResponseStream {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}
