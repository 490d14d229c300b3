//! Delivery of tail events to any number of subscribers.

use crate::error::Error;
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// What a subscriber receives.
#[derive(Debug, Clone)]
pub enum TailEvent {
    /// One decoded line, without its terminator.
    Line(String),
    /// A failure handling one notification. The session keeps running.
    Error(Arc<Error>),
}

impl TailEvent {
    pub fn line(&self) -> Option<&str> {
        match self {
            TailEvent::Line(line) => Some(line),
            TailEvent::Error(_) => None,
        }
    }
}

/// A subscription to a [`Tail`](crate::Tail), yielding events in file order.
///
/// The stream ends once the session is stopped and every queued event has been
/// consumed.
#[derive(Debug)]
pub struct LineStream {
    receiver: mpsc::UnboundedReceiver<TailEvent>,
}

impl LineStream {
    /// Takes the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<TailEvent> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the next event; `None` once the session has ended.
    pub async fn recv(&mut self) -> Option<TailEvent> {
        self.receiver.recv().await
    }
}

impl Stream for LineStream {
    type Item = TailEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Fan-out list of subscriber channels. Dropped subscribers are pruned on the
/// next publish.
#[derive(Debug, Clone, Default)]
pub(crate) struct Subscribers {
    inner: Arc<Mutex<SubscriberList>>,
}

#[derive(Debug, Default)]
struct SubscriberList {
    senders: Vec<mpsc::UnboundedSender<TailEvent>>,
    closed: bool,
}

impl Subscribers {
    /// Registers a subscriber. After [`close`](Self::close) the returned
    /// stream is already finished.
    pub(crate) fn subscribe(&self) -> LineStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut list = self.lock();
        if !list.closed {
            list.senders.push(tx);
        }
        LineStream { receiver: rx }
    }

    pub(crate) fn publish(&self, event: TailEvent) {
        self.lock()
            .senders
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drops every sender so subscriber streams end after draining.
    pub(crate) fn close(&self) {
        let mut list = self.lock();
        list.closed = true;
        list.senders.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().senders.len()
    }

    fn lock(&self) -> MutexGuard<'_, SubscriberList> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
