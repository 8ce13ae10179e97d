//! Recording transport for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use super::{HttpAdapter, TransportError};

pub(crate) enum MockReply {
    Body(Vec<u8>),
    NoContent,
    Status(u16),
}

/// Replays queued replies in order and records every requested URL.
#[derive(Default)]
pub(crate) struct MockHttp {
    replies: Mutex<VecDeque<MockReply>>,
    urls: Mutex<Vec<String>>,
    calls: AtomicUsize,
    forbid: bool,
}

impl MockHttp {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A transport that panics if it is ever used.
    pub(crate) fn forbidden() -> Self {
        Self {
            forbid: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_body(body: &str) -> Self {
        let mock = Self::new();
        mock.push(MockReply::Body(body.as_bytes().to_vec()));
        mock
    }

    pub(crate) fn with_bytes(body: &[u8]) -> Self {
        let mock = Self::new();
        mock.push(MockReply::Body(body.to_vec()));
        mock
    }

    pub(crate) fn with_status(status: u16) -> Self {
        let mock = Self::new();
        mock.push(MockReply::Status(status));
        mock
    }

    pub(crate) fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_url(&self) -> Option<String> {
        self.urls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpAdapter for MockHttp {
    async fn fetch(&self, url: &Url) -> Result<Option<Vec<u8>>, TransportError> {
        assert!(!self.forbid, "unexpected network call to {}", url);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        match self.replies.lock().unwrap().pop_front() {
            Some(MockReply::Body(body)) => Ok(Some(body)),
            Some(MockReply::NoContent) | None => Ok(None),
            Some(MockReply::Status(code)) => Err(TransportError::Status(code)),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
