//! Cursor-paginated fetcher.
//!
//! [`PageFetcher`] walks one cursor chain lazily. Every request goes through
//! [`retry_transient`] with a fresh budget, so the retry counter is scoped to
//! the cursor being requested and resets when the chain advances. Parsing
//! happens outside the retry loop: a malformed body is never retried.

use indicatif::ProgressBar;
use worksync_core::{
    CancelToken, HttpClient, HttpConfig, RetryError, RetryPolicy, TransportError, fmt_num,
    redact_mailto, retry_transient, should_report,
};

use crate::cursor::Cursor;
use crate::error::{FetchError, Position};
use crate::page::{PageOutcome, RawPage};
use crate::query::QueryDescriptor;

/// Issues one GET and returns the body
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<String, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<String, TransportError> {
        (**self).get(url, cancel)
    }
}

/// Production transport over the shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<String, TransportError> {
        self.client.get_text(url, cancel)
    }
}

/// Lazy iterator over the pages of one query.
///
/// Yields `Ok(page)` for every non-empty page, stops after the last page,
/// and yields at most one `Err` after which it is exhausted.
pub struct PageFetcher<'a, T: Transport + ?Sized> {
    query: &'a QueryDescriptor,
    transport: &'a T,
    policy: RetryPolicy,
    cancel: CancelToken,
    /// `None` once the chain is finished or failed
    cursor: Option<Cursor>,
    pages: usize,
    items: usize,
    total_reported: Option<u64>,
    bar: ProgressBar,
}

impl<'a, T: Transport + ?Sized> PageFetcher<'a, T> {
    pub fn new(
        query: &'a QueryDescriptor,
        transport: &'a T,
        policy: RetryPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            query,
            transport,
            policy,
            cancel,
            cursor: Some(Cursor::start()),
            pages: 0,
            items: 0,
            total_reported: None,
            bar: ProgressBar::hidden(),
        }
    }

    /// Continue a chain from a cursor reported by an earlier [`FetchError`]
    pub fn resume_from(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Show per-page status on `bar`
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.bar = bar;
        self
    }

    /// Cursor of the next request; `None` when the chain is done
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn items_processed(&self) -> usize {
        self.items
    }

    pub fn total_reported(&self) -> Option<u64> {
        self.total_reported
    }

    fn position(&self, cursor: Cursor) -> Position {
        Position {
            query: self.query.label().to_string(),
            cursor,
            pages: self.pages,
            items_processed: self.items,
            total_reported: self.total_reported,
        }
    }

    fn progress_line(&self) -> String {
        match self.total_reported {
            Some(total) => format!(
                "page {}, {}/{} works",
                fmt_num(self.pages),
                fmt_num(self.items),
                fmt_num(total as usize)
            ),
            None => format!("page {}, {} works", fmt_num(self.pages), fmt_num(self.items)),
        }
    }

    fn finish(&mut self) {
        self.cursor = None;
        log::info!(
            "{}: done, {} pages, {} works",
            self.query.label(),
            fmt_num(self.pages),
            fmt_num(self.items)
        );
        self.bar
            .finish_with_message(format!("done, {} works", fmt_num(self.items)));
    }

    fn fail(&mut self, err: FetchError) -> Option<Result<RawPage, FetchError>> {
        self.cursor = None;
        log::error!("{err}");
        self.bar.abandon_with_message("failed");
        Some(Err(err))
    }
}

impl<T: Transport + ?Sized> Iterator for PageFetcher<'_, T> {
    type Item = Result<RawPage, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.clone()?;
        let url = self.query.page_url(&cursor);
        log::debug!("GET {}", redact_mailto(&url));

        let transport = self.transport;
        let cancel = &self.cancel;
        let result = retry_transient(self.query.label(), &self.policy, cancel, || {
            transport.get(&url, cancel)
        });

        let body = match result {
            Ok(body) => body,
            Err(RetryError::Exhausted { attempts, last }) => {
                let err = FetchError::RetriesExceeded {
                    position: Self::position(self, cursor),
                    retries: attempts.saturating_sub(1),
                    last_error: last,
                };
                return self.fail(err);
            }
            Err(RetryError::Cancelled | RetryError::Fatal(TransportError::Cancelled)) => {
                let err = FetchError::Cancelled {
                    position: Self::position(self, cursor),
                };
                return self.fail(err);
            }
            Err(RetryError::Fatal(source)) => {
                let err = FetchError::Http {
                    position: Self::position(self, cursor),
                    source,
                };
                return self.fail(err);
            }
        };

        let page = match RawPage::parse(&body) {
            Ok(page) => page,
            Err(e) => {
                let err = FetchError::Malformed {
                    position: Self::position(self, cursor),
                    message: e.to_string(),
                };
                return self.fail(err);
            }
        };

        match PageOutcome::from(page) {
            PageOutcome::EndOfStream => {
                self.finish();
                None
            }
            PageOutcome::Page(page) => {
                self.pages += 1;
                self.items += page.len();
                if page.meta.count.is_some() {
                    self.total_reported = page.meta.count;
                }
                let line = self.progress_line();
                if should_report(self.pages) {
                    log::info!("{}: {line}", self.query.label());
                }
                self.bar.set_message(line);

                match page.next_cursor() {
                    Some(next) => self.cursor = Some(next),
                    None => self.finish(),
                }
                Some(Ok(page))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::query::OPENALEX_WORKS;

    /// Replays canned responses and records every requested URL
    struct Scripted {
        responses: Mutex<VecDeque<Result<String, TransportError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<String, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    impl Transport for Scripted {
        fn get(&self, url: &str, _cancel: &CancelToken) -> Result<String, TransportError> {
            self.urls.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Http {
                    status: Some(599),
                    message: "script exhausted".to_string(),
                }))
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Result<String, TransportError> {
        let results: Vec<String> = ids.iter().map(|id| format!(r#"{{"id": "{id}"}}"#)).collect();
        let next = next.map_or("null".to_string(), |n| format!("\"{n}\""));
        Ok(format!(
            r#"{{"meta": {{"count": 5, "next_cursor": {next}}}, "results": [{}]}}"#,
            results.join(",")
        ))
    }

    fn status(code: u16) -> Result<String, TransportError> {
        Err(TransportError::Http {
            status: Some(code),
            message: "scripted".to_string(),
        })
    }

    fn query() -> QueryDescriptor {
        QueryDescriptor::builder(OPENALEX_WORKS)
            .institution("02wb73912")
            .select(&["id"])
            .label("institution")
            .build()
    }

    #[test]
    fn walks_chain_until_null_cursor() {
        let t = Scripted::new(vec![page(&["W1", "W2"], Some("c1")), page(&["W3"], None)]);
        let q = query();
        let pages: Vec<RawPage> = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), CancelToken::new())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pages.len(), 2);
        let urls = t.urls();
        assert!(urls[0].ends_with("&cursor=*"));
        assert!(urls[1].ends_with("&cursor=c1"));
    }

    #[test]
    fn empty_page_ends_stream_despite_cursor() {
        let t = Scripted::new(vec![page(&["W1"], Some("c1")), page(&[], Some("c2"))]);
        let q = query();
        let mut fetcher = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), CancelToken::new());
        assert!(fetcher.next().unwrap().is_ok());
        assert!(fetcher.next().is_none());
        assert!(fetcher.next().is_none());
        assert_eq!(t.urls().len(), 2);
        assert_eq!(fetcher.cursor(), None);
    }

    #[test]
    fn transient_failure_retries_same_cursor() {
        let t = Scripted::new(vec![
            page(&["W1"], Some("c1")),
            status(503),
            status(429),
            page(&["W2"], None),
        ]);
        let q = query();
        let pages: Vec<_> = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), CancelToken::new())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pages.len(), 2);
        let urls = t.urls();
        assert_eq!(urls.len(), 4);
        assert!(urls[1..].iter().all(|u| u.ends_with("&cursor=c1")));
    }

    #[test]
    fn retry_budget_resets_per_cursor() {
        // two failures on each cursor stay within a budget of 2
        let t = Scripted::new(vec![
            status(500),
            status(500),
            page(&["W1"], Some("c1")),
            status(502),
            status(502),
            page(&["W2"], None),
        ]);
        let q = query();
        let pages: Vec<_> = PageFetcher::new(&q, &t, RetryPolicy::immediate(2), CancelToken::new())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn retries_exceeded_after_max_plus_one_requests() {
        let t = Scripted::new(vec![
            page(&["W1", "W2"], Some("c1")),
            status(503),
            status(503),
            status(503),
            status(503),
            page(&["never"], None),
        ]);
        let q = query();
        let mut fetcher = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), CancelToken::new());
        assert!(fetcher.next().unwrap().is_ok());
        let err = fetcher.next().unwrap().unwrap_err();
        assert!(fetcher.next().is_none());

        assert_eq!(t.urls().len(), 1 + 4);
        assert!(matches!(err, FetchError::RetriesExceeded { .. }));
        assert_eq!(err.retries(), 3);
        assert_eq!(err.cursor().as_str(), "c1");
        assert_eq!(err.items_processed(), 2);
        assert_eq!(err.total_reported(), Some(5));
    }

    #[test]
    fn malformed_body_not_retried() {
        let t = Scripted::new(vec![Ok("<html>oops</html>".to_string()), page(&["W1"], None)]);
        let q = query();
        let mut fetcher = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), CancelToken::new());
        let err = fetcher.next().unwrap().unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
        assert!(err.cursor().is_start());
        assert_eq!(t.urls().len(), 1);
        assert!(fetcher.next().is_none());
    }

    #[test]
    fn client_error_not_retried() {
        let t = Scripted::new(vec![status(403), page(&["W1"], None)]);
        let q = query();
        let mut fetcher = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), CancelToken::new());
        let err = fetcher.next().unwrap().unwrap_err();
        match &err {
            FetchError::Http { source, .. } => assert_eq!(source.status(), Some(403)),
            other => panic!("expected Http, got {other:?}"),
        }
        assert_eq!(t.urls().len(), 1);
    }

    #[test]
    fn request_error_not_retried() {
        let t = Scripted::new(vec![
            Err(TransportError::Request("builder error".to_string())),
            page(&["W1"], None),
        ]);
        let q = query();
        let mut fetcher = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), CancelToken::new());
        let err = fetcher.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            FetchError::Http {
                source: TransportError::Request(_),
                ..
            }
        ));
        assert_eq!(err.retries(), 0);
        assert_eq!(t.urls().len(), 1);
    }

    #[test]
    fn cancelled_before_request() {
        let t = Scripted::new(vec![page(&["W1"], None)]);
        let q = query();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut fetcher = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), cancel);
        let err = fetcher.next().unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(t.urls().is_empty());
    }

    #[test]
    fn resume_starts_at_given_cursor() {
        let t = Scripted::new(vec![page(&["W9"], None)]);
        let q = query();
        let fetcher = PageFetcher::new(&q, &t, RetryPolicy::immediate(3), CancelToken::new())
            .resume_from(Cursor::new("saved=="));
        assert_eq!(fetcher.cursor(), Some(&Cursor::new("saved==")));
        let pages: Vec<_> = fetcher.collect::<Result<_, _>>().unwrap();
        assert_eq!(pages.len(), 1);
        assert!(t.urls()[0].ends_with("&cursor=saved%3D%3D"));
    }

    #[test]
    fn counters_track_progress() {
        let t = Scripted::new(vec![page(&["W1", "W2"], Some("c1")), page(&["W3"], None)]);
        let q = query();
        let mut fetcher = PageFetcher::new(&q, &t, RetryPolicy::immediate(0), CancelToken::new());
        fetcher.next();
        assert_eq!(fetcher.pages(), 1);
        assert_eq!(fetcher.items_processed(), 2);
        assert_eq!(fetcher.cursor(), Some(&Cursor::new("c1")));
        fetcher.next();
        assert_eq!(fetcher.items_processed(), 3);
        assert_eq!(fetcher.total_reported(), Some(5));
        assert_eq!(fetcher.cursor(), None);
    }
}
