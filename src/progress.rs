//! Progress-callback trait for per-page rasterisation events.
//!
//! Pass an [`Arc<dyn RenderProgress>`] to
//! [`crate::pipeline::render::rasterize_pdf`] to observe pages as they are
//! written. The CLI drives a terminal progress bar from it; the HTTP server
//! uses [`TracingProgress`] so per-page events land in the request log.
//!
//! Rasterisation runs inside `spawn_blocking`, so implementations must be
//! `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use doc2pages::RenderProgress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl RenderProgress for Counter {
//!     fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("page {page_num}/{total_pages} ({done} done)");
//!     }
//! }
//! ```

use std::sync::Arc;
use tracing::{debug, warn};

/// Called by the rasteriser as it processes each page.
///
/// All methods default to no-ops so callers only override what they need.
pub trait RenderProgress: Send + Sync {
    /// Called once the PDF is open and its page count is known.
    fn on_render_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after page `page_num` (1-indexed) was written to disk.
    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when page `page_num` failed; no further pages follow.
    fn on_page_failed(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the last attempted page.
    fn on_render_complete(&self, total_pages: usize, rendered: usize) {
        let _ = (total_pages, rendered);
    }
}

/// A no-op implementation.
pub struct NoopProgress;

impl RenderProgress for NoopProgress {}

/// Forwards events to `tracing`, tagged with the page set's base name.
pub struct TracingProgress {
    base_name: String,
}

impl TracingProgress {
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
        }
    }
}

impl RenderProgress for TracingProgress {
    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        debug!("[{}] page {}/{} written", self.base_name, page_num, total_pages);
    }

    fn on_page_failed(&self, page_num: usize, total_pages: usize, error: &str) {
        warn!(
            "[{}] page {}/{} failed: {}",
            self.base_name, page_num, total_pages, error
        );
    }
}

/// Shared handle type accepted by the rasteriser.
pub type ProgressHandle = Arc<dyn RenderProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        started_total: AtomicUsize,
        rendered: AtomicUsize,
        failed: AtomicUsize,
        completed: AtomicUsize,
    }

    impl RenderProgress for Tracking {
        fn on_render_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_rendered(&self, _page_num: usize, _total_pages: usize) {
            self.rendered.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_failed(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_render_complete(&self, _total_pages: usize, rendered: usize) {
            self.completed.store(rendered, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_and_tracing_do_not_panic() {
        for cb in [
            Arc::new(NoopProgress) as ProgressHandle,
            Arc::new(TracingProgress::new("memo")),
        ] {
            cb.on_render_start(2);
            cb.on_page_rendered(1, 2);
            cb.on_page_failed(2, 2, "boom");
            cb.on_render_complete(2, 1);
        }
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        t.on_render_start(3);
        t.on_page_rendered(1, 3);
        t.on_page_rendered(2, 3);
        t.on_page_failed(3, 3, "encode");
        t.on_render_complete(3, 2);

        assert_eq!(t.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(t.rendered.load(Ordering::SeqCst), 2);
        assert_eq!(t.failed.load(Ordering::SeqCst), 1);
        assert_eq!(t.completed.load(Ordering::SeqCst), 2);
    }
}
