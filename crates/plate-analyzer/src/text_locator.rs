//! Text location: page text plus OCR for zones that need it.
//!
//! The OCR collaborator is external and may be slow or hang. Each call runs
//! on its own thread and is awaited with a bounded timeout; a zone whose call
//! times out or fails is marked degraded and extraction continues with
//! whatever page text it has. Calls still running after their timeout
//! count against a shared worker limit, so a collaborator that hangs cannot
//! pile up threads across a batch.

use crate::segmenter::Segmentation;
use crossbeam_channel::{bounded, RecvTimeoutError};
use plate_core::{BBox, Diagnostic, OcrPolicy, Page, PageId, TextToken, TokenId, Zone};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Token share that must lie inside the requested region to be kept
const REGION_OVERLAP: f64 = 0.5;
/// `IoU` above which a recognized token repeats a token the zone already has
const DUPLICATE_IOU: f64 = 0.5;
/// Abandoned OCR calls tolerated on top of one running call per pool thread
pub const SPARE_OCR_WORKERS: usize = 8;

/// Failure of the OCR collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("text recognition timed out after {0:?}")]
    Timeout(Duration),
    #[error("text recognition failed: {0}")]
    Failed(String),
}

/// External OCR engine returning positioned text for a page region
pub trait TextCollaborator: Send + Sync {
    /// Recognize text in `region` of `page`.
    ///
    /// `timeout` is advisory; the locator enforces it regardless.
    fn recognize(
        &self,
        page: &PageId,
        region: BBox,
        timeout: Duration,
    ) -> Result<Vec<TextToken>, CollaboratorError>;
}

/// Collaborator that never recognizes anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcr;

impl TextCollaborator for NoOcr {
    fn recognize(
        &self,
        _page: &PageId,
        _region: BBox,
        _timeout: Duration,
    ) -> Result<Vec<TextToken>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Page tokens followed by recognized tokens, addressed by [`TokenId`]
#[derive(Debug, Clone)]
pub struct TokenArena<'p> {
    page: &'p [TextToken],
    recognized: Vec<TextToken>,
}

impl<'p> TokenArena<'p> {
    #[must_use = "returns a new TokenArena"]
    pub fn new(page: &'p Page) -> Self {
        Self {
            page: &page.tokens,
            recognized: Vec::new(),
        }
    }

    #[inline]
    #[must_use = "returns the token, if the id is valid"]
    pub fn get(&self, id: TokenId) -> Option<&TextToken> {
        if id.0 < self.page.len() {
            self.page.get(id.0)
        } else {
            self.recognized.get(id.0 - self.page.len())
        }
    }

    /// Append a recognized token and return its id
    pub fn push(&mut self, token: TextToken) -> TokenId {
        self.recognized.push(token);
        TokenId(self.page.len() + self.recognized.len() - 1)
    }

    /// Tokens of a zone with their ids, skipping stale ids
    pub fn zone_tokens<'a>(&'a self, zone: &'a Zone) -> impl Iterator<Item = (TokenId, &'a TextToken)> + 'a {
        zone.token_ids
            .iter()
            .filter_map(move |&id| self.get(id).map(|t| (id, t)))
    }

    #[inline]
    #[must_use = "returns the number of page tokens"]
    pub fn page_len(&self) -> usize {
        self.page.len()
    }

    #[must_use = "returns the recognized tokens"]
    pub fn into_recognized(self) -> Vec<TextToken> {
        self.recognized
    }
}

/// Releases a worker slot when the OCR thread ends
struct WorkerSlot(Arc<AtomicUsize>);

impl WorkerSlot {
    fn acquire(in_flight: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(in_flight)))
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Wraps the OCR collaborator with a policy and a bounded timeout
#[derive(Clone)]
pub struct TextLocator {
    collaborator: Arc<dyn TextCollaborator>,
    policy: OcrPolicy,
    timeout: Duration,
    max_workers: usize,
    in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for TextLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextLocator")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .field("max_workers", &self.max_workers)
            .finish_non_exhaustive()
    }
}

impl Default for TextLocator {
    fn default() -> Self {
        Self::new(Arc::new(NoOcr), OcrPolicy::Never, Duration::from_secs(2))
    }
}

impl TextLocator {
    #[must_use = "returns a new TextLocator"]
    pub fn new(collaborator: Arc<dyn TextCollaborator>, policy: OcrPolicy, timeout: Duration) -> Self {
        Self {
            collaborator,
            policy,
            timeout,
            max_workers: rayon::current_num_threads() + SPARE_OCR_WORKERS,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Cap the OCR calls running at once (at least one)
    #[must_use = "returns the locator with the worker limit set"]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// OCR calls currently running, including abandoned ones
    #[inline]
    #[must_use = "returns the number of running OCR calls"]
    pub fn workers_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use = "returns the OCR policy"]
    pub const fn policy(&self) -> OcrPolicy {
        self.policy
    }

    fn wants_ocr(&self, zone: &Zone) -> bool {
        match self.policy {
            OcrPolicy::Never => false,
            OcrPolicy::WhenNoText => zone.token_ids.is_empty(),
            OcrPolicy::Always => true,
        }
    }

    /// Add recognized tokens to the zones that need them.
    ///
    /// Returns one diagnostic per zone whose collaborator call timed out or
    /// failed; those zones are flagged `text_degraded`.
    pub fn locate(
        &self,
        page: &Page,
        segmentation: &mut Segmentation,
        arena: &mut TokenArena<'_>,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut requested = 0usize;
        let mut recognized = 0usize;

        for zone in segmentation.all_zones_mut() {
            if !self.wants_ocr(zone) {
                continue;
            }
            requested += 1;
            match self.recognize_bounded(&page.id, zone.bbox) {
                Ok(tokens) => {
                    for token in tokens {
                        if token.is_blank()
                            || token.bbox.intersection_over_self(&zone.bbox) < REGION_OVERLAP
                            || repeats_zone_token(arena, zone, &token)
                        {
                            continue;
                        }
                        let token = TextToken::recognized(token.text, token.bbox, token.confidence);
                        zone.token_ids.push(arena.push(token));
                        recognized += 1;
                    }
                }
                Err(CollaboratorError::Timeout(after)) => {
                    log::warn!(
                        "OCR for {} on page {} timed out after {:?}",
                        zone.id,
                        page.id,
                        after
                    );
                    zone.text_degraded = true;
                    diagnostics.push(Diagnostic::CollaboratorTimeout { zone: zone.id });
                }
                Err(CollaboratorError::Failed(reason)) => {
                    log::warn!("OCR for {} on page {} failed: {}", zone.id, page.id, reason);
                    zone.text_degraded = true;
                    diagnostics.push(Diagnostic::CollaboratorFailed {
                        zone: zone.id,
                        reason,
                    });
                }
            }
        }

        if requested > 0 {
            log::debug!(
                "Page {}: OCR requested for {} zones, {} tokens recognized, {} degraded",
                page.id,
                requested,
                recognized,
                diagnostics.len()
            );
        }
        diagnostics
    }

    /// Run one collaborator call on a worker thread, bounded by the timeout.
    ///
    /// A collaborator that never returns leaves its thread detached, holding
    /// its worker slot until it ends; the page carries on without it. When
    /// every slot is taken the call fails without starting a thread.
    fn recognize_bounded(&self, page: &PageId, region: BBox) -> Result<Vec<TextToken>, CollaboratorError> {
        let slot = WorkerSlot::acquire(&self.in_flight, self.max_workers).ok_or_else(|| {
            CollaboratorError::Failed(format!(
                "{} OCR calls still running, limit reached",
                self.max_workers
            ))
        })?;
        let (tx, rx) = bounded(1);
        let collaborator = Arc::clone(&self.collaborator);
        let page = page.clone();
        let timeout = self.timeout;
        thread::Builder::new()
            .name("plate-ocr".to_string())
            .spawn(move || {
                let _slot = slot;
                // Receiver may be gone after a timeout
                let _ = tx.send(collaborator.recognize(&page, region, timeout));
            })
            .map_err(|e| CollaboratorError::Failed(format!("could not start OCR worker: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CollaboratorError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(CollaboratorError::Failed(
                "OCR worker exited without a result".to_string(),
            )),
        }
    }
}

/// True when the zone already holds `token`'s text at about the same place
fn repeats_zone_token(arena: &TokenArena<'_>, zone: &Zone, token: &TextToken) -> bool {
    let text = token.text.trim();
    arena
        .zone_tokens(zone)
        .any(|(_, t)| t.text.trim() == text && t.bbox.iou(&token.bbox) >= DUPLICATE_IOU)
}
