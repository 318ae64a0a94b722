// Skiff Engine — Paged Collection Browser
//
// Owns the pagination state machine for a remote record set: the cached
// page, the known total, and a single selection addressed by GLOBAL index
// (position across all pages), so detail-view navigation survives page
// boundaries.
//
// Concurrency contract: loads are serialized per instance. A `load_page`
// issued while one is in flight is rejected (`EngineError::Busy`), never
// queued; the in-flight load carries a generation token and a reply whose
// token no longer matches is discarded rather than applied. Every fetch is
// bounded by a timeout that resolves as a transport failure. State lives
// behind a `parking_lot::Mutex` that is never held across an await.

use crate::atoms::constants::{DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{PageMeta, PageRequest, Record};
use crate::engine::source::PageSource;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::time::Duration;

// ── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Rows per page; clamped to `[MIN_PAGE_SIZE, MAX_PAGE_SIZE]`.
    pub page_size: u32,
    /// Per-fetch deadline. Elapsing counts as a transport failure.
    pub timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        BrowserConfig {
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub fn clamp_page_size(size: u32) -> u32 {
    size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

// ── State ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BrowserState {
    page: u64,
    page_size: u32,
    rows: Vec<Record>,
    /// Total record count as last reported by the source; `None` until known.
    total: Option<u64>,
    /// Global index of the open record, independent of the cached page.
    selection: Option<u64>,
    loading: bool,
    /// Bumped when a load is issued; a completion with a stale token is
    /// discarded instead of applied.
    generation: u64,
    last_error: Option<String>,
}

/// Plain-data copy of the state for a rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSnapshot {
    pub page: u64,
    pub page_size: u32,
    pub rows: Vec<Record>,
    pub total: Option<u64>,
    pub selection: Option<u64>,
    pub loading: bool,
    pub last_error: Option<String>,
}

// ── Browser ────────────────────────────────────────────────────────────────

pub struct PageBrowser<S> {
    source: S,
    timeout: Duration,
    state: Mutex<BrowserState>,
}

/// Releases the in-flight flag if a load future is dropped mid-await.
/// After a newer load bumped the generation this is a no-op, so a completed
/// successor is never clobbered.
struct InFlight<'a> {
    state: &'a Mutex<BrowserState>,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut st = self.state.lock();
        if st.generation == self.generation && st.loading {
            st.loading = false;
        }
    }
}

impl<S: PageSource> PageBrowser<S> {
    pub fn new(source: S, config: BrowserConfig) -> Self {
        PageBrowser {
            source,
            timeout: config.timeout,
            state: Mutex::new(BrowserState {
                page_size: clamp_page_size(config.page_size),
                ..BrowserState::default()
            }),
        }
    }

    /// Load one page, replacing the cached rows wholesale.
    ///
    /// Synchronous rejections (no fetch is issued, state untouched):
    /// a negative page, a page starting at or past a known nonzero total,
    /// or a load already in flight. On fetch failure only the error-status
    /// side channel changes. The selection is cleared on success unless
    /// `preserve_selection` is set.
    pub async fn load_page(&self, target_page: i64, preserve_selection: bool) -> EngineResult<()> {
        let (req, generation) = {
            let mut st = self.state.lock();
            if target_page < 0 {
                return Err(EngineError::validation(format!("page {target_page} is negative")));
            }
            let target = target_page as u64;
            if let Some(total) = st.total {
                // A total of exactly 0 stays navigable so an empty table can
                // still render (and recover if records appear later).
                if total != 0 && target.saturating_mul(st.page_size as u64) >= total {
                    return Err(EngineError::validation(format!(
                        "page {target} starts at or past the {total} known records"
                    )));
                }
            }
            if st.loading {
                return Err(EngineError::Busy);
            }
            st.loading = true;
            st.generation += 1;
            (PageRequest { page: target, page_size: st.page_size }, st.generation)
        };

        let _in_flight = InFlight { state: &self.state, generation };

        let outcome = match tokio::time::timeout(self.timeout, self.source.fetch(req.clone())).await
        {
            Ok(result) => result,
            Err(_) => Err(EngineError::transport(format!(
                "no response within {}s",
                self.timeout.as_secs()
            ))),
        };

        let mut st = self.state.lock();
        st.loading = false;
        if st.generation != generation {
            debug!("[browser] discarding reply for superseded load of page {}", req.page);
            return Err(EngineError::Busy);
        }

        match outcome {
            Ok(reply) => {
                st.page = req.page;
                st.rows = reply.data;
                // A null count keeps whatever total we already knew.
                if let Some(count) = reply.count {
                    st.total = Some(count);
                }
                if !preserve_selection {
                    st.selection = None;
                }
                st.last_error = None;
                info!(
                    "[browser] page {} loaded: {} rows, total {:?}",
                    st.page,
                    st.rows.len(),
                    st.total
                );
                Ok(())
            }
            Err(e) => {
                st.last_error = Some(e.to_string());
                warn!("[browser] page {} load failed: {e}", req.page);
                Err(e)
            }
        }
    }

    /// Clamp and adopt a new page size, drop the selection, reload page 0.
    pub async fn refresh(&self, page_size: u32) -> EngineResult<()> {
        {
            let mut st = self.state.lock();
            st.page_size = clamp_page_size(page_size);
            st.selection = None;
        }
        self.load_page(0, false).await
    }

    /// Open the record at `local_index` on the cached page, recording its
    /// global index as the selection, and return it for the detail surface.
    pub fn open_selection(&self, local_index: usize) -> EngineResult<Record> {
        let mut st = self.state.lock();
        let record = st
            .rows
            .get(local_index)
            .cloned()
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "row {local_index} is not on this page ({} rows)",
                    st.rows.len()
                ))
            })?;
        st.selection = Some(st.page * st.page_size as u64 + local_index as u64);
        Ok(record)
    }

    /// Move the selection by `offset` global positions, loading the target's
    /// page (selection preserved) when it lies across a page boundary.
    ///
    /// No-ops (`Ok(None)`): no selection is open, the target is negative, or
    /// the total is known and the target is at or past it. A failed page
    /// load aborts the shift and propagates its error.
    pub async fn shift_selection(&self, offset: i64) -> EngineResult<Option<Record>> {
        let (target, desired_page) = {
            let st = self.state.lock();
            let Some(selection) = st.selection else {
                return Ok(None);
            };
            let target = selection as i64 + offset;
            if target < 0 {
                return Ok(None);
            }
            let target = target as u64;
            if let Some(total) = st.total {
                if target >= total {
                    return Ok(None);
                }
            }
            let desired = target / st.page_size as u64;
            (target, (desired != st.page).then_some(desired))
        };

        if let Some(page) = desired_page {
            self.load_page(page as i64, true).await?;
        }

        let mut st = self.state.lock();
        let local = match target.checked_sub(st.page * st.page_size as u64) {
            Some(local) => local as usize,
            None => return Ok(None),
        };
        match st.rows.get(local) {
            Some(record) => {
                let record = record.clone();
                st.selection = Some(target);
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Plain-data copy of the current state.
    pub fn snapshot(&self) -> BrowserSnapshot {
        let st = self.state.lock();
        BrowserSnapshot {
            page: st.page,
            page_size: st.page_size,
            rows: st.rows.clone(),
            total: st.total,
            selection: st.selection,
            loading: st.loading,
            last_error: st.last_error.clone(),
        }
    }

    /// Derive the pagination view model. Pure function of the state —
    /// recompute after every state change, never cache.
    pub fn meta(&self) -> PageMeta {
        let st = self.state.lock();
        let page_size = st.page_size as u64;

        let total_pages = st.total.map(|t| t.div_ceil(page_size).max(1));
        let page_label = match total_pages {
            Some(pages) => format!("Page {} of {}", st.page + 1, pages),
            None => format!("Page {}", st.page + 1),
        };
        let range_label = st.total.filter(|t| *t > 0).map(|total| {
            let from = st.page * page_size + 1;
            let to = ((st.page + 1) * page_size).min(total);
            format!("Showing {from}-{to} of {total}")
        });

        let can_page_back = st.page > 0 && !st.loading;
        let can_page_forward = match total_pages {
            Some(pages) => st.page + 1 < pages && !st.loading,
            None => !st.loading,
        };

        // Highest global index present on the cached page, if any.
        let page_max_index = (st.page * page_size + st.rows.len() as u64).checked_sub(1);
        // No selection counts as "at end" AND "at start": the detail arrows
        // stay disabled until a record is opened. Product decision, ported
        // as observed.
        let (can_shift_back, can_shift_forward) = match st.selection {
            None => (false, false),
            Some(selection) => {
                let at_start = selection == 0;
                let at_end = match st.total {
                    Some(total) => selection + 1 >= total,
                    None => page_max_index.map_or(true, |max| selection >= max),
                };
                (!at_start && !st.loading, !at_end && !st.loading)
            }
        };

        PageMeta {
            page: st.page,
            page_size: st.page_size,
            total_pages,
            page_label,
            range_label,
            can_page_back,
            can_page_forward,
            can_shift_back,
            can_shift_forward,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
