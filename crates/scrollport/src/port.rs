#![forbid(unsafe_code)]

//! The scroll port: one host-facing object wiring the core pieces together.
//!
//! The host reports layout changes, native scroll offsets, raw input and
//! selection changes; the port keeps geometry, scroll position, the row
//! window and the selection pins consistent and tells observers what
//! happened. Deferred work goes through the [`RedrawScheduler`]: the host
//! installs a [`TickRequester`] and calls [`ScrollPort::flush`] from the
//! callback it arms.

use std::fmt;

use scrollport_core::{
    CellMeasurer, FontSpec, HostInput, HostSelection, InputNormalizer, Intent, NodeId, NodeTree,
    PassKind, PassReport, RedrawScheduler, Result, RowSource, RowWindow, ScreenSize,
    ScrollController, ScrollState, SelectionRange, SelectionTracker, TickRequester,
    ViewportGeometry, WheelScale, WindowTarget,
};
use tracing::{debug, trace};

use crate::announce::{AccessibilityReader, page_announcement};
use crate::config::ScrollPortConfig;
use crate::events::{EventBus, EventKind, ScrollPortEvent, SubscriptionId};

/// A virtualized viewport over the rows of `S`.
pub struct ScrollPort<S: RowSource> {
    source: S,
    window: RowWindow,
    tracker: SelectionTracker,
    host_selection: Option<HostSelection>,
    geometry: ViewportGeometry,
    /// Last screen size reported by the host, scrollbar included.
    reported_screen: ScreenSize,
    scroll: ScrollController,
    scheduler: RedrawScheduler,
    input: InputNormalizer,
    events: EventBus,
    config: ScrollPortConfig,
    measurer: Box<dyn CellMeasurer>,
    ticker: Option<Box<dyn TickRequester>>,
    reader: Option<Box<dyn AccessibilityReader>>,
    last_report: Option<PassReport>,
    /// The scroll position moved since the last pass; `Scroll` is owed.
    scroll_moved: bool,
}

impl<S: RowSource + fmt::Debug> fmt::Debug for ScrollPort<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollPort")
            .field("source", &self.source)
            .field("geometry", &self.geometry)
            .field("scroll", &self.scroll)
            .field("scheduler", &self.scheduler)
            .field("selection", self.tracker.range())
            .finish_non_exhaustive()
    }
}

impl<S: RowSource> ScrollPort<S> {
    /// A port with a zero-sized screen. Call [`Self::set_screen_size`] once
    /// the host knows its layout.
    pub fn new(source: S, config: ScrollPortConfig, measurer: impl CellMeasurer + 'static) -> Self {
        let cell = measurer.measure_cell(&config.font);
        let input = InputNormalizer::new(config.paste_on_drop);
        Self {
            source,
            window: RowWindow::new(),
            tracker: SelectionTracker::new(),
            host_selection: None,
            geometry: ViewportGeometry::new(ScreenSize::default(), cell),
            reported_screen: ScreenSize::default(),
            scroll: ScrollController::new(),
            scheduler: RedrawScheduler::new(),
            input,
            events: EventBus::new(),
            config,
            measurer: Box::new(measurer),
            ticker: None,
            reader: None,
            last_report: None,
            scroll_moved: false,
        }
    }

    /// Install the callback arm used for deferred passes.
    pub fn set_tick_requester(&mut self, ticker: impl TickRequester + 'static) {
        self.ticker = Some(Box::new(ticker));
    }

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&ScrollPortEvent) + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(kind, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    fn effective_screen(&self) -> ScreenSize {
        self.reported_screen
            .without_scrollbar(self.config.effective_scrollbar_width())
    }

    /// Record the host's current layout without re-syncing. A scroll
    /// notification that arrives before the resize then routes to resize.
    pub fn note_screen_size(&mut self, width: f64, height: f64) {
        self.reported_screen = ScreenSize::new(width, height);
    }

    /// The host's layout changed.
    pub fn set_screen_size(&mut self, width: f64, height: f64) {
        self.note_screen_size(width, height);
        self.resize();
    }

    /// Re-measure the cell, re-sync geometry, and publish `Resize`. Once
    /// observers have run, the last row is scrolled into view and a redraw
    /// is scheduled.
    pub fn resize(&mut self) {
        let cell = self.measurer.measure_cell(&self.config.font);
        let screen = self.effective_screen();
        let changed = self.geometry.sync(screen, cell);
        debug!(
            target: "scrollport::port",
            width = screen.width,
            height = screen.height,
            visible_rows = self.geometry.visible_row_count(),
            changed,
            "resize"
        );

        let row_count = self.source.row_count();
        let last_row = row_count.saturating_sub(1);
        let scroll = &mut self.scroll;
        let geometry = &self.geometry;
        let scheduler = &mut self.scheduler;
        let ticker = &mut self.ticker;
        self.events.publish_then(&ScrollPortEvent::Resize, || {
            scroll.scroll_row_to_bottom(last_row, geometry, row_count);
            arm(scheduler.schedule_redraw(), ticker);
        });
    }

    /// Re-measure the cell size; resizes when it changed.
    pub fn sync_character_size(&mut self) -> bool {
        let cell = self.measurer.measure_cell(&self.config.font);
        if cell == self.geometry.cell() || !cell.is_usable() {
            return false;
        }
        self.resize();
        true
    }

    // -----------------------------------------------------------------------
    // Passes
    // -----------------------------------------------------------------------

    /// Request a deferred redraw.
    pub fn schedule_redraw(&mut self) {
        arm(self.scheduler.schedule_redraw(), &mut self.ticker);
    }

    /// Request a deferred invalidate (drop and re-fetch the window).
    pub fn schedule_invalidate(&mut self) {
        arm(self.scheduler.schedule_invalidate(), &mut self.ticker);
    }

    /// Run whatever is pending. Call this from the armed host callback.
    ///
    /// # Errors
    ///
    /// Propagates fatal pass errors.
    pub fn flush(&mut self) -> Result<Option<PassReport>> {
        match self.scheduler.run_pending() {
            Some(PassKind::Invalidate) => self.invalidate(),
            Some(PassKind::Redraw) => self.redraw(),
            None => Ok(None),
        }
    }

    /// Reconcile immediately. `None` if a pass is already in flight.
    ///
    /// # Errors
    ///
    /// Propagates fatal selection and excision errors.
    pub fn redraw(&mut self) -> Result<Option<PassReport>> {
        self.run_pass(PassKind::Redraw)
    }

    /// Drop every unpinned row and re-fetch the window immediately.
    ///
    /// # Errors
    ///
    /// Propagates fatal selection and excision errors.
    pub fn invalidate(&mut self) -> Result<Option<PassReport>> {
        self.run_pass(PassKind::Invalidate)
    }

    fn run_pass(&mut self, kind: PassKind) -> Result<Option<PassReport>> {
        if !self.scheduler.begin_pass() {
            return Ok(None);
        }
        let result = self.reconcile_now(kind);
        self.scheduler.finish_pass();
        let report = result?;
        self.last_report = Some(report);
        if std::mem::take(&mut self.scroll_moved) {
            let state = self.scroll_state();
            self.events.publish(&ScrollPortEvent::Scroll(state));
        }
        Ok(Some(report))
    }

    fn reconcile_now(&mut self, kind: PassKind) -> Result<PassReport> {
        let row_count = self.source.row_count();
        self.scroll.clamp(&self.geometry, row_count);
        let selection = self
            .tracker
            .sync(self.host_selection.as_ref(), self.window.tree())?;
        if kind == PassKind::Invalidate {
            self.window.invalidate(selection);
        }
        let target = WindowTarget::from(self.scroll.snapshot(&self.geometry));
        let report = self.window.reconcile(&mut self.source, target, selection)?;
        self.scroll.sync_scrolled_end(&self.geometry, row_count);
        trace!(target: "scrollport::port", kind = ?kind, top = target.top_row, "pass ran");
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Scrolling
    // -----------------------------------------------------------------------

    /// The host scrolled natively to `offset_px`.
    ///
    /// If the screen size changed since the last sync, the notification is a
    /// side effect of a layout change and resize runs instead. Otherwise the
    /// window is redrawn now and `Scroll` is published after the pass.
    ///
    /// # Errors
    ///
    /// Propagates fatal pass errors.
    pub fn on_scroll(&mut self, offset_px: f64) -> Result<Option<PassReport>> {
        if self.effective_screen() != self.geometry.screen() {
            debug!(target: "scrollport::port", "scroll with stale geometry; resizing");
            self.resize();
            return Ok(None);
        }
        let row_count = self.source.row_count();
        self.scroll.set_offset(offset_px, &self.geometry, row_count);
        self.scroll_moved = true;
        self.redraw()
    }

    pub fn scroll_row_to_top(&mut self, index: usize) -> bool {
        let row_count = self.source.row_count();
        let moved = self.scroll.scroll_row_to_top(index, &self.geometry, row_count);
        self.redraw_if(moved)
    }

    pub fn scroll_row_to_bottom(&mut self, index: usize) -> bool {
        let row_count = self.source.row_count();
        let moved = self
            .scroll
            .scroll_row_to_bottom(index, &self.geometry, row_count);
        self.redraw_if(moved)
    }

    /// Page up; a reader, if set, hears the new page.
    pub fn scroll_page_up(&mut self) -> bool {
        let row_count = self.source.row_count();
        let moved = self.scroll.page_up(&self.geometry, row_count);
        if self.redraw_if(moved) {
            self.announce_page();
        }
        moved
    }

    /// Page down; a reader, if set, hears the new page.
    pub fn scroll_page_down(&mut self) -> bool {
        let row_count = self.source.row_count();
        let moved = self.scroll.page_down(&self.geometry, row_count);
        if self.redraw_if(moved) {
            self.announce_page();
        }
        moved
    }

    fn redraw_if(&mut self, moved: bool) -> bool {
        if moved {
            self.schedule_redraw();
        }
        moved
    }

    fn announce_page(&mut self) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        let top = self.scroll.top_row_index(&self.geometry);
        let text = page_announcement(&self.source, top, self.geometry.visible_row_count());
        reader.assertive_announce(&text);
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Normalize one host input and act on it. Returns the intent acted on.
    pub fn handle_input(&mut self, input: &HostInput) -> Option<Intent> {
        let scale = WheelScale::from_geometry(&self.geometry, self.config.scroll_wheel_multiplier);
        let intent = self.input.normalize(input, &scale)?;
        match &intent {
            Intent::ScrollBy { pixels } => {
                let row_count = self.source.row_count();
                if self.scroll.scroll_by(*pixels, &self.geometry, row_count) {
                    self.scroll_moved = true;
                    self.schedule_redraw();
                }
            }
            Intent::Paste { text } => {
                self.events
                    .publish(&ScrollPortEvent::Paste { text: text.clone() });
            }
            Intent::Focus => {
                self.events.publish(&ScrollPortEvent::Focus);
            }
        }
        trace!(target: "scrollport::input", intent = ?intent, "input handled");
        Some(intent)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// The host selection changed.
    ///
    /// # Errors
    ///
    /// [`scrollport_core::ScrollPortError::SelectionOrder`] when the new
    /// selection cannot be ordered.
    pub fn set_selection(&mut self, selection: Option<HostSelection>) -> Result<&SelectionRange> {
        self.host_selection = selection;
        self.tracker.sync(self.host_selection.as_ref(), self.window.tree())
    }

    /// Select every row, pinning the first and last rows.
    ///
    /// # Errors
    ///
    /// Propagates selection sync errors.
    pub fn select_all(&mut self) -> Result<&SelectionRange> {
        let selection = self.window.select_all(&mut self.source);
        self.set_selection(selection)
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionRange {
        self.tracker.range()
    }

    #[must_use]
    pub fn host_selection(&self) -> Option<&HostSelection> {
        self.host_selection.as_ref()
    }

    /// Plain text of the current selection, including rows that are not
    /// materialized.
    ///
    /// # Errors
    ///
    /// Propagates selection sync errors.
    pub fn copy_text(&mut self) -> Result<String> {
        let selection = self
            .tracker
            .sync(self.host_selection.as_ref(), self.window.tree())?;
        let target = WindowTarget::from(self.scroll.snapshot(&self.geometry));
        self.window.fill_select_bags(&self.source, selection, target);
        Ok(self.window.selection_text(selection))
    }

    pub fn set_assistive_reading(&mut self, enabled: bool) {
        self.tracker.set_assistive_reading(enabled);
    }

    pub fn set_accessibility_reader(&mut self, reader: impl AccessibilityReader + 'static) {
        self.reader = Some(Box::new(reader));
    }

    pub fn clear_accessibility_reader(&mut self) {
        self.reader = None;
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &ScrollPortConfig {
        &self.config
    }

    pub fn set_font(&mut self, font: FontSpec) {
        self.config.font = font;
        self.sync_character_size();
    }

    pub fn set_font_family(&mut self, family: impl Into<String>, smoothing: impl Into<String>) {
        self.config.font.family = family.into();
        self.config.font.smoothing = smoothing.into();
        self.sync_character_size();
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.config.font.size = size;
        self.sync_character_size();
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.config.font.zoom = zoom;
        self.sync_character_size();
    }

    pub fn set_foreground_color(&mut self, color: impl Into<String>) {
        self.config.foreground_color = color.into();
    }

    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.config.background_color = color.into();
    }

    pub fn set_background_image(&mut self, image: Option<String>) {
        self.config.background_image = image;
    }

    pub fn set_user_css_url(&mut self, url: Option<String>) {
        self.config.user_css_url = url;
    }

    pub fn set_user_css_text(&mut self, text: Option<String>) {
        self.config.user_css_text = text;
    }

    /// Showing or hiding the scrollbar changes the usable width.
    pub fn set_scrollbar_visible(&mut self, visible: bool) {
        if self.config.scrollbar_visible != visible {
            self.config.scrollbar_visible = visible;
            self.resize();
        }
    }

    pub fn set_scroll_wheel_multiplier(&mut self, multiplier: f64) {
        self.config.scroll_wheel_multiplier = multiplier;
    }

    pub fn set_ctrl_v_paste(&mut self, enabled: bool) {
        self.config.ctrl_v_paste = enabled;
    }

    pub fn set_paste_on_drop(&mut self, enabled: bool) {
        self.config.paste_on_drop = enabled;
        self.input.set_paste_on_drop(enabled);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn top_row_index(&self) -> usize {
        self.scroll.top_row_index(&self.geometry)
    }

    #[must_use]
    pub fn bottom_row_index(&self) -> usize {
        self.scroll
            .bottom_row_index(self.top_row_index(), &self.geometry)
    }

    #[must_use]
    pub fn visible_row_count(&self) -> usize {
        self.geometry.visible_row_count()
    }

    #[must_use]
    pub fn is_scrolled_end(&self) -> bool {
        self.scroll.is_scrolled_end()
    }

    #[must_use]
    pub fn scroll_offset(&self) -> f64 {
        self.scroll.offset()
    }

    #[must_use]
    pub fn scroll_height(&self) -> f64 {
        self.geometry.scroll_height(self.source.row_count())
    }

    #[must_use]
    pub fn scroll_state(&self) -> ScrollState {
        self.scroll.snapshot(&self.geometry)
    }

    #[must_use]
    pub fn geometry(&self) -> &ViewportGeometry {
        &self.geometry
    }

    /// Rendered rows, in order.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<NodeId> {
        self.window.visible_rows()
    }

    #[must_use]
    pub fn window(&self) -> &RowWindow {
        &self.window
    }

    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        self.window.tree()
    }

    #[must_use]
    pub fn scheduler(&self) -> &RedrawScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn last_report(&self) -> Option<&PassReport> {
        self.last_report.as_ref()
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the source. Changing existing rows requires
    /// [`Self::schedule_invalidate`]; appending only needs a redraw.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

/// Arm the host callback on an idle -> scheduled transition.
fn arm(transitioned: bool, ticker: &mut Option<Box<dyn TickRequester>>) {
    if transitioned {
        if let Some(ticker) = ticker.as_mut() {
            ticker.request_tick();
        }
    }
}
