use crate::buffer::Buffer;
use crate::error::{ErrorKind, Result};
use crate::events::{GlobalMessage, LabelFormatter, LocationInfo, PlainLabels, ScrollerEvent};
use crate::focus;
use crate::timer::{Sample, SettleTimer, TimerState};
use crate::viewport::{Edge, Viewport};
use exn::ResultExt;
use lectern_cache::ContentCache;
use lectern_config::ScrollerConfig;
use lectern_provider::{FragmentId, SectionContent, SectionId, TextDescriptor};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::instrument;

pub type LabelHandle = Arc<dyn LabelFormatter + Send + Sync>;

/// What a [`load`](VirtualizedScroller::load) call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Replace everything and start reading at this section.
    Text,
    /// Append below the last mounted section.
    Next,
    /// Prepend above the first mounted section.
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Mounted(SectionId),
    /// The section was mounted already; nothing changed.
    AlreadyMounted(SectionId),
    /// The provider has no such section.
    Missing,
    /// The section no longer borders the edge it was requested for.
    Stale(SectionId),
    /// The buffer is full.
    Capped,
}

/// The single structural change made when scrolling settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeAction {
    Nothing,
    LoadNext(SectionId),
    LoadPrevious(SectionId),
    TrimTop(SectionId),
    TrimBottom(SectionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollerState {
    /// No text set yet.
    Uninitialized,
    /// Text set, nothing mounted.
    Idle,
    /// Content mounted, scroll at rest.
    Settled,
    /// Content mounted, scroll velocity being sampled.
    Measuring,
    Closed,
}

/// Keeps a bounded, contiguous run of sections mounted in a [`Viewport`].
///
/// Many scrollers can share one [`ContentCache`]; each owns its viewport,
/// buffer and event channel. All operations take `&mut self`, so a
/// scroller never has more than one load in flight.
///
/// The host forwards raw scroll events to [`on_scroll`](Self::on_scroll)
/// and calls [`tick`](Self::tick) from its timer loop. Edges are only
/// evaluated once the scroll offset has stopped changing for a whole sample
/// interval, and at most one section is loaded or trimmed per evaluation.
pub struct VirtualizedScroller<V> {
    cache: Arc<ContentCache>,
    viewport: V,
    config: ScrollerConfig,
    labels: LabelHandle,
    events: Option<UnboundedSender<ScrollerEvent>>,
    text: Option<TextDescriptor>,
    buffer: Buffer,
    timer: SettleTimer,
    location: Option<LocationInfo>,
    closed: bool,
}

impl<V: Viewport> VirtualizedScroller<V> {
    /// Create a scroller and the receiving end of its event channel.
    pub fn new(cache: Arc<ContentCache>, viewport: V, config: ScrollerConfig) -> (Self, UnboundedReceiver<ScrollerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timer = SettleTimer::new(config.sample_interval(), config.nav_broadcast_delay());
        let scroller = Self {
            cache,
            viewport,
            config,
            labels: Arc::new(PlainLabels),
            events: Some(tx),
            text: None,
            buffer: Buffer::default(),
            timer,
            location: None,
            closed: false,
        };
        (scroller, rx)
    }

    pub fn with_labels(mut self, labels: LabelHandle) -> Self {
        self.labels = labels;
        self
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    /// The host scrolls through this, then reports it with [`on_scroll`](Self::on_scroll).
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn text(&self) -> Option<&TextDescriptor> {
        self.text.as_ref()
    }

    /// Mounted section ids, top to bottom.
    pub fn mounted_sections(&self) -> Vec<SectionId> {
        self.buffer.ids()
    }

    pub fn state(&self) -> ScrollerState {
        if self.closed {
            return ScrollerState::Closed;
        }
        if self.text.is_none() {
            return ScrollerState::Uninitialized;
        }
        if self.buffer.is_empty() {
            return ScrollerState::Idle;
        }
        match self.timer.state() {
            TimerState::Sampling => ScrollerState::Measuring,
            TimerState::Idle | TimerState::PendingBroadcast => ScrollerState::Settled,
        }
    }

    /// Whether [`tick`](Self::tick) has anything left to do.
    pub fn needs_tick(&self) -> bool {
        !self.closed && self.timer.state() != TimerState::Idle
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Switch to another text. Everything mounted is dropped.
    pub fn set_text_info(&mut self, text: TextDescriptor) -> Result<()> {
        if self.closed {
            exn::bail!(ErrorKind::Closed);
        }
        tracing::info!(text = %text.id, provider = %text.provider_name, "Switching text");
        self.buffer.clear();
        self.viewport.clear();
        self.timer.clear();
        self.location = None;
        self.text = Some(text);
        Ok(())
    }

    /// Load a section and splice it into the buffer.
    ///
    /// A section that is already mounted is never fetched again; with a
    /// `fragment_id` the viewport just moves there. `Next` and `Previous`
    /// results are only spliced when they still border the matching edge,
    /// and prepending keeps the reader's visible position where it was.
    ///
    /// # Errors
    /// - [`NoText`](ErrorKind::NoText) before [`set_text_info`](Self::set_text_info).
    /// - [`Closed`](ErrorKind::Closed) after [`close`](Self::close).
    /// - [`Load`](ErrorKind::Load) when the cache fails; the buffer is left untouched.
    #[instrument(skip(self))]
    pub async fn load(
        &mut self,
        kind: LoadKind,
        section_id: &SectionId,
        fragment_id: Option<&FragmentId>,
    ) -> Result<LoadOutcome> {
        if self.closed {
            exn::bail!(ErrorKind::Closed);
        }
        let Some(text) = self.text.clone() else {
            exn::bail!(ErrorKind::NoText);
        };
        let section_id = text.resolve_section(section_id).unwrap_or(section_id).clone();

        if self.buffer.contains(&section_id) {
            tracing::debug!(section = %section_id, "Section already mounted");
            if let Some(fragment_id) = fragment_id {
                self.jump_to(fragment_id, None);
                self.update_location();
            }
            return Ok(LoadOutcome::AlreadyMounted(section_id));
        }
        if kind != LoadKind::Text && self.buffer.len() >= self.config.max_sections {
            tracing::debug!(section = %section_id, mounted = self.buffer.len(), "Section cap reached");
            return Ok(LoadOutcome::Capped);
        }

        let Some(content) = self.cache.load_section(&text, &section_id).await.or_raise(|| ErrorKind::Load)? else {
            tracing::debug!(section = %section_id, "Section unavailable");
            return Ok(LoadOutcome::Missing);
        };
        // Whatever arrived may have been mounted in the meantime.
        if self.buffer.contains(&content.section_id) {
            return Ok(LoadOutcome::AlreadyMounted(content.section_id));
        }
        let mounted = content.section_id.clone();
        match kind {
            LoadKind::Text => {
                self.viewport.clear();
                self.viewport.mount(Edge::Bottom, &content);
                self.viewport.set_scroll_offset(0.0);
                self.emit_text_load(&text, &content, fragment_id);
                self.buffer.reset(content);
            },
            LoadKind::Next => {
                if !self.buffer.push_back(content) {
                    tracing::debug!(section = %mounted, "Dropping section that no longer follows the buffer");
                    return Ok(LoadOutcome::Stale(mounted));
                }
                if let Some(last) = self.buffer.last() {
                    self.viewport.mount(Edge::Bottom, last);
                    self.emit_text_load(&text, last, fragment_id);
                }
            },
            LoadKind::Previous => {
                let accepted = match self.buffer.first().map(|s| s.section_id.clone()) {
                    Some(anchor) => self.keeping_position(&anchor, |viewport, buffer| {
                        let accepted = buffer.push_front(content);
                        if accepted && let Some(first) = buffer.first() {
                            viewport.mount(Edge::Top, first);
                        }
                        accepted
                    }),
                    None => false,
                };
                if !accepted {
                    tracing::debug!(section = %mounted, "Dropping section that no longer precedes the buffer");
                    return Ok(LoadOutcome::Stale(mounted));
                }
                if let Some(first) = self.buffer.first() {
                    self.emit_text_load(&text, first, fragment_id);
                }
            },
        }
        tracing::debug!(section = %mounted, ?kind, mounted = self.buffer.len(), "Section mounted");

        if let Some(fragment_id) = fragment_id
            && !self.jump_to(fragment_id, None)
        {
            tracing::debug!(fragment = %fragment_id, "Requested fragment not rendered");
        }
        self.update_location();
        Ok(LoadOutcome::Mounted(mounted))
    }

    /// Scroll so that `fragment_id` sits `offset` below the viewport top.
    ///
    /// Falls back to the top of the fragment's section when the fragment
    /// itself isn't rendered.
    pub fn scroll_to(&mut self, fragment_id: &FragmentId, offset: Option<f64>) -> Result<()> {
        if self.closed {
            exn::bail!(ErrorKind::Closed);
        }
        if !self.jump_to(fragment_id, offset) {
            exn::bail!(ErrorKind::NotMounted(fragment_id.to_string()));
        }
        self.update_location();
        Ok(())
    }

    fn jump_to(&mut self, fragment_id: &FragmentId, offset: Option<f64>) -> bool {
        let target = self
            .viewport
            .fragments()
            .into_iter()
            .find(|f| &f.id == fragment_id)
            .map(|f| f.top)
            .or_else(|| self.viewport.section_top(&fragment_id.section_id()));
        match target {
            Some(top) => {
                self.viewport.set_scroll_offset(top - offset.unwrap_or(0.0));
                true
            },
            None => false,
        }
    }

    /// Apply `change` to the viewport and buffer without moving what the
    /// reader sees, by shifting the scroll offset as much as `anchor` moved.
    fn keeping_position<R>(&mut self, anchor: &SectionId, change: impl FnOnce(&mut V, &mut Buffer) -> R) -> R {
        let scroll_top = self.viewport.visible_top_offset();
        let before = self.viewport.section_top(anchor);
        let result = change(&mut self.viewport, &mut self.buffer);
        if let (Some(before), Some(after)) = (before, self.viewport.section_top(anchor)) {
            self.viewport.set_scroll_offset(scroll_top + (after - before));
        }
        result
    }

    // =========================================================================
    // Host events
    // =========================================================================

    /// Report a raw scroll event.
    pub fn on_scroll(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        let offset = self.viewport.visible_top_offset();
        self.emit(ScrollerEvent::Scroll { offset });
        self.update_location();
        self.timer.on_scroll(now, offset);
    }

    /// Advance the settle timer to `now`.
    ///
    /// Returns the edge evaluation's decision when scrolling settled during
    /// this tick, `None` otherwise. Failed prefetches are logged and leave
    /// the buffer as it was.
    pub async fn tick(&mut self, now: Instant) -> Option<EdgeAction> {
        if self.closed {
            return None;
        }
        let action = match self.timer.sample(now, self.viewport.visible_top_offset()) {
            Some(Sample::Settled) => Some(self.evaluate_edges().await),
            Some(Sample::Moving) | None => None,
        };
        if self.timer.take_broadcast(now) {
            self.broadcast_nav();
        }
        action
    }

    /// The viewport changed size.
    pub fn size(&mut self, width: f64, height: f64) {
        if self.closed {
            return;
        }
        self.viewport.resize(width, height);
        self.update_location();
    }

    /// Release the viewport and the event channel. Terminal.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        tracing::info!(text = ?self.text.as_ref().map(|t| t.id.as_str()), "Closing scroller");
        self.closed = true;
        self.timer.clear();
        self.buffer.clear();
        self.viewport.clear();
        self.location = None;
        self.events = None;
    }

    // =========================================================================
    // Edges
    // =========================================================================

    async fn evaluate_edges(&mut self) -> EdgeAction {
        let action = self.decide_edges();
        tracing::debug!(?action, mounted = self.buffer.len(), "Scroll settled");
        if action == EdgeAction::Nothing {
            return action;
        }
        match &action {
            EdgeAction::Nothing => {},
            EdgeAction::LoadNext(id) => self.prefetch(LoadKind::Next, id).await,
            EdgeAction::LoadPrevious(id) => self.prefetch(LoadKind::Previous, id).await,
            EdgeAction::TrimTop(id) => {
                if let Some(anchor) = self.buffer.get(1).map(|s| s.section_id.clone()) {
                    self.keeping_position(&anchor, |viewport, buffer| {
                        viewport.unmount(id);
                        buffer.pop_front();
                    });
                }
            },
            EdgeAction::TrimBottom(id) => {
                self.viewport.unmount(id);
                self.buffer.pop_back();
            },
        }
        self.update_location();
        action
    }

    async fn prefetch(&mut self, kind: LoadKind, section_id: &SectionId) {
        if let Err(err) = self.load(kind, section_id, None).await {
            tracing::warn!(section = %section_id, ?kind, error = ?err, "Prefetch failed");
        }
    }

    /// Checked in order, first match wins: grow at the bottom, grow at the
    /// top, trim the top, trim the bottom.
    fn decide_edges(&self) -> EdgeAction {
        let (Some(first), Some(last)) = (self.buffer.first(), self.buffer.last()) else {
            return EdgeAction::Nothing;
        };
        let height = self.viewport.height();
        if height <= 0.0 {
            return EdgeAction::Nothing;
        }
        let scroll_top = self.viewport.visible_top_offset();
        let above = scroll_top;
        let below = self.viewport.content_height() - (scroll_top + height);
        let prefetch = height * self.config.prefetch_viewports;
        let evict = height * self.config.evict_viewports;
        let has_room = self.buffer.len() < self.config.max_sections;

        if has_room
            && below < prefetch
            && let Some(next) = &last.next
        {
            return EdgeAction::LoadNext(next.clone());
        }
        if has_room
            && above < prefetch
            && let Some(previous) = &first.previous
        {
            return EdgeAction::LoadPrevious(previous.clone());
        }
        let sections = self.viewport.sections();
        let layout = |id: &SectionId| sections.iter().find(|s| &s.id == id);
        if above > evict
            && self.buffer.len() > 1
            && layout(&first.section_id).is_some_and(|s| s.bottom() <= scroll_top)
        {
            return EdgeAction::TrimTop(first.section_id.clone());
        }
        if below > evict
            && self.buffer.len() > self.config.min_sections_for_bottom_evict
            && layout(&last.section_id).is_some_and(|s| s.top >= scroll_top + height)
        {
            return EdgeAction::TrimBottom(last.section_id.clone());
        }
        EdgeAction::Nothing
    }

    // =========================================================================
    // Location & events
    // =========================================================================

    /// Where the reader is right now.
    pub fn location_info(&self) -> Option<LocationInfo> {
        if self.closed {
            return None;
        }
        let text = self.text.as_ref()?;
        let focus = focus::detect(
            self.viewport.visible_top_offset(),
            self.config.focus_epsilon,
            &self.viewport.fragments(),
            &self.viewport.sections(),
        )?;
        Some(LocationInfo {
            label: self.labels.label(text, &focus.fragment_id),
            label_long: self.labels.label_long(text, &focus.fragment_id),
            fragment_id: focus.fragment_id,
            section_id: focus.section_id,
            offset: focus.offset,
            text_id: text.id.clone(),
        })
    }

    fn update_location(&mut self) {
        let Some(location) = self.location_info() else {
            return;
        };
        let changed = self.location.as_ref().is_none_or(|old| old.fragment_id != location.fragment_id);
        if changed {
            tracing::debug!(fragment = %location.fragment_id, "Location changed");
            self.emit(ScrollerEvent::LocationChange(location.clone()));
        }
        self.location = Some(location);
    }

    fn broadcast_nav(&self) {
        let (Some(text), Some(location)) = (&self.text, self.location_info()) else {
            return;
        };
        self.emit(ScrollerEvent::GlobalMessage(GlobalMessage::Nav {
            text_type: text.text_type,
            location_info: location,
        }));
    }

    fn emit_text_load(&self, text: &TextDescriptor, content: &SectionContent, fragment_id: Option<&FragmentId>) {
        self.emit(ScrollerEvent::GlobalMessage(GlobalMessage::TextLoad {
            text_type: text.text_type,
            text_id: text.id.clone(),
            abbr: text.abbr.clone(),
            section_id: content.section_id.clone(),
            fragment_id: fragment_id.cloned(),
            content: content.html.clone(),
        }));
    }

    fn emit(&self, event: ScrollerEvent) {
        if let Some(events) = &self.events
            && events.send(event).is_err()
        {
            tracing::debug!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::StackViewport;
    use lectern_provider::provider::MockProvider;
    use std::time::Duration;

    const FRAGMENTS: usize = 10;

    struct Harness {
        scroller: VirtualizedScroller<StackViewport>,
        events: UnboundedReceiver<ScrollerEvent>,
        provider: Arc<MockProvider>,
    }

    impl Harness {
        async fn new(sections: usize, viewport: StackViewport) -> Self {
            Self::with(sections, viewport, ScrollerConfig::default(), |p| p).await
        }

        async fn with(
            sections: usize,
            viewport: StackViewport,
            config: ScrollerConfig,
            customise: impl FnOnce(MockProvider) -> MockProvider,
        ) -> Self {
            let ids: Vec<String> = (1..=sections).map(|n| format!("GN{n}")).collect();
            let descriptor = TextDescriptor::new("eng_kjv", "mock").with_sections(ids);
            let provider = Arc::new(customise(MockProvider::default().with_linked_text(descriptor, FRAGMENTS)));
            let cache = ContentCache::new("mock");
            cache.register_provider("mock", provider.clone());
            let cache = Arc::new(cache);
            let text = cache.get_text_info("eng_kjv").await.unwrap();

            let (mut scroller, events) = VirtualizedScroller::new(cache, viewport, config);
            scroller.set_text_info(text).unwrap();
            Self { scroller, events, provider }
        }

        fn drain(&mut self) -> Vec<ScrollerEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        /// Scroll to `offset`, report it and let it settle.
        async fn settle_at(&mut self, offset: f64, now: Instant) -> Option<EdgeAction> {
            self.scroller.viewport_mut().set_scroll_offset(offset);
            self.scroller.on_scroll(now);
            self.scroller.tick(now + Duration::from_millis(100)).await
        }

        fn mounted(&self) -> Vec<String> {
            self.scroller.mounted_sections().iter().map(ToString::to_string).collect()
        }
    }

    fn viewport() -> StackViewport {
        StackViewport::new(320.0, 100.0, 20.0)
    }

    fn id(s: &str) -> SectionId {
        SectionId::new(s)
    }

    fn fragment(s: &str) -> FragmentId {
        FragmentId::new(s)
    }

    fn location_changes(events: &[ScrollerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ScrollerEvent::LocationChange(location) => Some(location.fragment_id.to_string()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_load_without_text_fails() {
        let cache = Arc::new(ContentCache::new("mock"));
        let (mut scroller, _events) = VirtualizedScroller::new(cache, viewport(), ScrollerConfig::default());
        assert_eq!(scroller.state(), ScrollerState::Uninitialized);

        let err = scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoText));
    }

    #[tokio::test]
    async fn test_text_load_mounts_and_focuses_fragment() {
        let mut h = Harness::new(3, viewport()).await;
        assert_eq!(h.scroller.state(), ScrollerState::Idle);

        let outcome = h.scroller.load(LoadKind::Text, &id("GN2"), Some(&fragment("GN2_5"))).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Mounted(id("GN2")));
        assert_eq!(h.mounted(), vec!["GN2"]);
        assert_eq!(h.scroller.viewport().visible_top_offset(), 80.0);
        assert_eq!(h.scroller.state(), ScrollerState::Settled);

        let events = h.drain();
        assert!(matches!(
            &events[0],
            ScrollerEvent::GlobalMessage(GlobalMessage::TextLoad { section_id, fragment_id: Some(f), .. })
                if section_id.as_str() == "GN2" && f.as_str() == "GN2_5"
        ));
        assert_eq!(location_changes(&events), vec!["GN2_5"]);

        let location = h.scroller.location_info().unwrap();
        assert_eq!(location.section_id, id("GN2"));
        assert_eq!(location.text_id, "eng_kjv");
        assert_eq!(location.offset, 0.0);
    }

    #[tokio::test]
    async fn test_loading_mounted_section_is_a_no_op() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN2"), None).await.unwrap();
        h.scroller.load(LoadKind::Next, &id("GN3"), None).await.unwrap();

        let again = h.scroller.load(LoadKind::Next, &id("GN3"), None).await.unwrap();
        let text = h.scroller.load(LoadKind::Text, &id("GN2"), Some(&fragment("GN2_2"))).await.unwrap();

        assert_eq!(again, LoadOutcome::AlreadyMounted(id("GN3")));
        assert_eq!(text, LoadOutcome::AlreadyMounted(id("GN2")));
        assert_eq!(h.mounted(), vec!["GN2", "GN3"]);
        assert_eq!(h.provider.load_section_calls(), 2);
        assert_eq!(h.scroller.viewport().visible_top_offset(), 20.0);
    }

    #[tokio::test]
    async fn test_buffer_stays_contiguous() {
        let mut h = Harness::new(5, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN3"), None).await.unwrap();
        h.scroller.load(LoadKind::Next, &id("GN4"), None).await.unwrap();
        h.scroller.load(LoadKind::Previous, &id("GN2"), None).await.unwrap();

        let skipped = h.scroller.load(LoadKind::Next, &id("GN1"), None).await.unwrap();
        let wrong_edge = h.scroller.load(LoadKind::Previous, &id("GN5"), None).await.unwrap();

        assert_eq!(skipped, LoadOutcome::Stale(id("GN1")));
        assert_eq!(wrong_edge, LoadOutcome::Stale(id("GN5")));
        assert_eq!(h.mounted(), vec!["GN2", "GN3", "GN4"]);
        assert_eq!(h.scroller.viewport().mounted(), h.scroller.mounted_sections());
    }

    #[tokio::test]
    async fn test_prepend_keeps_reader_in_place() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN2"), Some(&fragment("GN2_3"))).await.unwrap();
        let before = h.scroller.location_info().unwrap();
        h.drain();

        h.scroller.load(LoadKind::Previous, &id("GN1"), None).await.unwrap();

        let after = h.scroller.location_info().unwrap();
        assert_eq!(h.scroller.viewport().visible_top_offset(), 240.0);
        assert_eq!(after.fragment_id, before.fragment_id);
        assert_eq!(after.offset, before.offset);
        assert!(location_changes(&h.drain()).is_empty());
    }

    #[tokio::test]
    async fn test_padded_section_id_resolves() {
        let mut h = Harness::new(3, viewport()).await;
        let outcome = h.scroller.load(LoadKind::Text, &id("GN02"), None).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Mounted(id("GN2")));
    }

    #[tokio::test]
    async fn test_missing_section_leaves_buffer_alone() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();

        let outcome = h.scroller.load(LoadKind::Text, &id("EX1"), None).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Missing);
        assert_eq!(h.mounted(), vec!["GN1"]);
    }

    #[tokio::test]
    async fn test_failed_text_load_surfaces_error() {
        let mut h = Harness::with(3, viewport(), ScrollerConfig::default(), |p| p.failing_section("GN3")).await;
        h.scroller.load(LoadKind::Text, &id("GN2"), None).await.unwrap();

        let err = h.scroller.load(LoadKind::Text, &id("GN3"), None).await.unwrap_err();

        assert!(matches!(&*err, ErrorKind::Load));
        assert!(err.is_retryable());
        assert_eq!(h.mounted(), vec!["GN2"]);
    }

    #[tokio::test]
    async fn test_failed_prefetch_is_swallowed() {
        let mut h = Harness::with(3, viewport(), ScrollerConfig::default(), |p| p.failing_section("GN3")).await;
        h.scroller.load(LoadKind::Text, &id("GN2"), None).await.unwrap();

        let action = h.settle_at(0.0, Instant::now()).await;

        assert_eq!(action, Some(EdgeAction::LoadNext(id("GN3"))));
        assert_eq!(h.mounted(), vec!["GN2"]);
    }

    #[tokio::test]
    async fn test_edges_evaluated_once_per_settle() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN2"), None).await.unwrap();
        let start = Instant::now();
        let at = |ms| start + Duration::from_millis(ms);

        h.scroller.viewport_mut().scroll_by(10.0);
        h.scroller.on_scroll(at(0));
        assert_eq!(h.scroller.state(), ScrollerState::Measuring);
        assert_eq!(h.scroller.tick(at(50)).await, None);

        h.scroller.viewport_mut().scroll_by(10.0);
        h.scroller.on_scroll(at(60));
        assert_eq!(h.scroller.tick(at(100)).await, None);
        assert_eq!(h.mounted(), vec!["GN2"]);

        assert_eq!(h.scroller.tick(at(200)).await, Some(EdgeAction::LoadNext(id("GN3"))));
        assert_eq!(h.scroller.tick(at(300)).await, None);
        assert_eq!(h.scroller.state(), ScrollerState::Settled);
        assert_eq!(h.mounted(), vec!["GN2", "GN3"]);
    }

    #[tokio::test]
    async fn test_next_is_preferred_over_previous() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN2"), None).await.unwrap();
        let now = Instant::now();

        assert_eq!(h.settle_at(0.0, now).await, Some(EdgeAction::LoadNext(id("GN3"))));
        assert_eq!(h.settle_at(0.0, now).await, Some(EdgeAction::LoadPrevious(id("GN1"))));
        assert_eq!(h.mounted(), vec!["GN1", "GN2", "GN3"]);
        // The prepend pushed the reader down by one section.
        assert_eq!(h.scroller.viewport().visible_top_offset(), 200.0);
    }

    #[tokio::test]
    async fn test_location_change_only_on_new_fragment() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();
        h.drain();
        let now = Instant::now();

        for offset in [1.0, 11.0, 16.0, 19.0, 41.0] {
            h.scroller.viewport_mut().set_scroll_offset(offset);
            h.scroller.on_scroll(now);
        }

        let events = h.drain();
        let scrolls = events.iter().filter(|e| matches!(e, ScrollerEvent::Scroll { .. })).count();
        assert_eq!(scrolls, 5);
        assert_eq!(location_changes(&events), vec!["GN1_2", "GN1_3"]);
    }

    #[tokio::test]
    async fn test_nav_broadcast_once_per_settle_cycle() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();
        h.drain();
        let start = Instant::now();

        // A fling well past the broadcast delay, then a second short cycle.
        let mut settles = 0;
        for ms in (0..5000).step_by(50) {
            let now = start + Duration::from_millis(ms);
            if ms < 3000 || (3600..3700).contains(&ms) {
                h.scroller.viewport_mut().scroll_by(1.0);
                h.scroller.on_scroll(now);
            }
            settles += usize::from(h.scroller.tick(now).await.is_some());
        }

        let navs: Vec<_> = h
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                ScrollerEvent::GlobalMessage(GlobalMessage::Nav { location_info, .. }) => Some(location_info),
                _ => None,
            })
            .collect();
        assert_eq!(settles, 2);
        assert_eq!(navs.len(), 2);
        assert_eq!(navs[0].text_id, "eng_kjv");
    }

    #[tokio::test]
    async fn test_top_trim_keeps_reader_in_place() {
        // GN2 is twenty viewports tall.
        let mut h = Harness::new(3, viewport().with_row_height("GN2", 200.0)).await;
        h.scroller.load(LoadKind::Text, &id("GN2"), Some(&fragment("GN2_5"))).await.unwrap();
        assert_eq!(h.scroller.location_info().unwrap().fragment_id, fragment("GN2_5"));
        let now = Instant::now();

        assert_eq!(h.settle_at(1850.0, now).await, Some(EdgeAction::LoadNext(id("GN3"))));
        assert_eq!(h.mounted(), vec!["GN2", "GN3"]);

        assert_eq!(h.settle_at(2040.0, now).await, Some(EdgeAction::TrimTop(id("GN2"))));
        assert_eq!(h.mounted(), vec!["GN3"]);
        assert_eq!(h.scroller.viewport().visible_top_offset(), 40.0);
        let location = h.scroller.location_info().unwrap();
        assert_eq!(location.fragment_id, fragment("GN3_3"));
        assert_eq!(location.offset, 0.0);
    }

    #[tokio::test]
    async fn test_visible_section_is_never_trimmed() {
        let mut h = Harness::new(3, viewport().with_row_height("GN1", 200.0)).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();
        h.scroller.load(LoadKind::Next, &id("GN2"), None).await.unwrap();

        // Far from the buffer top, but GN1 still fills the view.
        assert_eq!(h.settle_at(1850.0, Instant::now()).await, Some(EdgeAction::Nothing));
        assert_eq!(h.mounted(), vec!["GN1", "GN2"]);
    }

    #[tokio::test]
    async fn test_bottom_trim_keeps_minimum() {
        let mut h = Harness::new(10, StackViewport::new(320.0, 10.0, 20.0)).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();
        for n in 2..=10 {
            h.scroller.load(LoadKind::Next, &id(&format!("GN{n}")), None).await.unwrap();
        }
        assert_eq!(h.mounted().len(), 10);

        let now = Instant::now();
        let mut trims = 0;
        while let Some(EdgeAction::TrimBottom(_)) = h.settle_at(0.0, now).await {
            trims += 1;
        }

        assert_eq!(trims, 6);
        assert_eq!(h.mounted(), vec!["GN1", "GN2", "GN3", "GN4"]);
    }

    #[tokio::test]
    async fn test_section_cap() {
        let mut h = Harness::new(60, StackViewport::new(320.0, 10.0, 1.0)).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();
        for n in 2..=50 {
            let outcome = h.scroller.load(LoadKind::Next, &id(&format!("GN{n}")), None).await.unwrap();
            assert_eq!(outcome, LoadOutcome::Mounted(id(&format!("GN{n}"))));
        }

        let capped = h.scroller.load(LoadKind::Next, &id("GN51"), None).await.unwrap();
        assert_eq!(capped, LoadOutcome::Capped);

        // At the cap the bottom can't grow, so the far top is trimmed instead.
        let bottom = h.scroller.viewport().content_height() - 10.0;
        assert_eq!(h.settle_at(bottom, Instant::now()).await, Some(EdgeAction::TrimTop(id("GN1"))));
        assert_eq!(h.mounted().len(), 49);
    }

    #[tokio::test]
    async fn test_scroll_to() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN2"), None).await.unwrap();

        h.scroller.scroll_to(&fragment("GN2_5"), Some(20.0)).unwrap();
        assert_eq!(h.scroller.viewport().visible_top_offset(), 60.0);

        let err = h.scroller.scroll_to(&fragment("GN3_1"), None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotMounted(f) if f == "GN3_1"));
    }

    #[tokio::test]
    async fn test_size_refreshes_location() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();
        h.scroller.size(640.0, 300.0);

        assert_eq!(h.scroller.viewport().height(), 300.0);
        assert_eq!(h.scroller.location_info().unwrap().fragment_id, fragment("GN1_1"));
    }

    #[tokio::test]
    async fn test_text_switch_clears_buffer() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();

        let other = TextDescriptor::new("other", "mock").with_sections(["A1"]);
        h.scroller.set_text_info(other).unwrap();

        assert!(h.mounted().is_empty());
        assert!(h.scroller.viewport().mounted().is_empty());
        assert_eq!(h.scroller.state(), ScrollerState::Idle);
        assert_eq!(h.scroller.location_info(), None);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let mut h = Harness::new(3, viewport()).await;
        h.scroller.load(LoadKind::Text, &id("GN1"), None).await.unwrap();
        h.scroller.on_scroll(Instant::now());
        h.scroller.close();
        h.drain();

        assert_eq!(h.scroller.state(), ScrollerState::Closed);
        assert!(!h.scroller.needs_tick());
        assert_eq!(h.scroller.tick(Instant::now() + Duration::from_secs(5)).await, None);
        let err = h.scroller.load(LoadKind::Next, &id("GN2"), None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Closed));
        assert!(h.scroller.set_text_info(TextDescriptor::new("x", "mock")).is_err());
        assert!(h.events.recv().await.is_none());
    }
}
