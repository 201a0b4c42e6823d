//! Touchless pinch-to-draw input.
//!
//! A hand tracker pushes landmark frames one at a time. The recognizer
//! turns them into a mirrored screen cursor plus draw-start / draw-end
//! events whenever the index/thumb pinch crosses the threshold.

use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Pinch threshold as a fraction of hand scale.
pub const PINCH_THRESHOLD: f64 = 0.18;

/// Landmark indices in the 21-point hand model.
pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;

/// The three landmarks the recognizer needs, in normalized [0, 1] space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandPose {
    pub index_tip: Point,
    pub thumb_tip: Point,
    pub wrist: Point,
}

impl HandPose {
    /// Pick the needed points out of a full landmark list.
    pub fn from_landmarks(landmarks: &[Point]) -> Option<Self> {
        Some(Self {
            index_tip: *landmarks.get(INDEX_TIP)?,
            thumb_tip: *landmarks.get(THUMB_TIP)?,
            wrist: *landmarks.get(WRIST)?,
        })
    }

    /// Pinch distance divided by hand scale. `None` for a zero-size hand.
    pub fn pinch_ratio(&self) -> Option<f64> {
        let pinch = self.index_tip.distance(self.thumb_tip);
        let scale = self.index_tip.distance(self.wrist);
        (scale > f64::EPSILON).then(|| pinch / scale)
    }
}

/// One frame from the tracking provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LandmarkFrame {
    NoHand,
    Hand(HandPose),
}

/// Events emitted by the recognizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Cursor position in screen pixels.
    CursorMove(Point),
    DrawStart,
    DrawEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Pinching,
}

/// Recognizer tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Ratio below which a pinch starts.
    pub threshold: f64,
    /// Ratio at or above which a pinch ends. `None` reuses `threshold`.
    pub release_threshold: Option<f64>,
    /// Screen the cursor is scaled to.
    pub screen_size: Size,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            threshold: PINCH_THRESHOLD,
            release_threshold: None,
            screen_size: Size::new(1280.0, 800.0),
        }
    }
}

/// Receiver of gesture events.
pub trait GestureListener {
    fn on_cursor_move(&mut self, position: Point);
    fn on_draw_start(&mut self);
    fn on_draw_end(&mut self);
}

/// Shared cell holding the current listener.
///
/// Cloning shares the cell, so whoever holds a clone can swap the
/// listener and the very next frame is dispatched to the new one. This
/// includes the listener itself, from inside one of its callbacks.
#[derive(Clone, Default)]
pub struct ListenerSlot(Rc<RefCell<SlotState>>);

#[derive(Default)]
struct SlotState {
    listener: Option<Box<dyn GestureListener>>,
    /// Bumped on every `set` / `clear`.
    version: u64,
}

impl ListenerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, listener: impl GestureListener + 'static) {
        self.replace(Some(Box::new(listener)));
    }

    pub fn clear(&self) {
        self.replace(None);
    }

    pub fn is_set(&self) -> bool {
        self.0.borrow().listener.is_some()
    }

    fn replace(&self, listener: Option<Box<dyn GestureListener>>) {
        let mut state = self.0.borrow_mut();
        state.listener = listener;
        state.version += 1;
    }

    /// The listener runs outside the borrow. It is put back afterwards
    /// unless the slot was set or cleared during the call.
    fn dispatch(&self, event: GestureEvent) {
        let (taken, version) = {
            let mut state = self.0.borrow_mut();
            (state.listener.take(), state.version)
        };
        let Some(mut listener) = taken else {
            return;
        };
        match event {
            GestureEvent::CursorMove(p) => listener.on_cursor_move(p),
            GestureEvent::DrawStart => listener.on_draw_start(),
            GestureEvent::DrawEnd => listener.on_draw_end(),
        }
        let mut state = self.0.borrow_mut();
        if state.version == version {
            state.listener = Some(listener);
        }
    }
}

impl std::fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ListenerSlot").field(&self.is_set()).finish()
    }
}

/// Listener that buffers events for a consumer that cannot live in the slot.
#[derive(Debug, Clone, Default)]
pub struct EventQueue(Rc<RefCell<VecDeque<GestureEvent>>>);

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every buffered event in arrival order.
    pub fn drain(&self) -> Vec<GestureEvent> {
        self.0.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl GestureListener for EventQueue {
    fn on_cursor_move(&mut self, position: Point) {
        self.0.borrow_mut().push_back(GestureEvent::CursorMove(position));
    }

    fn on_draw_start(&mut self) {
        self.0.borrow_mut().push_back(GestureEvent::DrawStart);
    }

    fn on_draw_end(&mut self) {
        self.0.borrow_mut().push_back(GestureEvent::DrawEnd);
    }
}

/// Pinch state machine.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    config: GestureConfig,
    state: GestureState,
    last_ratio: Option<f64>,
    listener: ListenerSlot,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
            last_ratio: None,
            listener: ListenerSlot::new(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_pinching(&self) -> bool {
        self.state == GestureState::Pinching
    }

    /// Most recent pinch ratio seen (for on-screen feedback).
    pub fn last_ratio(&self) -> Option<f64> {
        self.last_ratio
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn set_screen_size(&mut self, size: Size) {
        self.config.screen_size = size;
    }

    /// A handle on the listener cell.
    pub fn listener_slot(&self) -> ListenerSlot {
        self.listener.clone()
    }

    /// Mirrored, screen-scaled cursor for a pose.
    pub fn cursor_position(&self, pose: &HandPose) -> Point {
        let screen = self.config.screen_size;
        Point::new(
            (1.0 - pose.index_tip.x) * screen.width,
            pose.index_tip.y * screen.height,
        )
    }

    /// Process one frame. Returns the events it dispatched, in order.
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> Vec<GestureEvent> {
        let LandmarkFrame::Hand(pose) = frame else {
            return Vec::new();
        };

        let mut events = vec![GestureEvent::CursorMove(self.cursor_position(pose))];

        let ratio = pose.pinch_ratio();
        self.last_ratio = ratio;
        let pinching = match (self.state, ratio) {
            (_, None) => false,
            (GestureState::Idle, Some(r)) => r < self.config.threshold,
            (GestureState::Pinching, Some(r)) => {
                r < self.config.release_threshold.unwrap_or(self.config.threshold)
            }
        };

        match (self.state, pinching) {
            (GestureState::Idle, true) => {
                self.state = GestureState::Pinching;
                events.push(GestureEvent::DrawStart);
            }
            (GestureState::Pinching, false) => {
                self.state = GestureState::Idle;
                events.push(GestureEvent::DrawEnd);
            }
            _ => {}
        }

        for event in &events {
            self.listener.dispatch(*event);
        }
        events
    }

    /// Drop back to idle without emitting `DrawEnd`.
    pub fn reset(&mut self) -> bool {
        let was_pinching = self.is_pinching();
        self.state = GestureState::Idle;
        self.last_ratio = None;
        was_pinching
    }
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

/// A push source of landmark frames.
pub trait LandmarkSource {
    /// Next frame, if one has arrived.
    fn next_frame(&mut self) -> Option<LandmarkFrame>;

    /// Stop producing frames and release the device.
    fn close(&mut self) {}
}

/// Replays a recorded frame sequence.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: VecDeque<LandmarkFrame>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = LandmarkFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Load a JSON array of frames.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let frames: Vec<LandmarkFrame> = serde_json::from_str(json)?;
        Ok(Self::new(frames))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for ReplaySource {
    fn next_frame(&mut self) -> Option<LandmarkFrame> {
        self.frames.pop_front()
    }

    fn close(&mut self) {
        self.frames.clear();
    }
}

/// Couples a frame source with a recognizer.
#[derive(Debug)]
pub struct GestureSession<S: LandmarkSource> {
    source: Option<S>,
    recognizer: GestureRecognizer,
}

impl<S: LandmarkSource> GestureSession<S> {
    pub fn new(source: S, recognizer: GestureRecognizer) -> Self {
        Self {
            source: Some(source),
            recognizer,
        }
    }

    pub fn recognizer(&self) -> &GestureRecognizer {
        &self.recognizer
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Process the next pending frame. `None` when closed or drained.
    pub fn step(&mut self) -> Option<Vec<GestureEvent>> {
        let frame = self.source.as_mut()?.next_frame()?;
        Some(self.recognizer.process_frame(&frame))
    }

    /// Process every pending frame in arrival order. Returns the frame count.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while self.step().is_some() {
            processed += 1;
        }
        processed
    }

    /// Tear down the source. Returns whether a draw was in flight; it is
    /// abandoned, not ended.
    pub fn close(&mut self) -> bool {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        let abandoned = self.recognizer.reset();
        if abandoned {
            log::info!("gesture input closed mid-stroke; stroke abandoned");
        }
        abandoned
    }
}
