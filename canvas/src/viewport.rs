//! Viewport transform: pan offset + zoom scale, and the controller that owns
//! the live/committed split used during wheel bursts.
//!
//! The renderer reads [`ViewportController::live`] every frame. Wheel events
//! only write the live value and arm an idle deadline; [`ViewportController::tick`]
//! copies live into committed once the burst has been idle for
//! [`WHEEL_IDLE_MS`](crate::consts::WHEEL_IDLE_MS). Every other mutation
//! commits immediately, so the two values only diverge inside a wheel burst.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_SCALE, MIN_SCALE, WHEEL_IDLE_MS, WHEEL_ZOOM_STEP};
use crate::geom::{Point, Rect};

/// Clamp a zoom scale into `[MIN_SCALE, MAX_SCALE]`. NaN maps to `MIN_SCALE`.
#[must_use]
pub fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        return MIN_SCALE;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// Pan/zoom transform for the infinite canvas.
///
/// `offset_x` / `offset_y` are screen pixels; `scale` is screen pixels per
/// canvas unit. `screen = canvas * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { offset_x: 0.0, offset_y: 0.0, scale: 1.0 }
    }
}

impl Viewport {
    #[must_use]
    pub fn new(offset_x: f64, offset_y: f64, scale: f64) -> Self {
        Self { offset_x, offset_y, scale: clamp_scale(scale) }
    }

    /// Convert a screen-space point to canvas coordinates.
    #[must_use]
    pub fn to_canvas(&self, screen: Point) -> Point {
        Point { x: (screen.x - self.offset_x) / self.scale, y: (screen.y - self.offset_y) / self.scale }
    }

    /// Convert a canvas-space point to screen coordinates.
    #[must_use]
    pub fn to_screen(&self, canvas: Point) -> Point {
        Point { x: canvas.x * self.scale + self.offset_x, y: canvas.y * self.scale + self.offset_y }
    }

    /// Project a canvas-space box into screen space.
    #[must_use]
    pub fn rect_to_screen(&self, rect: &Rect) -> Rect {
        let min = self.to_screen(Point::new(rect.x, rect.y));
        Rect { x: min.x, y: min.y, width: rect.width * self.scale, height: rect.height * self.scale }
    }

    /// The canvas-space region covered by a `width` × `height` screen.
    #[must_use]
    pub fn visible_rect(&self, width: f64, height: f64) -> Rect {
        let min = self.to_canvas(Point::new(0.0, 0.0));
        Rect { x: min.x, y: min.y, width: width / self.scale, height: height / self.scale }
    }

    /// Translate by a screen-space delta. The canvas is unbounded.
    pub fn pan(&mut self, delta: Point) {
        self.offset_x += delta.x;
        self.offset_y += delta.y;
    }

    /// Multiply the scale by `factor`, keeping the canvas point under `screen` fixed.
    ///
    /// Non-positive or non-finite factors are ignored.
    pub fn zoom_at_point(&mut self, screen: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.to_canvas(screen);
        let scale = clamp_scale(self.scale * factor);
        self.scale = scale;
        self.offset_x = screen.x - anchor.x * scale;
        self.offset_y = screen.y - anchor.y * scale;
    }

    /// A viewport at `scale` that puts `canvas` at the centre of a `width` × `height` screen.
    #[must_use]
    pub fn centered_on(canvas: Point, width: f64, height: f64, scale: f64) -> Self {
        let scale = clamp_scale(scale);
        Self { offset_x: width * 0.5 - canvas.x * scale, offset_y: height * 0.5 - canvas.y * scale, scale }
    }

    fn lerp(&self, to: &Viewport, t: f64) -> Viewport {
        Viewport {
            offset_x: self.offset_x + (to.offset_x - self.offset_x) * t,
            offset_y: self.offset_y + (to.offset_y - self.offset_y) * t,
            scale: self.scale + (to.scale - self.scale) * t,
        }
    }
}

/// An in-flight animated view transition.
#[derive(Debug, Clone, Copy)]
pub struct ViewAnimation {
    pub from: Viewport,
    pub to: Viewport,
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl ViewAnimation {
    /// Sample the transition at `now_ms`. Returns the viewport and whether it has finished.
    #[must_use]
    pub fn sample(&self, now_ms: f64) -> (Viewport, bool) {
        if self.duration_ms <= 0.0 {
            return (self.to, true);
        }
        let t = ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0);
        if t >= 1.0 {
            return (self.to, true);
        }
        // Ease-out cubic.
        let eased = 1.0 - (1.0 - t).powi(3);
        (self.from.lerp(&self.to, eased), false)
    }
}

/// Result of advancing the controller's timers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportTick {
    /// The live transform moved and the scene should be redrawn.
    pub redraw: bool,
    /// The committed transform settled at this value during the tick.
    pub committed: Option<Viewport>,
}

/// Owns the committed and live transforms plus the screen size.
#[derive(Debug, Clone)]
pub struct ViewportController {
    committed: Viewport,
    live: Viewport,
    idle_deadline_ms: Option<f64>,
    animation: Option<ViewAnimation>,
    width: f64,
    height: f64,
    wheel_step: f64,
    wheel_idle_ms: f64,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(WHEEL_ZOOM_STEP, WHEEL_IDLE_MS)
    }
}

impl ViewportController {
    #[must_use]
    pub fn new(wheel_step: f64, wheel_idle_ms: f64) -> Self {
        Self {
            committed: Viewport::default(),
            live: Viewport::default(),
            idle_deadline_ms: None,
            animation: None,
            width: 0.0,
            height: 0.0,
            wheel_step,
            wheel_idle_ms,
        }
    }

    // --- Queries ---

    /// The observable, reconciled transform.
    #[must_use]
    pub fn committed(&self) -> Viewport {
        self.committed
    }

    /// The transform the renderer draws with this frame.
    #[must_use]
    pub fn live(&self) -> Viewport {
        self.live
    }

    /// Screen size in CSS pixels.
    #[must_use]
    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn screen_center(&self) -> Point {
        Point::new(self.width * 0.5, self.height * 0.5)
    }

    /// True when no wheel burst is pending reconciliation.
    #[must_use]
    pub fn is_reconciled(&self) -> bool {
        self.idle_deadline_ms.is_none() && self.live == self.committed
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Screen → canvas using the live transform.
    #[must_use]
    pub fn to_canvas(&self, screen: Point) -> Point {
        self.live.to_canvas(screen)
    }

    /// Canvas → screen using the live transform.
    #[must_use]
    pub fn to_screen(&self, canvas: Point) -> Point {
        self.live.to_screen(canvas)
    }

    // --- Mutations ---

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    /// Replace both transforms, dropping any pending burst or animation.
    pub fn restore(&mut self, viewport: Viewport) {
        let viewport = Viewport::new(viewport.offset_x, viewport.offset_y, viewport.scale);
        self.committed = viewport;
        self.live = viewport;
        self.idle_deadline_ms = None;
        self.animation = None;
    }

    /// Pan by a screen-space delta and commit.
    pub fn pan(&mut self, delta: Point) {
        self.animation = None;
        self.live.pan(delta);
        self.commit_live();
    }

    /// Zoom around `screen` by `factor` and commit.
    pub fn zoom_at_point(&mut self, screen: Point, factor: f64) {
        self.animation = None;
        self.live.zoom_at_point(screen, factor);
        self.commit_live();
    }

    /// Apply one wheel step to the live transform only and re-arm the idle deadline.
    ///
    /// Negative `delta_y` zooms in. Returns false when the event was ignored.
    pub fn wheel(&mut self, screen: Point, delta_y: f64, now_ms: f64) -> bool {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return false;
        }
        self.animation = None;
        let factor = if delta_y < 0.0 { self.wheel_step } else { 1.0 / self.wheel_step };
        self.live.zoom_at_point(screen, factor);
        self.idle_deadline_ms = Some(now_ms + self.wheel_idle_ms);
        true
    }

    /// Start an animated transition from the current live transform to `target`.
    pub fn animate_to(&mut self, target: Viewport, now_ms: f64, duration_ms: f64) {
        self.commit_live();
        let to = Viewport::new(target.offset_x, target.offset_y, target.scale);
        self.animation = Some(ViewAnimation { from: self.live, to, start_ms: now_ms, duration_ms });
    }

    pub fn cancel_animation(&mut self) {
        self.animation = None;
    }

    /// Advance the animation and the wheel idle timer.
    pub fn tick(&mut self, now_ms: f64) -> ViewportTick {
        let mut out = ViewportTick::default();
        if let Some(animation) = self.animation {
            let (viewport, done) = animation.sample(now_ms);
            self.live = viewport;
            self.committed = viewport;
            out.redraw = true;
            if done {
                self.animation = None;
                out.committed = Some(viewport);
            }
        }
        if let Some(deadline) = self.idle_deadline_ms
            && now_ms >= deadline
        {
            self.idle_deadline_ms = None;
            self.committed = self.live;
            out.committed = Some(self.committed);
        }
        out
    }

    fn commit_live(&mut self) {
        self.idle_deadline_ms = None;
        self.committed = self.live;
    }
}
