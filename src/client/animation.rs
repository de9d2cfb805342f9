//! Animation capability and a reusable effect sampler.
//!
//! [`Animatable`] is all the apply engine knows about animation. Widgets that
//! want the built-in effects can embed an [`AnimationState`], start it from
//! [`Animatable::animate`] and sample it when they draw.

use web_time::{Duration, Instant};

use crate::network::messages::AnimationKind;

/// Accepts animation triggers.
pub trait Animatable {
    /// Starts `kind`, running for `duration`. Replaces any running effect.
    fn animate(&mut self, kind: AnimationKind, duration: Duration);
}

/// Visual adjustment to apply to a widget at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSample {
    /// Opacity multiplier in `[0, 1]`.
    pub opacity: f32,
    /// Horizontal displacement in pixels.
    pub offset_x: i16,
    /// Vertical displacement in pixels.
    pub offset_y: i16,
    /// Scale multiplier.
    pub scale: f32,
    /// Amount to add to the widget's hue.
    pub hue_shift: u16,
}

impl AnimationSample {
    /// The sample of a widget with no effect running.
    pub const IDENTITY: Self = Self {
        opacity: 1.0,
        offset_x: 0,
        offset_y: 0,
        scale: 1.0,
        hue_shift: 0,
    };
}

impl Default for AnimationSample {
    fn default() -> Self {
        Self::IDENTITY
    }
}

const SHAKE_AMPLITUDE: f32 = 4.0;
const BOUNCE_HEIGHT: f32 = 8.0;
const PULSE_DEPTH: f32 = 0.1;
const SCALE_PEAK: f32 = 0.25;
const FLASH_TOGGLES: f32 = 6.0;
const COLOR_PULSE_SPAN: f32 = 32.0;

#[inline]
fn ease_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// The running effect of one widget, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationState {
    active: Option<(AnimationKind, Instant, Duration)>,
}

impl AnimationState {
    /// Creates an idle state.
    #[must_use]
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Starts `kind` at `now`, replacing any running effect.
    pub fn start(&mut self, kind: AnimationKind, duration: Duration, now: Instant) {
        self.active = Some((kind, now, duration));
    }

    /// Stops the running effect.
    pub fn stop(&mut self) {
        self.active = None;
    }

    /// The running effect, if it has not finished at `now`.
    #[must_use]
    pub fn current(&self, now: Instant) -> Option<AnimationKind> {
        self.progress(now).map(|(kind, _)| kind)
    }

    /// Returns true while an effect is running at `now`.
    #[must_use]
    pub fn is_active(&self, now: Instant) -> bool {
        self.progress(now).is_some()
    }

    fn progress(&self, now: Instant) -> Option<(AnimationKind, f32)> {
        let (kind, started, duration) = self.active?;
        let elapsed = now.saturating_duration_since(started);
        if duration.is_zero() || elapsed >= duration {
            return None;
        }
        Some((kind, elapsed.as_secs_f32() / duration.as_secs_f32()))
    }

    /// The visual adjustment at `now`; identity once the effect is over.
    #[must_use]
    pub fn sample(&self, now: Instant) -> AnimationSample {
        let Some((kind, t)) = self.progress(now) else {
            return AnimationSample::IDENTITY;
        };
        let tau = std::f32::consts::TAU;
        let pi = std::f32::consts::PI;
        let decay = 1.0 - ease_out(t);
        let mut sample = AnimationSample::IDENTITY;
        match kind {
            AnimationKind::Fade => sample.opacity = 1.0 - t,
            AnimationKind::Pulse => sample.scale = 1.0 + PULSE_DEPTH * (t * tau * 2.0).sin(),
            AnimationKind::Flash => {
                if (t * FLASH_TOGGLES) as u32 % 2 == 1 {
                    sample.opacity = 0.0;
                }
            },
            AnimationKind::Shake => {
                sample.offset_x = (SHAKE_AMPLITUDE * decay * (t * tau * 4.0).sin()).round() as i16;
            },
            AnimationKind::Scale => sample.scale = 1.0 + SCALE_PEAK * (t * pi).sin(),
            AnimationKind::Bounce => {
                sample.offset_y = -(BOUNCE_HEIGHT * decay * (t * pi * 3.0).sin().abs()).round() as i16;
            },
            AnimationKind::ColorPulse => {
                sample.hue_shift = (COLOR_PULSE_SPAN * (t * pi).sin()).round() as u16;
            },
        }
        sample
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn idle_state_is_identity() {
        let state = AnimationState::new();
        let now = Instant::now();
        assert!(!state.is_active(now));
        assert_eq!(state.sample(now), AnimationSample::IDENTITY);
    }

    #[test]
    fn fade_lowers_opacity_then_ends() {
        let start = Instant::now();
        let mut state = AnimationState::new();
        state.start(AnimationKind::Fade, Duration::from_millis(1000), start);

        let half = state.sample(start + Duration::from_millis(500));
        assert!((half.opacity - 0.5).abs() < 0.01);
        assert_eq!(state.current(start), Some(AnimationKind::Fade));

        let done = start + Duration::from_millis(1000);
        assert!(!state.is_active(done));
        assert_eq!(state.sample(done), AnimationSample::IDENTITY);
    }

    #[test]
    fn scale_peaks_mid_way() {
        let start = Instant::now();
        let mut state = AnimationState::new();
        state.start(AnimationKind::Scale, Duration::from_millis(400), start);
        let mid = state.sample(start + Duration::from_millis(200));
        assert!((mid.scale - 1.25).abs() < 0.01);
    }

    #[test]
    fn color_pulse_shifts_hue() {
        let start = Instant::now();
        let mut state = AnimationState::new();
        state.start(AnimationKind::ColorPulse, Duration::from_millis(1000), start);
        assert_eq!(
            state.sample(start + Duration::from_millis(500)).hue_shift,
            32
        );
    }

    #[test]
    fn zero_duration_never_runs() {
        let start = Instant::now();
        let mut state = AnimationState::new();
        state.start(AnimationKind::Shake, Duration::ZERO, start);
        assert!(!state.is_active(start));
    }

    #[test]
    fn restart_replaces_and_stop_clears() {
        let start = Instant::now();
        let mut state = AnimationState::new();
        state.start(AnimationKind::Fade, Duration::from_secs(1), start);
        state.start(AnimationKind::Bounce, Duration::from_secs(1), start);
        assert_eq!(state.current(start), Some(AnimationKind::Bounce));
        state.stop();
        assert_eq!(state.current(start), None);
    }
}
