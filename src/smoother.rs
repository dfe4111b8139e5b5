//! Smoother - eases a displayed value towards a target on a fixed cadence
//!
//! The engine owns a target, a current value and a lazily armed periodic timer:
//! - `set_target()` arms the timer if it is not already running
//! - every tick moves `current` a fixed fraction (`speed`) of the remaining distance
//! - once `current` is within `CONVERGENCE_THRESHOLD` of the target it snaps and the timer disarms
//!
//! The step callback is invoked with the smoother lock held, so it must not call
//! back into the same smoother. It should hand the value off (e.g. `try_send`).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Distance below which `current` snaps to `target`
pub const CONVERGENCE_THRESHOLD: f64 = 0.01;

/// Default easing factor per tick
pub const DEFAULT_SPEED: f64 = 0.18;

/// Default tick cadence (~30 Hz)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(33);

/// Invalid smoother configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SmootherError {
    #[error("Smoothing speed must be in (0, 1], got {0}")]
    InvalidSpeed(f64),

    #[error("Tick interval must be greater than zero")]
    InvalidTickInterval,
}

/// Construction parameters for a [`Smoother`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmootherConfig {
    /// Initial value for both target and current
    pub initial: f64,
    /// Fraction of the remaining distance covered per tick
    pub speed: f64,
    pub tick_interval: Duration,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            initial: 0.0,
            speed: DEFAULT_SPEED,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl SmootherConfig {
    pub fn validate(&self) -> Result<(), SmootherError> {
        if !(self.speed > 0.0 && self.speed <= 1.0) {
            return Err(SmootherError::InvalidSpeed(self.speed));
        }
        if self.tick_interval.is_zero() {
            return Err(SmootherError::InvalidTickInterval);
        }
        Ok(())
    }
}

/// Pure easing state, advanced one tick at a time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmootherState {
    pub target: f64,
    pub current: f64,
    speed: f64,
}

impl SmootherState {
    pub fn new(initial: f64, speed: f64) -> Self {
        Self {
            target: initial,
            current: initial,
            speed,
        }
    }

    /// Advance one tick and return the new current value.
    ///
    /// Exponential decay towards the target; never overshoots for speed in (0, 1].
    pub fn advance(&mut self) -> f64 {
        let delta = self.target - self.current;
        if delta.abs() < CONVERGENCE_THRESHOLD {
            self.current = self.target;
        } else {
            self.current += delta * self.speed;
            // Same threshold decides the stop, so we never rely on `+=` landing exactly
            if (self.target - self.current).abs() < CONVERGENCE_THRESHOLD {
                self.current = self.target;
            }
        }
        self.current
    }

    pub fn is_converged(&self) -> bool {
        self.current == self.target
    }
}

/// Callback invoked with each new displayed value
pub type StepCallback = Box<dyn Fn(f64) + Send + Sync>;

struct Inner {
    state: SmootherState,
    on_step: Option<StepCallback>,
    /// Present iff a timer task is armed
    timer: Option<CancellationToken>,
    disposed: bool,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Timer-driven scalar animator
pub struct Smoother {
    inner: Arc<Mutex<Inner>>,
    speed: f64,
    tick_interval: Duration,
}

impl Smoother {
    /// Create a smoother. Rejects speed outside (0, 1] and a zero tick interval.
    pub fn new(config: SmootherConfig, on_step: StepCallback) -> Result<Self, SmootherError> {
        config.validate()?;
        Ok(Self::build(config, on_step))
    }

    /// Smoother with the default speed and cadence, seeded at `initial`
    pub fn with_defaults(initial: f64, on_step: StepCallback) -> Self {
        Self::build(
            SmootherConfig {
                initial,
                ..SmootherConfig::default()
            },
            on_step,
        )
    }

    fn build(config: SmootherConfig, on_step: StepCallback) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SmootherState::new(config.initial, config.speed),
                on_step: Some(on_step),
                timer: None,
                disposed: false,
            })),
            speed: config.speed,
            tick_interval: config.tick_interval,
        }
    }

    /// Redirect towards `value`, arming the timer if it is idle.
    ///
    /// Does not touch `current`; an in-flight animation simply bends towards
    /// the new target on the next tick. Requires a Tokio runtime to arm.
    pub fn set_target(&self, value: f64) {
        let mut inner = lock(&self.inner);
        inner.state.target = value;

        if inner.disposed || inner.timer.is_some() || inner.state.current == value {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No Tokio runtime available, smoother timer not armed");
                return;
            }
        };

        let token = CancellationToken::new();
        inner.timer = Some(token.clone());
        drop(inner);

        handle.spawn(run_timer(
            Arc::downgrade(&self.inner),
            token,
            self.tick_interval,
        ));
    }

    pub fn current(&self) -> f64 {
        lock(&self.inner).state.current
    }

    pub fn target(&self) -> f64 {
        lock(&self.inner).state.target
    }

    /// Whether a timer is currently armed
    pub fn is_running(&self) -> bool {
        lock(&self.inner).timer.is_some()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Disarm the timer and detach the callback. Idempotent.
    ///
    /// After this returns no callback fires, including ticks already scheduled.
    pub fn dispose(&self) {
        let mut inner = lock(&self.inner);
        inner.disposed = true;
        inner.on_step = None;
        if let Some(token) = inner.timer.take() {
            token.cancel();
        }
    }
}

impl Drop for Smoother {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Smoother {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Smoother")
            .field("state", &inner.state)
            .field("running", &inner.timer.is_some())
            .field("disposed", &inner.disposed)
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}

async fn run_timer(inner: Weak<Mutex<Inner>>, token: CancellationToken, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                if !tick(&inner, &token) {
                    break;
                }
            }
        }
    }
}

/// One easing step. Returns false once this timer should stop.
fn tick(inner: &Mutex<Inner>, token: &CancellationToken) -> bool {
    let mut inner = lock(inner);
    // Disposed, or superseded by a newer timer
    if token.is_cancelled() {
        return false;
    }

    let value = inner.state.advance();
    if let Some(on_step) = &inner.on_step {
        on_step(value);
    }

    if inner.state.is_converged() {
        inner.timer = None;
        token.cancel();
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(calls: &Arc<AtomicUsize>) -> StepCallback {
        let calls = calls.clone();
        Box::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn config(initial: f64) -> SmootherConfig {
        SmootherConfig {
            initial,
            speed: 0.18,
            tick_interval: Duration::from_millis(33),
        }
    }

    #[test]
    fn test_rejects_invalid_speed() {
        for speed in [0.0, -0.5, 1.01, f64::NAN] {
            let cfg = SmootherConfig { speed, ..SmootherConfig::default() };
            let result = Smoother::new(cfg, Box::new(|_| {}));
            assert!(
                matches!(result, Err(SmootherError::InvalidSpeed(_))),
                "speed {} should be rejected",
                speed
            );
        }
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let cfg = SmootherConfig {
            tick_interval: Duration::ZERO,
            ..SmootherConfig::default()
        };
        let result = Smoother::new(cfg, Box::new(|_| {}));
        assert_eq!(result.err(), Some(SmootherError::InvalidTickInterval));
    }

    #[test]
    fn test_accepts_full_speed() {
        let cfg = SmootherConfig { speed: 1.0, ..SmootherConfig::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_distance_never_increases_and_converges() {
        for speed in [0.01, 0.18, 0.5, 0.99, 1.0] {
            for (from, to) in [(50.0, 0.0), (0.0, 100.0), (73.2, 73.205), (100.0, 99.0)] {
                let mut state = SmootherState::new(from, speed);
                state.target = to;

                let mut last = (to - from).abs();
                let mut ticks = 0;
                while !state.is_converged() {
                    state.advance();
                    let distance = (state.target - state.current).abs();
                    assert!(distance <= last, "distance grew at speed {}", speed);
                    last = distance;
                    ticks += 1;
                    assert!(ticks < 10_000, "no convergence at speed {}", speed);
                }
                assert_eq!(state.current, to);
            }
        }
    }

    #[test]
    fn test_never_overshoots() {
        let mut state = SmootherState::new(0.0, 0.9);
        state.target = 100.0;
        while !state.is_converged() {
            assert!(state.advance() <= 100.0);
        }
    }

    #[test]
    fn test_fifty_to_zero_snaps_exactly() {
        // 50 * 0.82^n drops below the threshold at n = 43
        let mut state = SmootherState::new(50.0, 0.18);
        state.target = 0.0;

        for _ in 0..20 {
            state.advance();
        }
        assert!(state.current > 0.9 && state.current < 1.0, "still easing after 20 ticks");

        let mut ticks = 20;
        while !state.is_converged() {
            state.advance();
            ticks += 1;
        }
        assert_eq!(ticks, 43);
        assert_eq!(state.current, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_converges_then_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let smoother = Smoother::new(config(50.0), counting(&calls)).unwrap();

        smoother.set_target(0.0);
        assert!(smoother.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(smoother.current(), 0.0);
        assert!(!smoother.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 43);

        // Nothing further once stopped
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 43);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_target_to_settled_value_is_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let smoother = Smoother::new(config(42.0), counting(&calls)).unwrap();

        smoother.set_target(42.0);
        assert!(!smoother.is_running());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_mid_animation_is_continuous() {
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = values.clone();
        let smoother = Smoother::new(
            config(0.0),
            Box::new(move |v| sink.lock().unwrap().push(v)),
        )
        .unwrap();

        smoother.set_target(100.0);
        tokio::time::sleep(Duration::from_millis(33 * 5 + 1)).await;
        let midway = smoother.current();
        assert!(midway > 0.0 && midway < 100.0);

        smoother.set_target(0.0);
        assert_eq!(smoother.current(), midway, "set_target must not move current");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(smoother.current(), 0.0);

        let values = values.lock().unwrap();
        let peak = values.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(peak, midway, "reversal starts from where the animation was");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_silences_pending_ticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let smoother = Smoother::new(config(0.0), counting(&calls)).unwrap();

        smoother.set_target(100.0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = calls.load(Ordering::SeqCst);
        assert!(before > 0);

        smoother.dispose();
        smoother.dispose();
        assert!(!smoother.is_running());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), before);

        // A disposed smoother never re-arms
        smoother.set_target(5.0);
        assert!(!smoother.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearms_after_convergence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let smoother = Smoother::new(config(10.0), counting(&calls)).unwrap();

        smoother.set_target(20.0);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!smoother.is_running());
        let first_run = calls.load(Ordering::SeqCst);

        smoother.set_target(30.0);
        assert!(smoother.is_running());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(smoother.current(), 30.0);
        assert!(calls.load(Ordering::SeqCst) > first_run);
    }

    #[test]
    fn test_set_target_without_runtime_does_not_arm() {
        let smoother = Smoother::new(config(0.0), Box::new(|_| {})).unwrap();
        smoother.set_target(10.0);
        assert!(!smoother.is_running());
        assert_eq!(smoother.target(), 10.0);
    }
}
