//! DialController - owns one dial's state and drives its display
//!
//! The controller runs as a single task. Host events, backend volume
//! notifications and smoother steps all arrive as messages and are handled
//! one at a time, so the state needs no locking:
//!
//! - rotation only moves the target; frames come from smoother steps
//! - steps are rendered at most once per `min_render_interval`
//! - appearance and mute toggles render immediately, bypassing the throttle
//! - a converged step that lands inside the throttle window is rendered once
//!   the window reopens, so the display always settles on the target

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bus::{VolumeBus, VolumeNotification};
use crate::config::DialConfig;
use crate::dial::events::{DialEvent, DialHandle};
use crate::dial::image::{Frame, FrameRenderer};
use crate::dial::settings::{DialSettings, ResolvedSettings};
use crate::dial::state::VolumeState;
use crate::dial::surface::{push_frame, DialSurface};
use crate::dial::throttle::RenderThrottle;
use crate::smoother::{Smoother, StepCallback, DEFAULT_SPEED, DEFAULT_TICK_INTERVAL};

/// A value emitted by the smoother of a given generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmootherStep {
    /// Generation of the smoother that produced the value
    pub epoch: u64,
    pub value: f64,
}

pub struct DialController {
    state: VolumeState,
    settings: ResolvedSettings,
    default_settings: DialSettings,
    smoother: Smoother,
    /// Bumped whenever the smoother is replaced
    epoch: u64,
    throttle: RenderThrottle,
    /// Deadline for a pending trailing frame
    trailing: Option<Instant>,
    action: Option<Arc<dyn DialSurface>>,
    renderer: Arc<FrameRenderer>,
    steps_tx: mpsc::Sender<SmootherStep>,
    steps_rx: mpsc::Receiver<SmootherStep>,
}

fn step_callback(tx: mpsc::Sender<SmootherStep>, epoch: u64) -> StepCallback {
    Box::new(move |value| {
        // Called under the smoother lock: never block here
        if let Err(e) = tx.try_send(SmootherStep { epoch, value }) {
            trace!("Dropped smoother step {:.3}: {}", value, e);
        }
    })
}

/// Build a smoother for `settings`, falling back to default smoothing
/// (and rewriting `settings` to match) when the configured values are rejected.
fn build_smoother(
    settings: &mut ResolvedSettings,
    initial: f64,
    tx: &mpsc::Sender<SmootherStep>,
    epoch: u64,
) -> Smoother {
    match Smoother::new(settings.smoother_config(initial), step_callback(tx.clone(), epoch)) {
        Ok(smoother) => smoother,
        Err(e) => {
            warn!("{}, using default smoothing", e);
            settings.smoothing_speed = DEFAULT_SPEED;
            settings.smoothing_tick = DEFAULT_TICK_INTERVAL;
            Smoother::with_defaults(initial, step_callback(tx.clone(), epoch))
        }
    }
}

impl DialController {
    pub fn new(config: &DialConfig, renderer: Arc<FrameRenderer>) -> Self {
        let state = VolumeState::new(config.initial_volume);
        let mut settings = config.defaults.resolve();
        let (steps_tx, steps_rx) = mpsc::channel(config.step_queue_capacity.max(1));
        let smoother = build_smoother(&mut settings, state.smoother_target(), &steps_tx, 0);

        Self {
            state,
            settings,
            default_settings: config.defaults.clone(),
            smoother,
            epoch: 0,
            throttle: RenderThrottle::new(config.min_render_interval()),
            trailing: None,
            action: None,
            renderer,
            steps_tx,
            steps_rx,
        }
    }

    pub fn state(&self) -> &VolumeState {
        &self.state
    }

    pub fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    pub fn smoother(&self) -> &Smoother {
        &self.smoother
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn trailing_due(&self) -> Option<Instant> {
        self.trailing
    }

    /// Id of the action frames are currently pushed to
    pub fn action_id(&self) -> Option<&str> {
        self.action.as_deref().map(|a| a.id())
    }

    /// Swap in a fresh smoother seeded at `initial`. Steps from the old one are
    /// ignored from here on.
    fn replace_smoother(&mut self, initial: f64) {
        self.smoother.dispose();
        self.epoch += 1;
        self.smoother = build_smoother(&mut self.settings, initial, &self.steps_tx, self.epoch);
    }

    fn apply_settings(&mut self, settings: &DialSettings) {
        self.settings = settings.or(&self.default_settings).resolve();
    }

    pub async fn handle_event(&mut self, event: DialEvent) {
        match event {
            DialEvent::WillAppear { action, settings } => {
                self.on_will_appear(action, settings).await
            }
            DialEvent::DidReceiveSettings { settings } => self.on_settings_changed(settings),
            DialEvent::Rotate { action, ticks } => self.on_rotate(action, ticks),
            DialEvent::Press { action } => self.on_press(action).await,
            DialEvent::VolumeChanged { volume, muted } => {
                self.on_volume_changed(volume, muted).await
            }
            DialEvent::WillDisappear => self.on_will_disappear(),
        }
    }

    async fn on_will_appear(&mut self, action: Arc<dyn DialSurface>, settings: DialSettings) {
        info!("{}: dial appeared", action.id());
        self.action = Some(action);
        self.apply_settings(&settings);

        // Nothing to animate on appearance: start settled on the target
        self.replace_smoother(self.state.smoother_target());
        self.trailing = None;
        self.render(self.smoother.current()).await;
    }

    fn on_settings_changed(&mut self, settings: DialSettings) {
        self.apply_settings(&settings);
        info!("Dial settings updated: {:?}", self.settings);

        // Continue from where the old smoother was, with the new parameters
        let current = self.smoother.current();
        self.replace_smoother(current);
        self.smoother.set_target(self.state.smoother_target());
    }

    fn on_rotate(&mut self, action: Arc<dyn DialSurface>, ticks: i32) {
        self.action = Some(action);
        self.state.rotate(ticks, self.settings.step);
        debug!(
            "Rotate {:+} -> {}{}",
            ticks,
            self.state.target_volume(),
            if self.state.is_muted() { " (muted)" } else { "" }
        );
        self.smoother.set_target(self.state.smoother_target());
    }

    async fn on_press(&mut self, action: Arc<dyn DialSurface>) {
        self.action = Some(action);
        self.state.toggle_mute();
        debug!("Mute toggled: {}", self.state.is_muted());
        self.smoother.set_target(self.state.smoother_target());
        // Immediate feedback for the press; the fill follows via steps
        self.render(self.smoother.current()).await;
    }

    async fn on_volume_changed(&mut self, volume: f64, muted: bool) {
        self.state.apply_backend(volume, muted);
        debug!(
            "Backend volume {} (muted: {}) -> target {}",
            volume,
            muted,
            self.state.target_volume()
        );
        self.smoother.set_target(self.state.smoother_target());
        self.render(self.smoother.current()).await;
    }

    fn on_will_disappear(&mut self) {
        if let Some(action) = self.action.take() {
            info!("{}: dial disappeared", action.id());
        }
        self.smoother.dispose();
        // Steps still queued belong to a dial that is gone
        self.epoch += 1;
        self.trailing = None;
    }

    async fn on_smoother_step(&mut self, step: SmootherStep, now: Instant) {
        if step.epoch != self.epoch {
            trace!("Ignoring step from smoother generation {}", step.epoch);
            return;
        }
        if self.action.is_none() {
            return;
        }

        if self.throttle.try_acquire(now) {
            self.trailing = None;
            self.render(step.value).await;
            // The timer may have run ahead while steps were dropped
            if self.smoother.is_running() || step.value == self.smoother.current() {
                return;
            }
        } else {
            trace!("Step {:.2} throttled", step.value);
            if self.smoother.is_running() {
                return;
            }
        }

        self.trailing = self.throttle.next_allowed();
    }

    async fn flush_trailing(&mut self, now: Instant) {
        if self.trailing.take().is_none() {
            return;
        }
        if self.throttle.try_acquire(now) {
            self.render(self.smoother.current()).await;
        } else {
            self.trailing = self.throttle.next_allowed();
        }
    }

    /// Render `value` and push it to the current action, if any
    async fn render(&self, value: f64) {
        let Some(action) = &self.action else {
            trace!("No visible action, dropping frame");
            return;
        };

        let shown = value.round().clamp(0.0, 100.0) as u8;
        let muted = self.state.is_muted();
        let png = match self.renderer.render(shown, muted, self.settings.render_size) {
            Ok(png) => png,
            Err(e) => {
                warn!("{}: failed to render frame: {}", action.id(), e);
                return;
            }
        };

        push_frame(action.as_ref(), &Frame::new(png, shown, muted)).await;
    }

    /// Process events until shutdown or until every handle is dropped
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<DialEvent>,
        mut volume: Option<broadcast::Receiver<VolumeNotification>>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Dial controller shutting down");
                    break;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            debug!("All dial handles dropped");
                            break;
                        }
                    }
                }
                Some(step) = self.steps_rx.recv() => {
                    self.on_smoother_step(step, Instant::now()).await;
                }
                result = next_volume(&mut volume) => {
                    let received = match result {
                        Ok(n) => Some(n),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("Volume bus lagged, skipped {} notifications", skipped);
                            None
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Volume bus closed");
                            volume = None;
                            None
                        }
                    };
                    let newest = match volume.as_mut() {
                        Some(rx) => drain_to_newest(rx, received),
                        None => received,
                    };
                    if let Some(n) = newest {
                        self.on_volume_changed(n.volume, n.muted).await;
                    }
                }
                _ = tokio::time::sleep_until(self.trailing.unwrap_or_else(Instant::now)), if self.trailing.is_some() => {
                    self.flush_trailing(Instant::now()).await;
                }
            }
        }

        self.smoother.dispose();
        self.action = None;
    }
}

async fn next_volume(
    rx: &mut Option<broadcast::Receiver<VolumeNotification>>,
) -> Result<VolumeNotification, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Notifications are snapshots: only the newest one still buffered matters
fn drain_to_newest(
    rx: &mut broadcast::Receiver<VolumeNotification>,
    mut newest: Option<VolumeNotification>,
) -> Option<VolumeNotification> {
    loop {
        match rx.try_recv() {
            Ok(n) => newest = Some(n),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return newest,
        }
    }
}

/// Spawn a controller task and return the handle used to feed it events
pub fn spawn(
    config: &DialConfig,
    renderer: Arc<FrameRenderer>,
    bus: Option<&VolumeBus>,
    shutdown: CancellationToken,
) -> (DialHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.event_queue_capacity.max(1));
    let controller = DialController::new(config, renderer);
    let volume = bus.map(VolumeBus::subscribe);

    let task = tokio::spawn(controller.run(rx, volume, shutdown));
    (DialHandle::new(tx), task)
}
