//! Cancellable, time-stepped fades.
//!
//! A [`FadeEngine`] belongs to one device. Each call to
//! [`FadeEngine::start_fade`] stops the device's running fade (if any),
//! waits for its thread to exit, and spawns a new one that walks every
//! channel from its last written value to the target in a fixed number of
//! steps:
//!
//! ```text
//! value[i] = initial[i] + ⌊step × (target[i] − initial[i]) / STEPS⌋    step = 1..=STEPS
//! ```
//!
//! Step `STEPS` applies the full delta, so an uncancelled fade always
//! lands exactly on the target. A cancelled fade stops after the step in
//! progress; whatever was written last becomes the start of the next fade.
//!
//! ## Invariants
//!
//! - At most one live fade thread per engine. The cancel → join → spawn
//!   sequence runs under the engine's task lock.
//! - `current_output` only ever holds values that were actually written.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, warn};

use crate::app::ports::PwmPort;
use crate::drivers::pwm_bus::{CHANNEL_COUNT, PwmBus};
use crate::error::{FadeError, Result};
use crate::signal::{self, Notify};

/// Fixed-capacity list of channel ids owned by one device.
pub type ChannelList = heapless::Vec<u8, CHANNEL_COUNT>;
/// One output level per channel.
pub type Levels = heapless::Vec<u16, CHANNEL_COUNT>;

/// Number of interpolation steps per fade.
pub const FADE_STEPS: u32 = 60;
/// Pause between steps.
pub const STEP_DELAY: Duration = Duration::from_millis(5);

/// How long a superseded fade may take to exit. A cancelled fade stops
/// within one step; anything near this limit means a hardware write is
/// stuck.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Step count, pacing and join bound for a fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeProfile {
    pub steps: u32,
    pub step_delay: Duration,
    pub join_timeout: Duration,
}

impl Default for FadeProfile {
    fn default() -> Self {
        Self {
            steps: FADE_STEPS,
            step_delay: STEP_DELAY,
            join_timeout: JOIN_TIMEOUT,
        }
    }
}

impl FadeProfile {
    /// Uncancelled run time of one fade.
    pub fn duration(&self) -> Duration {
        self.step_delay * self.steps
    }
}

/// How a fade thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// All steps written; output equals the target.
    Completed,
    /// Stopped early by a newer fade or by shutdown.
    Cancelled,
    /// A hardware write failed; output holds the last good values.
    Failed,
}

struct FadeTask {
    cancel: Arc<AtomicBool>,
    done: Arc<Notify<FadeOutcome>>,
    handle: JoinHandle<()>,
}

pub struct FadeEngine<P: PwmPort + 'static> {
    device: String,
    bus: Arc<PwmBus<P>>,
    channels: ChannelList,
    profile: FadeProfile,
    current: Arc<Mutex<Levels>>,
    task: Mutex<Option<FadeTask>>,
}

impl<P: PwmPort + 'static> FadeEngine<P> {
    /// Engine for `channels` on `bus`. Outputs are assumed to start at 0.
    pub fn new(device: &str, bus: Arc<PwmBus<P>>, channels: ChannelList) -> Self {
        Self::with_profile(device, bus, channels, FadeProfile::default())
    }

    pub fn with_profile(
        device: &str,
        bus: Arc<PwmBus<P>>,
        channels: ChannelList,
        profile: FadeProfile,
    ) -> Self {
        let mut zeros = Levels::new();
        for _ in &channels {
            // Same capacity as `channels`, cannot overflow.
            let _ = zeros.push(0);
        }
        Self {
            device: device.to_owned(),
            bus,
            channels,
            profile,
            current: Arc::new(Mutex::new(zeros)),
            task: Mutex::new(None),
        }
    }

    /// Stop any running fade and start a new one towards `targets`.
    ///
    /// Blocks only while the superseded fade winds down (one step in
    /// practice). Fails with [`FadeError::JoinTimeout`] if it does not;
    /// in that case no new fade is started.
    pub fn start_fade(&self, targets: &[u16]) -> Result<()> {
        if targets.len() != self.channels.len() {
            return Err(FadeError::TargetCount {
                expected: self.channels.len(),
                found: targets.len(),
            }
            .into());
        }

        let mut slot = self.lock_task();
        if let Some(task) = slot.take() {
            if let Err(e) = self.stop_task(task, &mut slot) {
                error!("Fade '{}': {}", self.device, e);
                return Err(e.into());
            }
        }

        let worker = FadeWorker {
            device: self.device.clone(),
            bus: Arc::clone(&self.bus),
            channels: self.channels.clone(),
            profile: self.profile,
            current: Arc::clone(&self.current),
            initial: self.current_levels(),
            targets: targets.iter().copied().collect(),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let cancel = Arc::clone(&worker.cancel);
        let done = Arc::new(Notify::new());
        let notify = Arc::clone(&done);
        let device = self.device.clone();

        let handle = thread::Builder::new()
            .name(format!("fade-{}", self.device))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.run()))
                    .unwrap_or_else(|_| {
                        error!("Fade '{}': {}", device, FadeError::TaskPanicked);
                        FadeOutcome::Failed
                    });
                notify.signal(outcome);
            })
            .map_err(|e| FadeError::SpawnFailed(e.to_string()))?;

        *slot = Some(FadeTask {
            cancel,
            done,
            handle,
        });
        Ok(())
    }

    /// Cancel the running fade, if any, and wait for it to exit.
    pub fn stop(&self) -> Result<Option<FadeOutcome>> {
        let mut slot = self.lock_task();
        match slot.take() {
            Some(task) => Ok(Some(self.stop_task(task, &mut slot)?)),
            None => Ok(None),
        }
    }

    /// Wait for the running fade to finish on its own.
    ///
    /// Holds the task lock throughout, so a `start_fade` from another
    /// thread queues behind the wait instead of racing the running fade.
    /// A fade that overruns its duration by `join_timeout` is cancelled.
    ///
    /// Returns `None` when no fade was running, or when the fade could not
    /// be stopped either; it then stays in place and `is_fading` is true.
    pub fn wait(&self) -> Option<FadeOutcome> {
        let mut slot = self.lock_task();
        let task = slot.take()?;
        let limit = self.profile.duration() + self.profile.join_timeout;
        if let Some(outcome) = signal::wait_for(&task.done, limit) {
            let _ = task.handle.join();
            return Some(outcome);
        }

        warn!("Fade '{}': did not finish within {:?}, cancelling", self.device, limit);
        match self.stop_task(task, &mut slot) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Fade '{}': {}", self.device, e);
                None
            }
        }
    }

    /// Whether a fade thread is still writing.
    pub fn is_fading(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Last value written to each channel, in channel order.
    pub fn current_output(&self) -> Vec<u16> {
        self.current_levels().to_vec()
    }

    pub fn channels(&self) -> &[u8] {
        &self.channels
    }

    pub fn profile(&self) -> FadeProfile {
        self.profile
    }

    fn stop_task(
        &self,
        task: FadeTask,
        slot: &mut MutexGuard<'_, Option<FadeTask>>,
    ) -> core::result::Result<FadeOutcome, FadeError> {
        task.cancel.store(true, Ordering::Release);
        match signal::wait_for(&task.done, self.profile.join_timeout) {
            Some(outcome) => {
                let _ = task.handle.join();
                if outcome == FadeOutcome::Cancelled {
                    debug!("Fade '{}': cancelled", self.device);
                }
                Ok(outcome)
            }
            None => {
                // Keep the handle so the next attempt waits on the same thread.
                **slot = Some(task);
                Err(FadeError::JoinTimeout)
            }
        }
    }

    fn current_levels(&self) -> Levels {
        self.current.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<FadeTask>> {
        self.task.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<P: PwmPort + 'static> Drop for FadeEngine<P> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ── Fade thread body ──────────────────────────────────────────

struct FadeWorker<P: PwmPort + 'static> {
    device: String,
    bus: Arc<PwmBus<P>>,
    channels: ChannelList,
    profile: FadeProfile,
    current: Arc<Mutex<Levels>>,
    initial: Levels,
    targets: Levels,
    cancel: Arc<AtomicBool>,
}

impl<P: PwmPort + 'static> FadeWorker<P> {
    fn run(self) -> FadeOutcome {
        debug!(
            "Fade '{}': {:?} -> {:?}",
            self.device, self.initial, self.targets
        );
        let steps = self.profile.steps.max(1) as i32;

        for step in 1..=steps {
            for (i, &channel) in self.channels.iter().enumerate() {
                let value = step_value(self.initial[i], self.targets[i], step, steps);
                if let Err(e) = self.bus.write_channel(u32::from(channel), i64::from(value)) {
                    error!(
                        "Fade '{}': write to channel {} failed at step {}: {}",
                        self.device, channel, step, e
                    );
                    return FadeOutcome::Failed;
                }
                self.current.lock().unwrap_or_else(|p| p.into_inner())[i] = value;
            }

            if self.cancel.load(Ordering::Acquire) {
                return FadeOutcome::Cancelled;
            }
            if step < steps {
                thread::sleep(self.profile.step_delay);
            }
        }

        debug!("Fade '{}': finished", self.device);
        FadeOutcome::Completed
    }
}

/// Interpolated level for `step` of `steps`, truncated towards the start.
///
/// The result never leaves `[min(initial, target), max(initial, target)]`
/// and equals `target` at `step == steps`.
pub fn step_value(initial: u16, target: u16, step: i32, steps: i32) -> u16 {
    let initial = i32::from(initial);
    let delta = i32::from(target) - initial;
    (initial + (step * delta).div_euclid(steps)) as u16
}
