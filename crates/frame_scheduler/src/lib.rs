use std::fmt::Display;

use render_protocol::StepOutcome;

/// Resumable work driven one bounded step at a time.
pub trait StepTask {
    type Error: Display;

    fn step(&mut self) -> Result<StepOutcome, Self::Error>;

    /// Estimate of the steps still needed; 0 when there is nothing to do.
    fn pending_steps(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSchedulerConfig {
    pub max_steps_per_tick: u32,
    pub min_steps_per_tick: u32,
}

impl Default for StepSchedulerConfig {
    fn default() -> Self {
        Self {
            max_steps_per_tick: 16,
            min_steps_per_tick: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerUpdateReason {
    Activated,
    Tick,
    Deactivated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick_sequence_id: u64,
    pub scheduler_active: bool,
    pub step_quota: Option<u32>,
    pub steps_run: u32,
    pub failures: u32,
    pub update_reason: Option<SchedulerUpdateReason>,
}

/// Cooperative driver: each tick runs a clamped quota of steps of a task,
/// like an idle handler that stays registered while work is pending.
#[derive(Debug, Clone)]
pub struct StepScheduler {
    config: StepSchedulerConfig,
    scheduler_active: bool,
    next_tick_sequence_id: u64,
}

impl StepScheduler {
    pub fn new(config: StepSchedulerConfig) -> Self {
        Self {
            config,
            scheduler_active: false,
            next_tick_sequence_id: 0,
        }
    }

    pub fn config(&self) -> StepSchedulerConfig {
        self.config
    }

    pub fn is_active(&self) -> bool {
        self.scheduler_active
    }

    pub fn tick<T: StepTask>(&mut self, task: &mut T) -> TickReport {
        let tick_sequence_id = self.next_tick_sequence_id;
        self.next_tick_sequence_id += 1;
        let pending_steps = task.pending_steps();

        if pending_steps > 0 {
            let was_inactive = !self.scheduler_active;
            self.scheduler_active = true;
            let step_quota = self.step_quota_for_pending(pending_steps);
            let (steps_run, failures) = run_steps(task, step_quota);
            log::debug!(
                "tick {tick_sequence_id}: ran {steps_run}/{step_quota} steps, {failures} failed"
            );
            return TickReport {
                tick_sequence_id,
                scheduler_active: self.scheduler_active,
                step_quota: Some(step_quota),
                steps_run,
                failures,
                update_reason: Some(if was_inactive {
                    SchedulerUpdateReason::Activated
                } else {
                    SchedulerUpdateReason::Tick
                }),
            };
        }

        if self.scheduler_active {
            self.scheduler_active = false;
            return TickReport {
                tick_sequence_id,
                scheduler_active: self.scheduler_active,
                step_quota: Some(0),
                steps_run: 0,
                failures: 0,
                update_reason: Some(SchedulerUpdateReason::Deactivated),
            };
        }

        TickReport {
            tick_sequence_id,
            scheduler_active: self.scheduler_active,
            step_quota: None,
            steps_run: 0,
            failures: 0,
            update_reason: None,
        }
    }

    fn step_quota_for_pending(&self, pending_steps: u32) -> u32 {
        if pending_steps == 0 {
            return 0;
        }
        let floor = self.config.min_steps_per_tick;
        let ceiling = self.config.max_steps_per_tick;
        if floor > ceiling {
            panic!(
                "invalid step scheduler config: min_steps_per_tick ({floor}) exceeds max_steps_per_tick ({ceiling})"
            );
        }
        pending_steps.clamp(floor, ceiling)
    }
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new(StepSchedulerConfig::default())
    }
}

/// Failed steps count against the quota but do not end the tick.
fn run_steps<T: StepTask>(task: &mut T, step_quota: u32) -> (u32, u32) {
    let mut steps_run = 0;
    let mut failures = 0;
    while steps_run < step_quota {
        steps_run += 1;
        match task.step() {
            Ok(StepOutcome::Done) => break,
            Ok(StepOutcome::MoreWork) => {}
            Err(error) => {
                failures += 1;
                log::warn!("scheduled step failed: {error}");
            }
        }
    }
    (steps_run, failures)
}
