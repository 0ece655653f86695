//! Cooperative frame scheduler
//!
//! Stands in for the host's animation-frame primitive. Loops are registered
//! once and invoked every frame until they return [`LoopControl::Stop`] or
//! are cancelled; a cancelled or stopped loop is never invoked again.

use tracing::trace;

/// Identifies a scheduled loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopHandle(u64);

/// Returned by a loop callback to keep or drop its registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

struct FrameLoop {
    handle: LoopHandle,
    name: String,
    callback: Box<dyn FnMut(f64) -> LoopControl>,
}

/// Runs registered loops once per frame, in registration order
#[derive(Default)]
pub struct FrameScheduler {
    loops: Vec<FrameLoop>,
    next_id: u64,
    now: f64,
    frames: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loop invoked with the frame timestamp (milliseconds)
    pub fn schedule<F>(&mut self, name: &str, callback: F) -> LoopHandle
    where
        F: FnMut(f64) -> LoopControl + 'static,
    {
        self.next_id += 1;
        let handle = LoopHandle(self.next_id);
        self.loops.push(FrameLoop {
            handle,
            name: name.to_string(),
            callback: Box::new(callback),
        });
        trace!(name, id = handle.0, "loop scheduled");
        handle
    }

    /// Cancel a loop; returns false if it was not active
    pub fn cancel(&mut self, handle: LoopHandle) -> bool {
        let before = self.loops.len();
        self.loops.retain(|l| l.handle != handle);
        before != self.loops.len()
    }

    pub fn is_active(&self, handle: LoopHandle) -> bool {
        self.loops.iter().any(|l| l.handle == handle)
    }

    /// Number of registered loops
    pub fn active_loops(&self) -> usize {
        self.loops.len()
    }

    /// Names of registered loops, in invocation order
    pub fn loop_names(&self) -> Vec<&str> {
        self.loops.iter().map(|l| l.name.as_str()).collect()
    }

    /// Timestamp of the most recent frame
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Run one frame: every active loop is invoked exactly once
    pub fn run_frame(&mut self, now: f64) {
        self.now = now;
        self.frames += 1;
        self.loops
            .retain_mut(|l| (l.callback)(now) == LoopControl::Continue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter(scheduler: &mut FrameScheduler, name: &str) -> (LoopHandle, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let handle = scheduler.schedule(name, move |_| {
            seen.set(seen.get() + 1);
            LoopControl::Continue
        });
        (handle, count)
    }

    #[test]
    fn loops_run_every_frame() {
        let mut scheduler = FrameScheduler::new();
        let (_, count) = counter(&mut scheduler, "a");

        for i in 0..5 {
            scheduler.run_frame(i as f64 * 16.0);
        }

        assert_eq!(count.get(), 5);
        assert_eq!(scheduler.frame_count(), 5);
        assert_eq!(scheduler.now(), 64.0);
    }

    #[test]
    fn cancelled_loop_never_runs_again() {
        let mut scheduler = FrameScheduler::new();
        let (handle, count) = counter(&mut scheduler, "a");
        scheduler.run_frame(0.0);

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        scheduler.run_frame(16.0);

        assert_eq!(count.get(), 1);
        assert!(!scheduler.is_active(handle));
    }

    #[test]
    fn stop_unregisters_loop() {
        let mut scheduler = FrameScheduler::new();
        let runs = Rc::new(Cell::new(0));
        let seen = Rc::clone(&runs);
        scheduler.schedule("twice", move |_| {
            seen.set(seen.get() + 1);
            if seen.get() >= 2 {
                LoopControl::Stop
            } else {
                LoopControl::Continue
            }
        });

        for i in 0..10 {
            scheduler.run_frame(i as f64);
        }

        assert_eq!(runs.get(), 2);
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[test]
    fn stopping_mid_frame_leaves_later_loops_running() {
        let mut scheduler = FrameScheduler::new();
        let stopper = scheduler.schedule("once", |_| LoopControl::Stop);
        let (survivor, count) = counter(&mut scheduler, "steady");

        scheduler.run_frame(0.0);
        assert!(!scheduler.is_active(stopper));
        assert_eq!(count.get(), 1);

        // Cancelling between frames takes effect before the next one
        assert!(scheduler.cancel(survivor));
        scheduler.run_frame(16.0);
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[test]
    fn loops_run_in_registration_order() {
        let mut scheduler = FrameScheduler::new();
        counter(&mut scheduler, "physics");
        counter(&mut scheduler, "monitor");
        assert_eq!(scheduler.loop_names(), vec!["physics", "monitor"]);
    }
}
