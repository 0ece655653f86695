//! Frame-rate monitoring
//!
//! Counts frames on its own scheduler loop and reports a rolling FPS value
//! once per sampling window. Memory usage is sampled alongside each report
//! when the host exposes it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::quality::QualityTier;
use crate::scheduler::{FrameScheduler, LoopControl, LoopHandle};

/// Default sampling window in milliseconds
pub const DEFAULT_SAMPLE_INTERVAL_MS: f64 = 1000.0;

/// Memory snapshots kept for diagnostics
pub const MEMORY_HISTORY_LEN: usize = 60;

/// FPS assumed until the first window completes
const INITIAL_FPS: u32 = 60;

/// Process memory usage at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemorySnapshot {
    /// Frame timestamp when the sample was taken (milliseconds)
    pub timestamp_ms: f64,
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
}

/// Source of memory telemetry
pub trait MemoryProbe {
    /// `(resident_bytes, virtual_bytes)`, or `None` if unavailable
    fn sample(&self) -> Option<(u64, u64)>;
}

/// Probe for hosts without memory telemetry
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn sample(&self) -> Option<(u64, u64)> {
        None
    }
}

/// Reads `/proc/self/statm` (Linux)
pub struct ProcStatmProbe {
    page_size: u64,
}

impl Default for ProcStatmProbe {
    fn default() -> Self {
        Self { page_size: 4096 }
    }
}

impl ProcStatmProbe {
    /// Parse the first two fields of a statm line (pages) into bytes
    fn parse(&self, statm: &str) -> Option<(u64, u64)> {
        let mut fields = statm.split_whitespace();
        let virtual_pages: u64 = fields.next()?.parse().ok()?;
        let resident_pages: u64 = fields.next()?.parse().ok()?;
        Some((
            resident_pages * self.page_size,
            virtual_pages * self.page_size,
        ))
    }
}

impl MemoryProbe for ProcStatmProbe {
    fn sample(&self) -> Option<(u64, u64)> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        self.parse(&statm)
    }
}

/// The best memory probe for the current platform
pub fn default_memory_probe() -> Box<dyn MemoryProbe> {
    if cfg!(target_os = "linux") {
        Box::new(ProcStatmProbe::default())
    } else {
        Box::new(NoMemoryProbe)
    }
}

type FpsCallback = Box<dyn FnMut(u32)>;

struct MonitorState {
    frames: u32,
    /// Open on the first frame sampled after a start
    window_start: Option<f64>,
    interval: f64,
    fps: u32,
    callback: Option<FpsCallback>,
    memory: VecDeque<MemorySnapshot>,
    probe: Box<dyn MemoryProbe>,
}

impl MonitorState {
    /// Count a frame; returns the FPS when a sampling window closes
    fn record_frame(&mut self, now: f64) -> Option<u32> {
        let Some(window_start) = self.window_start else {
            self.window_start = Some(now);
            self.frames = 0;
            return None;
        };

        self.frames += 1;
        let elapsed = now - window_start;
        if elapsed <= self.interval {
            return None;
        }

        let fps = (self.frames as f64 * 1000.0 / elapsed).round() as u32;
        self.fps = fps;
        self.frames = 0;
        self.window_start = Some(now);
        self.record_memory(now);
        trace!(fps, "fps sampled");
        Some(fps)
    }

    fn record_memory(&mut self, now: f64) {
        let Some((resident_bytes, virtual_bytes)) = self.probe.sample() else {
            return;
        };
        if self.memory.len() == MEMORY_HISTORY_LEN {
            self.memory.pop_front();
        }
        self.memory.push_back(MemorySnapshot {
            timestamp_ms: now,
            resident_bytes,
            virtual_bytes,
        });
    }
}

/// Rolling FPS measurement driven by a [`FrameScheduler`] loop
pub struct PerformanceMonitor {
    state: Rc<RefCell<MonitorState>>,
    handle: Option<LoopHandle>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    /// Monitor using the platform's default memory probe
    pub fn new() -> Self {
        Self::with_probe(default_memory_probe())
    }

    pub fn with_probe(probe: Box<dyn MemoryProbe>) -> Self {
        Self {
            state: Rc::new(RefCell::new(MonitorState {
                frames: 0,
                window_start: None,
                interval: DEFAULT_SAMPLE_INTERVAL_MS,
                fps: INITIAL_FPS,
                callback: None,
                memory: VecDeque::with_capacity(MEMORY_HISTORY_LEN),
                probe,
            })),
            handle: None,
        }
    }

    /// Start sampling; `callback` receives each new FPS value
    ///
    /// An already running sampling loop is cancelled first, so exactly one
    /// loop ever counts frames.
    pub fn start_monitoring<F>(&mut self, scheduler: &mut FrameScheduler, callback: F, interval_ms: f64)
    where
        F: FnMut(u32) + 'static,
    {
        self.stop_monitoring(scheduler);

        {
            let mut state = self.state.borrow_mut();
            state.frames = 0;
            state.window_start = None;
            state.interval = interval_ms;
            state.callback = Some(Box::new(callback));
        }

        let state = Rc::clone(&self.state);
        let handle = scheduler.schedule("performance-monitor", move |now| {
            let report = state.borrow_mut().record_frame(now);
            if let Some(fps) = report {
                // The callback runs without the state borrowed so it may
                // query this monitor.
                let callback = state.borrow_mut().callback.take();
                if let Some(mut callback) = callback {
                    callback(fps);
                    state.borrow_mut().callback.get_or_insert(callback);
                }
            }
            LoopControl::Continue
        });
        self.handle = Some(handle);
        debug!(interval_ms, "performance monitoring started");
    }

    /// Stop sampling; the last FPS value stays available
    pub fn stop_monitoring(&mut self, scheduler: &mut FrameScheduler) {
        if let Some(handle) = self.handle.take() {
            scheduler.cancel(handle);
            debug!("performance monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.handle.is_some()
    }

    /// Most recently measured FPS
    pub fn fps(&self) -> u32 {
        self.state.borrow().fps
    }

    /// Quality tier for the most recent FPS
    pub fn recommended_quality_level(&self) -> QualityTier {
        QualityTier::from_fps(self.fps())
    }

    /// Memory snapshots, oldest first
    pub fn memory_history(&self) -> Vec<MemorySnapshot> {
        self.state.borrow().memory.iter().copied().collect()
    }
}
