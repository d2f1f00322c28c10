use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::foundation::core::{PixelFormat, VideoFormat};
use crate::foundation::error::{PlayoutError, PlayoutResult};
use crate::frame::composite::CompositeFrame;
use crate::frame::frame::Frame;
use crate::processor::backend::FrameProcessor;

/// Options for [`HeadlessProcessor`].
#[derive(Clone, Debug)]
pub struct HeadlessOpts {
    /// Output format reported to producers.
    pub format: VideoFormat,
    /// Block in `send` so that ticks are spaced by the format's frame duration.
    pub pace: bool,
    /// Number of most recent composites to retain.
    pub history: usize,
}

impl Default for HeadlessOpts {
    fn default() -> Self {
        Self {
            format: VideoFormat::default(),
            pace: false,
            history: 8,
        }
    }
}

#[derive(Default)]
struct Output {
    sent: u64,
    history: VecDeque<CompositeFrame>,
    next_deadline: Option<Instant>,
}

/// In-memory backend: allocates plain frames and keeps the last few composites.
///
/// Used by the CLI and tests in place of a display or encoder backend.
pub struct HeadlessProcessor {
    opts: HeadlessOpts,
    output: Mutex<Output>,
    sent_cv: Condvar,
    stopped: AtomicBool,
    frames_created: AtomicU64,
}

impl HeadlessProcessor {
    /// Create a processor with `opts`.
    pub fn new(opts: HeadlessOpts) -> Self {
        Self {
            opts,
            output: Mutex::new(Output::default()),
            sent_cv: Condvar::new(),
            stopped: AtomicBool::new(false),
            frames_created: AtomicU64::new(0),
        }
    }

    /// Number of composites accepted so far.
    pub fn sent_count(&self) -> u64 {
        self.output.lock().sent
    }

    /// Number of frames allocated through `create_frame`.
    pub fn frames_created(&self) -> u64 {
        self.frames_created.load(Ordering::Relaxed)
    }

    /// Most recently accepted composite.
    pub fn last(&self) -> Option<CompositeFrame> {
        self.output.lock().history.back().cloned()
    }

    /// Retained composites, oldest first.
    pub fn history(&self) -> Vec<CompositeFrame> {
        self.output.lock().history.iter().cloned().collect()
    }

    /// Return `true` once `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Block until at least `count` composites have been accepted, or `timeout` elapses.
    ///
    /// Returns `true` if the count was reached.
    pub fn wait_for_sent(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut out = self.output.lock();
        while out.sent < count {
            if self.sent_cv.wait_until(&mut out, deadline).timed_out() {
                return out.sent >= count;
            }
        }
        true
    }

    /// Flatten the most recent composite onto a canvas of the output format.
    pub fn snapshot(&self) -> PlayoutResult<Option<Frame>> {
        let Some(last) = self.last() else {
            return Ok(None);
        };
        let f = &self.opts.format;
        last.flatten(f.width, f.height, PixelFormat::Rgba).map(Some)
    }

    /// Wait on `out` until the next frame deadline, or until `stop` is called.
    fn pace(&self, out: &mut MutexGuard<'_, Output>) {
        let Ok(period) = self.opts.format.fps.frame_duration() else {
            return;
        };
        let now = Instant::now();
        let deadline = out.next_deadline.unwrap_or(now);
        // Resync after a stall instead of bursting to catch up.
        let next = if deadline + period < now { now } else { deadline };
        out.next_deadline = Some(next + period);
        while !self.is_stopped() && Instant::now() < next {
            self.sent_cv.wait_until(out, next);
        }
    }
}

impl FrameProcessor for HeadlessProcessor {
    fn format(&self) -> &VideoFormat {
        &self.opts.format
    }

    fn create_frame(&self, width: u32, height: u32, format: PixelFormat) -> PlayoutResult<Frame> {
        if width == 0 || height == 0 {
            return Err(PlayoutError::invalid_argument(format!(
                "cannot allocate a {width}x{height} frame"
            )));
        }
        self.frames_created.fetch_add(1, Ordering::Relaxed);
        Ok(Frame::blank(width, height, format))
    }

    fn send(&self, frame: CompositeFrame) -> PlayoutResult<()> {
        let mut out = self.output.lock();
        if self.opts.pace {
            self.pace(&mut out);
        }
        if self.is_stopped() {
            return Ok(());
        }
        out.sent += 1;
        if self.opts.history > 0 {
            if out.history.len() == self.opts.history {
                out.history.pop_front();
            }
            out.history.push_back(frame);
        }
        self.sent_cv.notify_all();
        Ok(())
    }

    fn stop(&self) {
        {
            let _out = self.output.lock();
            self.stopped.store(true, Ordering::Release);
        }
        self.sent_cv.notify_all();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/processor/headless.rs"]
mod tests;
