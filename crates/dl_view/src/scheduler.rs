use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Scheduler state as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    FrameRequested,
    Rendering,
    /// The render thread has exited; nothing will be scheduled again.
    Stopped,
}

/// Outcome of a `draw()` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawRequest {
    /// A new frame was scheduled; the caller must post exactly one frame command.
    Scheduled,
    /// Folded into a frame that is already queued or into the pending follow-up.
    Coalesced,
    /// The render thread is gone.
    Rejected,
}

/// What the render thread does after finishing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextFrame {
    None,
    /// A caller asked for a frame while this one was rendering.
    Requested,
    /// The compositor deferred work to another frame.
    Continuation,
}

#[derive(Debug)]
struct Inner {
    state: SchedulerState,
    pending: bool,
    frames_started: u64,
}

/// `Idle -> FrameRequested -> Rendering -> Idle` state machine shared between the
/// caller and the render thread.
#[derive(Debug)]
pub struct FrameScheduler {
    inner: Mutex<Inner>,
    idle: Condvar,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SchedulerState::Idle,
                pending: false,
                frames_started: 0,
            }),
            idle: Condvar::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.lock().state
    }

    /// Frames the render thread has started so far.
    pub fn frames_started(&self) -> u64 {
        self.inner.lock().frames_started
    }

    pub fn request_frame(&self) -> DrawRequest {
        let mut inner = self.inner.lock();
        match inner.state {
            SchedulerState::Idle => {
                inner.state = SchedulerState::FrameRequested;
                DrawRequest::Scheduled
            }
            SchedulerState::FrameRequested => DrawRequest::Coalesced,
            SchedulerState::Rendering => {
                inner.pending = true;
                DrawRequest::Coalesced
            }
            SchedulerState::Stopped => DrawRequest::Rejected,
        }
    }

    /// Called by the render thread when it picks up a frame command.
    ///
    /// Returns false for stale frame commands, which are dropped.
    pub fn begin_frame(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != SchedulerState::FrameRequested {
            return false;
        }
        inner.state = SchedulerState::Rendering;
        inner.frames_started += 1;
        true
    }

    /// Called by the render thread after presenting. `deferred` is true when the
    /// compositor left work for another frame.
    ///
    /// Anything but [`NextFrame::None`] leaves the scheduler in `FrameRequested`,
    /// and the render thread runs the next frame itself.
    pub fn finish_frame(&self, deferred: bool) -> NextFrame {
        let mut inner = self.inner.lock();
        if inner.state != SchedulerState::Rendering {
            return NextFrame::None;
        }
        let next = if inner.pending {
            NextFrame::Requested
        } else if deferred {
            NextFrame::Continuation
        } else {
            NextFrame::None
        };
        inner.pending = false;
        if next == NextFrame::None {
            inner.state = SchedulerState::Idle;
            self.idle.notify_all();
        } else {
            inner.state = SchedulerState::FrameRequested;
        }
        next
    }

    /// Block until the scheduler is idle or stopped. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while matches!(
            inner.state,
            SchedulerState::FrameRequested | SchedulerState::Rendering
        ) {
            if self.idle.wait_until(&mut inner, deadline).timed_out() {
                return matches!(inner.state, SchedulerState::Idle | SchedulerState::Stopped);
            }
        }
        true
    }

    pub fn shut_down(&self) {
        let mut inner = self.inner.lock();
        inner.state = SchedulerState::Stopped;
        inner.pending = false;
        self.idle.notify_all();
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn coalesces_while_requested() {
        let scheduler = FrameScheduler::new();

        assert_eq!(scheduler.request_frame(), DrawRequest::Scheduled);
        assert_eq!(scheduler.request_frame(), DrawRequest::Coalesced);
        assert!(scheduler.begin_frame());
        assert_eq!(scheduler.finish_frame(false), NextFrame::None);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn requests_during_render_make_one_follow_up() {
        let scheduler = FrameScheduler::new();
        scheduler.request_frame();
        scheduler.begin_frame();

        for _ in 0..10 {
            assert_eq!(scheduler.request_frame(), DrawRequest::Coalesced);
        }

        assert_eq!(scheduler.finish_frame(false), NextFrame::Requested);
        assert!(scheduler.begin_frame());
        assert_eq!(scheduler.finish_frame(false), NextFrame::None);
        assert_eq!(scheduler.frames_started(), 2);
    }

    #[test]
    fn deferred_work_continues() {
        let scheduler = FrameScheduler::new();
        scheduler.request_frame();
        scheduler.begin_frame();

        assert_eq!(scheduler.finish_frame(true), NextFrame::Continuation);
        assert_eq!(scheduler.state(), SchedulerState::FrameRequested);
        assert_eq!(scheduler.request_frame(), DrawRequest::Coalesced);
    }

    #[test]
    fn stale_frame_commands_are_dropped() {
        let scheduler = FrameScheduler::new();
        assert!(!scheduler.begin_frame());
        assert_eq!(scheduler.finish_frame(false), NextFrame::None);
    }

    #[test]
    fn rejects_after_shut_down() {
        let scheduler = FrameScheduler::new();
        scheduler.shut_down();

        assert_eq!(scheduler.request_frame(), DrawRequest::Rejected);
        assert!(scheduler.wait_idle(Duration::from_millis(1)));
    }

    #[test]
    fn wait_idle_wakes_on_finish() {
        let scheduler = Arc::new(FrameScheduler::new());
        scheduler.request_frame();
        scheduler.begin_frame();

        let worker = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                scheduler.finish_frame(false);
            })
        };

        assert!(scheduler.wait_idle(Duration::from_secs(5)));
        worker.join().unwrap();
    }

    #[test]
    fn wait_idle_times_out_while_rendering() {
        let scheduler = FrameScheduler::new();
        scheduler.request_frame();
        scheduler.begin_frame();

        assert!(!scheduler.wait_idle(Duration::from_millis(10)));
    }
}
