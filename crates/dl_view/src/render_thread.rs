//! The render thread of a [`ThreadedView`](crate::ThreadedView).
//!
//! The thread owns the [`RenderCore`]. Commands arrive over a crossbeam channel and are
//! applied only between frames; a frame command starts the frame loop, which keeps
//! going while the scheduler asks for follow-up frames.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError};

use crate::render_core::{RenderCommand, RenderCore};
use crate::scheduler::{FrameScheduler, NextFrame};

/// Stops the scheduler when the thread exits, including by panic, so later draws are
/// rejected instead of waiting on a dead thread.
struct StopGuard(Arc<FrameScheduler>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.shut_down();
    }
}

/// Spawn the named render thread.
pub fn spawn(
    name: String,
    core: RenderCore,
    commands: Receiver<RenderCommand>,
    scheduler: Arc<FrameScheduler>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name(name).spawn(move || {
        let _guard = StopGuard(Arc::clone(&scheduler));
        run(core, &commands, &scheduler);
    })
}

fn run(mut core: RenderCore, commands: &Receiver<RenderCommand>, scheduler: &FrameScheduler) {
    log::debug!("render thread started");
    while let Ok(command) = commands.recv() {
        match command {
            RenderCommand::Frame => {
                if !run_frames(&mut core, commands, scheduler) {
                    break;
                }
            }
            RenderCommand::Shutdown => break,
            other => apply(&mut core, other),
        }
    }
    log::debug!("render thread exiting after {} frames", core.frame_number());
}

fn apply(core: &mut RenderCore, command: RenderCommand) {
    if let Err(err) = core.apply(command) {
        log::error!("render command failed: {err}");
    }
}

/// Render until the scheduler goes idle. Returns false once `Shutdown` was seen; the
/// frames already requested still complete first.
fn run_frames(
    core: &mut RenderCore,
    commands: &Receiver<RenderCommand>,
    scheduler: &FrameScheduler,
) -> bool {
    let mut running = true;
    let mut advance = true;
    loop {
        if !scheduler.begin_frame() {
            return running;
        }
        // Drained after begin_frame: a draw that coalesced into this frame posted its
        // state before the frame left FrameRequested.
        loop {
            match commands.try_recv() {
                Ok(RenderCommand::Shutdown) => running = false,
                // Frames are only posted from Idle, so none can be queued here.
                Ok(RenderCommand::Frame) => {}
                Ok(command) => apply(core, command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let deferred = core.render_frame(advance);
        match scheduler.finish_frame(deferred) {
            NextFrame::None => return running,
            NextFrame::Requested => advance = true,
            NextFrame::Continuation => advance = false,
        }
    }
}
