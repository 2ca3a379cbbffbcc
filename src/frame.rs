// Frame submission loop.
//
// `FrameLoop` drives one acquire → submit → present cycle per call and
// decides when the swapchain and everything built on it has to be thrown
// away and rebuilt. The actual Vulkan work sits behind `FrameBackend`, so
// the state machine can be exercised without a GPU.
//
//            redraw due
//   Idle ────────────────> Presenting
//    ^                        │
//    │  presented / stale     │
//    └────────────────────────┘
//
// Staleness (out-of-date or suboptimal) is the only condition handled here.
// Every error returned by the backend is fatal and goes straight to the
// caller.

use anyhow::Result;

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The image is ours and "image available" will be signaled.
    /// `suboptimal` images are still rendered and presented.
    Ready { image_index: u32, suboptimal: bool },
    /// Nothing was acquired, no semaphore was signaled
    OutOfDate,
}

/// Result of handing an image back to the presentation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    pub fn is_stale(self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Result of tearing down and recreating the swapchain and render targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    Rebuilt { image_count: usize },
    /// Drawable area is empty (minimized window). Nothing was built.
    ZeroExtent,
}

/// What a single `draw_frame` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// One image was presented. A rebuild may already be scheduled.
    Presented { image_index: u32 },
    /// Acquire reported the chain out of date; the frame was dropped and a
    /// rebuild is scheduled.
    Stale,
    /// Surface has no drawable area. Wait for a resize/expose event.
    SurfaceUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Waiting for a redraw-worthy event
    Idle,
    /// One frame in flight
    Presenting,
}

/// The operations the frame loop needs from the graphics backend.
pub trait FrameBackend {
    /// Acquire the next presentable image, waiting as long as it takes.
    fn acquire_image(&mut self) -> Result<AcquireOutcome>;

    /// Submit the pre-recorded work for `image_index`.
    fn submit(&mut self, image_index: u32) -> Result<()>;

    /// Present `image_index` once its rendering has finished.
    fn present(&mut self, image_index: u32) -> Result<PresentOutcome>;

    /// Destroy the render targets and swapchain, then build new ones
    /// for the current surface extent.
    fn rebuild(&mut self) -> Result<RebuildOutcome>;
}

#[derive(Debug)]
pub struct FrameLoop {
    state: FrameState,
    needs_rebuild: bool,
    surface_available: bool,
    rebuilds: u64,
    frames_presented: u64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    /// A fresh loop has nothing built yet, so the first frame rebuilds.
    pub fn new() -> Self {
        Self {
            state: FrameState::Idle,
            needs_rebuild: true,
            surface_available: false,
            rebuilds: 0,
            frames_presented: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// True when the next frame will start with a full rebuild
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// False after a rebuild found a zero-area surface
    pub fn surface_available(&self) -> bool {
        self.surface_available
    }

    /// Completed rebuilds, the initial build included
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// The window changed size or was exposed again
    pub fn request_rebuild(&mut self) {
        self.needs_rebuild = true;
    }

    /// Rebuild now if one is pending. Returns whether a swapchain exists
    /// afterwards.
    pub fn ensure_built<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> Result<bool> {
        if !self.needs_rebuild {
            return Ok(true);
        }

        match backend.rebuild()? {
            RebuildOutcome::Rebuilt { image_count } => {
                log::debug!("Frame loop rebuilt with {} images", image_count);
                self.needs_rebuild = false;
                self.surface_available = true;
                self.rebuilds += 1;
                Ok(true)
            }
            RebuildOutcome::ZeroExtent => {
                log::debug!("Surface has zero extent, waiting for resize");
                self.surface_available = false;
                Ok(false)
            }
        }
    }

    /// Render and present at most one frame.
    pub fn draw_frame<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<FrameOutcome> {
        if !self.ensure_built(backend)? {
            return Ok(FrameOutcome::SurfaceUnavailable);
        }

        self.state = FrameState::Presenting;
        let result = self.present_one(backend);
        self.state = FrameState::Idle;
        result
    }

    fn present_one<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> Result<FrameOutcome> {
        let (image_index, acquire_suboptimal) = match backend.acquire_image()? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire");
                self.needs_rebuild = true;
                return Ok(FrameOutcome::Stale);
            }
        };

        backend.submit(image_index)?;
        let presented = backend.present(image_index)?;
        self.frames_presented += 1;

        if acquire_suboptimal || presented.is_stale() {
            log::debug!(
                "Swapchain stale after frame (acquire suboptimal: {}, present: {:?})",
                acquire_suboptimal,
                presented
            );
            self.needs_rebuild = true;
        }

        Ok(FrameOutcome::Presented { image_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Acquire,
        Submit(u32),
        Present(u32),
        Rebuild,
    }

    /// Backend that replays scripted outcomes and records every call
    #[derive(Default)]
    struct ScriptedBackend {
        calls: Vec<Call>,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
        rebuilds: VecDeque<RebuildOutcome>,
        fail_submit: bool,
    }

    impl FrameBackend for ScriptedBackend {
        fn acquire_image(&mut self) -> Result<AcquireOutcome> {
            self.calls.push(Call::Acquire);
            Ok(self.acquires.pop_front().unwrap_or(AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: false,
            }))
        }

        fn submit(&mut self, image_index: u32) -> Result<()> {
            self.calls.push(Call::Submit(image_index));
            if self.fail_submit {
                anyhow::bail!("device lost");
            }
            Ok(())
        }

        fn present(&mut self, image_index: u32) -> Result<PresentOutcome> {
            self.calls.push(Call::Present(image_index));
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn rebuild(&mut self) -> Result<RebuildOutcome> {
            self.calls.push(Call::Rebuild);
            Ok(self
                .rebuilds
                .pop_front()
                .unwrap_or(RebuildOutcome::Rebuilt { image_count: 3 }))
        }
    }

    #[test]
    fn first_frame_builds_then_presents() {
        let mut backend = ScriptedBackend::default();
        let mut frames = FrameLoop::new();

        let outcome = frames.draw_frame(&mut backend).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { image_index: 0 });
        assert_eq!(
            backend.calls,
            vec![Call::Rebuild, Call::Acquire, Call::Submit(0), Call::Present(0)]
        );
        assert_eq!(frames.state(), FrameState::Idle);
        assert!(!frames.needs_rebuild());
    }

    #[test]
    fn steady_state_does_not_rebuild() {
        let mut backend = ScriptedBackend::default();
        let mut frames = FrameLoop::new();

        for _ in 0..3 {
            frames.draw_frame(&mut backend).unwrap();
        }

        let rebuilds = backend.calls.iter().filter(|c| **c == Call::Rebuild).count();
        assert_eq!(rebuilds, 1);
        assert_eq!(frames.frames_presented(), 3);
    }

    #[test]
    fn out_of_date_acquire_skips_submit_and_rebuilds_next() {
        let mut backend = ScriptedBackend::default();
        backend.acquires.push_back(AcquireOutcome::OutOfDate);
        let mut frames = FrameLoop::new();
        frames.ensure_built(&mut backend).unwrap();
        backend.calls.clear();

        let outcome = frames.draw_frame(&mut backend).unwrap();
        assert_eq!(outcome, FrameOutcome::Stale);
        assert_eq!(backend.calls, vec![Call::Acquire]);
        assert!(frames.needs_rebuild());

        backend.calls.clear();
        frames.draw_frame(&mut backend).unwrap();
        assert_eq!(backend.calls[0], Call::Rebuild);
    }

    #[test]
    fn suboptimal_acquire_finishes_the_frame_first() {
        let mut backend = ScriptedBackend::default();
        backend.acquires.push_back(AcquireOutcome::Ready {
            image_index: 2,
            suboptimal: true,
        });
        let mut frames = FrameLoop::new();
        frames.ensure_built(&mut backend).unwrap();
        backend.calls.clear();

        let outcome = frames.draw_frame(&mut backend).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { image_index: 2 });
        assert_eq!(
            backend.calls,
            vec![Call::Acquire, Call::Submit(2), Call::Present(2)]
        );
        assert!(frames.needs_rebuild());
    }

    #[test]
    fn zero_extent_blocks_frames_until_resize() {
        let mut backend = ScriptedBackend::default();
        backend.rebuilds.push_back(RebuildOutcome::ZeroExtent);
        backend.rebuilds.push_back(RebuildOutcome::ZeroExtent);
        let mut frames = FrameLoop::new();

        assert_eq!(
            frames.draw_frame(&mut backend).unwrap(),
            FrameOutcome::SurfaceUnavailable
        );
        assert_eq!(
            frames.draw_frame(&mut backend).unwrap(),
            FrameOutcome::SurfaceUnavailable
        );
        assert!(!frames.surface_available());
        assert!(!backend.calls.contains(&Call::Acquire));

        frames.request_rebuild();
        assert_eq!(
            frames.draw_frame(&mut backend).unwrap(),
            FrameOutcome::Presented { image_index: 0 }
        );
        assert!(frames.surface_available());
        assert_eq!(frames.rebuilds(), 1);
    }

    #[test]
    fn fatal_errors_propagate_and_leave_loop_idle() {
        let mut backend = ScriptedBackend {
            fail_submit: true,
            ..Default::default()
        };
        let mut frames = FrameLoop::new();

        let err = frames.draw_frame(&mut backend).unwrap_err();

        assert!(err.to_string().contains("device lost"));
        assert_eq!(frames.state(), FrameState::Idle);
        assert!(!backend.calls.iter().any(|c| matches!(c, Call::Present(_))));
    }

    #[test]
    fn resize_request_forces_rebuild() {
        let mut backend = ScriptedBackend::default();
        let mut frames = FrameLoop::new();
        frames.draw_frame(&mut backend).unwrap();

        frames.request_rebuild();
        backend.calls.clear();
        frames.draw_frame(&mut backend).unwrap();

        assert_eq!(backend.calls[0], Call::Rebuild);
        assert_eq!(frames.rebuilds(), 2);
    }

    #[test]
    fn present_outcome_staleness() {
        assert!(!PresentOutcome::Presented.is_stale());
        assert!(PresentOutcome::Suboptimal.is_stale());
        assert!(PresentOutcome::OutOfDate.is_stale());
    }
}
