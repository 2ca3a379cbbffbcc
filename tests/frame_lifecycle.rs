// Frame lifecycle scenarios driven through the public API with a fake
// swapchain that tracks generations and image counts.

use anyhow::Result;
use vk_triangle::backend::{stale_outcome, PerImageCounts};
use vk_triangle::frame::{
    AcquireOutcome, FrameBackend, FrameLoop, FrameOutcome, PresentOutcome, RebuildOutcome,
};

/// Fake presentation engine. Each rebuild creates a new generation; images
/// from an old generation must never be presented.
struct FakeSwapchain {
    extent: (u32, u32),
    image_count: u32,
    /// Image count the surface hands out on the next rebuild
    next_image_count: u32,
    image_views: usize,
    framebuffers: usize,
    command_buffers: usize,
    generation: u32,
    built: bool,
    next_image: u32,
    /// Acquires left before the chain reports out of date
    out_of_date_after_acquires: Option<u32>,
    suboptimal_presents: u32,
    presented: Vec<(u32, u32)>,
    submitted_without_acquire: bool,
    acquired: Option<u32>,
}

impl FakeSwapchain {
    fn new(width: u32, height: u32) -> Self {
        Self {
            extent: (width, height),
            image_count: 3,
            next_image_count: 3,
            image_views: 0,
            framebuffers: 0,
            command_buffers: 0,
            generation: 0,
            built: false,
            next_image: 0,
            out_of_date_after_acquires: None,
            suboptimal_presents: 0,
            presented: Vec::new(),
            submitted_without_acquire: false,
            acquired: None,
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.extent = (width, height);
    }

    fn counts(&self) -> PerImageCounts {
        PerImageCounts {
            images: self.image_count as usize,
            image_views: self.image_views,
            framebuffers: self.framebuffers,
            command_buffers: self.command_buffers,
        }
    }
}

impl FrameBackend for FakeSwapchain {
    fn acquire_image(&mut self) -> Result<AcquireOutcome> {
        assert!(self.built, "acquire without a swapchain");
        if let Some(outcome) = stale_outcome(Some(self.counts())) {
            return Ok(outcome);
        }
        if let Some(n) = self.out_of_date_after_acquires.as_mut() {
            if *n == 0 {
                return Ok(AcquireOutcome::OutOfDate);
            }
            *n -= 1;
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.acquired = Some(image_index);
        Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal: false,
        })
    }

    fn submit(&mut self, image_index: u32) -> Result<()> {
        if self.acquired != Some(image_index) {
            self.submitted_without_acquire = true;
        }
        Ok(())
    }

    fn present(&mut self, image_index: u32) -> Result<PresentOutcome> {
        assert!(image_index < self.image_count);
        self.acquired = None;
        self.presented.push((self.generation, image_index));
        if self.suboptimal_presents > 0 {
            self.suboptimal_presents -= 1;
            return Ok(PresentOutcome::Suboptimal);
        }
        Ok(PresentOutcome::Presented)
    }

    fn rebuild(&mut self) -> Result<RebuildOutcome> {
        self.built = false;
        self.image_views = 0;
        self.framebuffers = 0;
        self.command_buffers = 0;
        if self.extent.0 == 0 || self.extent.1 == 0 {
            return Ok(RebuildOutcome::ZeroExtent);
        }
        self.generation += 1;
        self.image_count = self.next_image_count;
        self.image_views = self.image_count as usize;
        self.framebuffers = self.image_count as usize;
        self.command_buffers = self.image_count as usize;
        self.next_image = 0;
        self.out_of_date_after_acquires = None;
        self.built = true;
        Ok(RebuildOutcome::Rebuilt {
            image_count: self.image_count as usize,
        })
    }
}

#[test]
fn steady_frames_cycle_through_images() {
    let mut chain = FakeSwapchain::new(800, 600);
    let mut frames = FrameLoop::new();

    for _ in 0..6 {
        frames.draw_frame(&mut chain).unwrap();
    }

    let indices: Vec<u32> = chain.presented.iter().map(|&(_, i)| i).collect();
    assert_eq!(indices, vec![0, 1, 2, 0, 1, 2]);
    assert_eq!(chain.generation, 1);
    assert!(!chain.submitted_without_acquire);
}

#[test]
fn suboptimal_present_rebuilds_before_next_present() {
    let mut chain = FakeSwapchain::new(800, 600);
    let mut frames = FrameLoop::new();
    frames.draw_frame(&mut chain).unwrap();

    chain.suboptimal_presents = 1;
    frames.draw_frame(&mut chain).unwrap();
    assert!(frames.needs_rebuild());

    frames.draw_frame(&mut chain).unwrap();
    let (generation, index) = *chain.presented.last().unwrap();
    assert_eq!(generation, 2);
    assert_eq!(index, 0);
    assert!(!frames.needs_rebuild());
}

#[test]
fn out_of_date_acquire_drops_frame_then_recovers() {
    let mut chain = FakeSwapchain::new(800, 600);
    let mut frames = FrameLoop::new();
    frames.draw_frame(&mut chain).unwrap();
    chain.out_of_date_after_acquires = Some(0);

    assert_eq!(frames.draw_frame(&mut chain).unwrap(), FrameOutcome::Stale);
    assert_eq!(chain.presented.len(), 1);

    assert_eq!(
        frames.draw_frame(&mut chain).unwrap(),
        FrameOutcome::Presented { image_index: 0 }
    );
    assert_eq!(chain.presented.last(), Some(&(2, 0)));
}

#[test]
fn minimize_and_restore() {
    let mut chain = FakeSwapchain::new(800, 600);
    let mut frames = FrameLoop::new();
    frames.draw_frame(&mut chain).unwrap();

    chain.resize(0, 0);
    frames.request_rebuild();
    for _ in 0..3 {
        assert_eq!(
            frames.draw_frame(&mut chain).unwrap(),
            FrameOutcome::SurfaceUnavailable
        );
    }
    assert_eq!(chain.presented.len(), 1);
    assert!(!frames.surface_available());

    chain.resize(1024, 768);
    frames.request_rebuild();
    assert_eq!(
        frames.draw_frame(&mut chain).unwrap(),
        FrameOutcome::Presented { image_index: 0 }
    );
    assert_eq!(chain.generation, 2);
    assert_eq!(frames.rebuilds(), 2);
}

#[test]
fn starting_minimized_builds_on_first_real_size() {
    let mut chain = FakeSwapchain::new(0, 0);
    let mut frames = FrameLoop::new();

    assert!(!frames.ensure_built(&mut chain).unwrap());
    assert_eq!(frames.rebuilds(), 0);

    chain.resize(640, 480);
    assert!(frames.ensure_built(&mut chain).unwrap());
    assert_eq!(frames.rebuilds(), 1);
    assert_eq!(frames.frames_presented(), 0);
}

#[test]
fn presented_images_always_belong_to_current_generation() {
    let mut chain = FakeSwapchain::new(800, 600);
    let mut frames = FrameLoop::new();

    for round in 0..5u32 {
        if round % 2 == 1 {
            chain.suboptimal_presents = 1;
        }
        for _ in 0..4 {
            frames.draw_frame(&mut chain).unwrap();
        }
    }

    // Generations never go backwards
    let generations: Vec<u32> = chain.presented.iter().map(|&(g, _)| g).collect();
    assert!(generations.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(frames.frames_presented(), 20);
    assert_eq!(frames.rebuilds(), chain.generation as u64);
}

#[test]
fn per_image_resources_follow_image_count_across_rebuilds() {
    let mut chain = FakeSwapchain::new(800, 600);
    let mut frames = FrameLoop::new();

    for (image_count, size) in [(3, (800, 600)), (2, (640, 480)), (4, (1920, 1080))] {
        chain.next_image_count = image_count;
        chain.resize(size.0, size.1);
        frames.request_rebuild();

        for _ in 0..image_count {
            assert!(matches!(
                frames.draw_frame(&mut chain).unwrap(),
                FrameOutcome::Presented { .. }
            ));
        }

        let counts = chain.counts();
        assert!(counts.is_consistent(), "{:?}", counts);
        assert_eq!(counts.images, image_count as usize);
        assert_eq!(counts.framebuffers, image_count as usize);
    }

    assert_eq!(frames.rebuilds(), 3);
    assert_eq!(chain.presented.last(), Some(&(3, 3)));
}

#[test]
fn mismatched_targets_are_treated_as_out_of_date() {
    let mut chain = FakeSwapchain::new(800, 600);
    let mut frames = FrameLoop::new();
    frames.draw_frame(&mut chain).unwrap();

    // A framebuffer went missing behind the loop's back
    chain.framebuffers -= 1;
    assert_eq!(frames.draw_frame(&mut chain).unwrap(), FrameOutcome::Stale);
    assert_eq!(chain.presented.len(), 1);
    assert!(frames.needs_rebuild());

    assert_eq!(
        frames.draw_frame(&mut chain).unwrap(),
        FrameOutcome::Presented { image_index: 0 }
    );
    assert!(chain.counts().is_consistent());
    assert_eq!(chain.generation, 2);
}
