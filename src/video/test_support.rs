//! GPU-free doubles for the playback tests

use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::backend::{PlaneUpload, RenderBackend};
use super::frame::{plane_size, PictureBuffer, PlanarPicture, PlaneIndex};
use super::geometry::QuadVertex;
use super::pacing::Clock;
use super::pipeline::PictureSource;
use super::stream::{PixelAspect, StreamDescriptor, Timebase};
use super::PlaybackError;

/// One recorded backend operation: plane, width, height, stride
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Allocate(PlaneIndex, u32, u32, usize),
    Update(PlaneIndex, u32, u32, usize),
    WriteQuad,
    Bind,
    Draw,
}

/// Backend that records every call instead of touching a GPU
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<BackendCall>,
    pub quad_writes: Vec<[QuadVertex; 4]>,
    /// First luma byte of every plane write, to check which picture was uploaded
    pub first_luma: Vec<u8>,
}

impl RecordingBackend {
    pub fn allocations(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Allocate(..)))
    }

    pub fn updates(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Update(..)))
    }

    pub fn draws(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Draw))
    }

    fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    fn record_luma(&mut self, plane: PlaneIndex, upload: &PlaneUpload<'_>) {
        if plane == PlaneIndex::Y {
            self.first_luma.push(upload.data.first().copied().unwrap_or_default());
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn allocate_plane(&mut self, plane: PlaneIndex, upload: &PlaneUpload<'_>) {
        self.record_luma(plane, upload);
        self.calls
            .push(BackendCall::Allocate(plane, upload.width, upload.height, upload.stride));
    }

    fn update_plane(&mut self, plane: PlaneIndex, upload: &PlaneUpload<'_>) {
        self.record_luma(plane, upload);
        self.calls
            .push(BackendCall::Update(plane, upload.width, upload.height, upload.stride));
    }

    fn bind_planes(&mut self) {
        self.calls.push(BackendCall::Bind);
    }

    fn write_quad(&mut self, vertices: &[QuadVertex; 4]) {
        self.calls.push(BackendCall::WriteQuad);
        self.quad_writes.push(*vertices);
    }

    fn draw(&mut self) -> Result<(), PlaybackError> {
        self.calls.push(BackendCall::Draw);
        Ok(())
    }
}

#[derive(Debug)]
struct ManualClockState {
    now: Instant,
    sleeps: Vec<Duration>,
}

/// Clock that only moves when told to; sleeping advances it instantly
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Rc<RefCell<ManualClockState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ManualClockState {
                now: Instant::now(),
                sleeps: Vec::new(),
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.state.borrow_mut().now += duration;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.borrow().sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.state.borrow().sleeps.iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.borrow().now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.borrow_mut();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

/// Picture source producing flat-colored frames at a fixed rate
///
/// The timebase is one tick per frame. Each frame's luma is `index % 256`,
/// so tests can tell which frame was uploaded. Frames from `resize_at` onward use `resized` dimensions.
pub struct SyntheticSource {
    descriptor: StreamDescriptor,
    buffer: PictureBuffer,
    resized: Option<(usize, PictureBuffer)>,
    frame_count: usize,
    next: usize,
    /// Fails with this error once `next` reaches the index
    fail_at: Option<(usize, PlaybackError)>,
    /// Clock advanced by the given amount for every picture produced
    decode_cost: Option<(ManualClock, Duration)>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, frame_count: usize, fps: i32) -> Self {
        let descriptor = StreamDescriptor {
            index: 0,
            width,
            height,
            pixel_aspect: PixelAspect::SQUARE,
            timebase: Timebase::new(1, fps),
            frame_rate: fps as f64,
            duration: frame_count as f64 / fps as f64,
            codec_name: "synthetic".to_string(),
            pixel_format: "yuv420p".to_string(),
        };

        Self {
            descriptor,
            buffer: PictureBuffer::new(width, height, 32),
            resized: None,
            frame_count,
            next: 0,
            fail_at: None,
            decode_cost: None,
        }
    }

    pub fn with_pixel_aspect(mut self, aspect: PixelAspect) -> Self {
        self.descriptor.pixel_aspect = aspect;
        self
    }

    /// Switch to a new size starting at frame `index`
    pub fn resize_at(mut self, index: usize, width: u32, height: u32) -> Self {
        self.resized = Some((index, PictureBuffer::new(width, height, 32)));
        self
    }

    pub fn fail_at(mut self, index: usize, error: PlaybackError) -> Self {
        self.fail_at = Some((index, error));
        self
    }

    /// Make every picture take `cost` of `clock` time to produce
    pub fn with_decode_cost(mut self, clock: ManualClock, cost: Duration) -> Self {
        self.decode_cost = Some((clock, cost));
        self
    }

    pub fn produced(&self) -> usize {
        self.next
    }
}

impl PictureSource for SyntheticSource {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn next_picture(&mut self) -> Result<Option<PlanarPicture<'_>>, PlaybackError> {
        if let Some((index, _)) = &self.fail_at {
            if self.next >= *index {
                if let Some((_, error)) = self.fail_at.take() {
                    return Err(error);
                }
            }
        }
        if self.next >= self.frame_count {
            return Ok(None);
        }

        let index = self.next;
        self.next += 1;
        if let Some((clock, cost)) = &self.decode_cost {
            clock.advance(*cost);
        }

        let buffer = match &mut self.resized {
            Some((from, resized)) if index >= *from => resized,
            _ => &mut self.buffer,
        };
        buffer.fill(PlaneIndex::Y, (index % 256) as u8);
        buffer.fill(PlaneIndex::U, 128);
        buffer.fill(PlaneIndex::V, 128);
        buffer.set_pts(Some(index as i64));

        Ok(Some(buffer.as_picture()))
    }
}

/// Write an uncompressed YUV4MPEG2 file of `frame_count` 4:2:0 frames
///
/// Frame `i` has luma `i % 256`, like [`SyntheticSource`].
pub fn write_y4m(path: &Path, width: u32, height: u32, frame_count: usize, fps: u32) {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path).unwrap());
    writeln!(file, "YUV4MPEG2 W{width} H{height} F{fps}:1 Ip A1:1 C420jpeg").unwrap();

    let plane_len = |plane| {
        let (w, h) = plane_size(plane, width, height);
        w as usize * h as usize
    };
    for index in 0..frame_count {
        file.write_all(b"FRAME\n").unwrap();
        file.write_all(&vec![(index % 256) as u8; plane_len(PlaneIndex::Y)]).unwrap();
        file.write_all(&vec![128u8; plane_len(PlaneIndex::U)]).unwrap();
        file.write_all(&vec![128u8; plane_len(PlaneIndex::V)]).unwrap();
    }
    file.flush().unwrap();
}
