//! Per-frame playback pipeline
//!
//! One [`PlaybackPipeline::step`] takes the next picture from the source,
//! uploads it, draws it and sleeps until its presentation time. The host
//! presents the drawn frame and pumps window events between steps.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::backend::RenderBackend;
use super::convert::{ColorConverter, ScalerQuality};
use super::decoder::{DecoderConfig, VideoDecoder};
use super::frame::PlanarPicture;
use super::pacing::{Clock, FramePacer, SystemClock};
use super::stream::{StreamDescriptor, Timebase};
use super::upload::{DisplayState, TextureUploader};
use super::PlaybackError;
use crate::telemetry::PlaybackStats;

/// Producer of converted pictures in presentation order
pub trait PictureSource {
    fn descriptor(&self) -> &StreamDescriptor;

    /// The next picture, or `None` once the stream is exhausted
    ///
    /// The returned view borrows the source and must be consumed before the
    /// next call.
    fn next_picture(&mut self) -> Result<Option<PlanarPicture<'_>>, PlaybackError>;
}

/// Decoder and color converter chained together
pub struct FfmpegSource {
    decoder: VideoDecoder,
    converter: ColorConverter,
    /// Decoded picture, reused for every frame
    frame: ffmpeg_next::frame::Video,
}

impl FfmpegSource {
    /// Open `path` and set up decoding and conversion for its video stream
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: &DecoderConfig,
        quality: ScalerQuality,
    ) -> Result<Self, PlaybackError> {
        let decoder = VideoDecoder::open(path, config)?;
        let converter = ColorConverter::new(decoder.descriptor(), decoder.format(), quality)?;

        Ok(Self {
            decoder,
            converter,
            frame: ffmpeg_next::frame::Video::empty(),
        })
    }
}

impl PictureSource for FfmpegSource {
    fn descriptor(&self) -> &StreamDescriptor {
        self.decoder.descriptor()
    }

    fn next_picture(&mut self) -> Result<Option<PlanarPicture<'_>>, PlaybackError> {
        if !self.decoder.next_frame(&mut self.frame)? {
            return Ok(None);
        }
        self.converter.convert(&self.frame).map(Some)
    }
}

/// Shared stop request, set by the host and checked by the pipeline
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What to do with a frame that is already past its due time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LateFramePolicy {
    /// Present every frame, late ones immediately
    #[default]
    Present,
    /// Skip frames later than the threshold without uploading them
    Drop { threshold_ms: u64 },
}

/// Result of one pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A frame was uploaded, drawn and paced
    Presented,
    /// The source has no more pictures
    EndOfStream,
    /// The cancellation token was set; nothing was uploaded
    Cancelled,
}

impl StepOutcome {
    /// Whether the host should keep stepping
    pub fn has_more(self) -> bool {
        self == StepOutcome::Presented
    }
}

/// Decode, upload, draw and pace, one frame per step
pub struct PlaybackPipeline<S: PictureSource, C: Clock = SystemClock> {
    source: S,
    uploader: TextureUploader,
    state: DisplayState,
    pacer: FramePacer<C>,
    policy: LateFramePolicy,
    stats: PlaybackStats,
    timebase: Timebase,
    /// Due time of the previous frame, used for pictures without a timestamp
    last_target: f64,
}

impl<S: PictureSource> PlaybackPipeline<S, SystemClock> {
    pub fn new(source: S, policy: LateFramePolicy) -> Self {
        Self::with_clock(source, policy, SystemClock)
    }
}

impl<S: PictureSource, C: Clock> PlaybackPipeline<S, C> {
    pub fn with_clock(source: S, policy: LateFramePolicy, clock: C) -> Self {
        let timebase = source.descriptor().timebase;

        Self {
            source,
            uploader: TextureUploader::new(),
            state: DisplayState::new(),
            pacer: FramePacer::new(clock),
            policy,
            stats: PlaybackStats::new(),
            timebase,
            last_target: 0.0,
        }
    }

    /// Run one frame through the pipeline
    ///
    /// Cancellation is checked before decoding and again before any texture
    /// is touched, so a cancelled step never leaves a half-uploaded frame.
    pub fn step(
        &mut self,
        backend: &mut impl RenderBackend,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, PlaybackError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(StepOutcome::Cancelled);
            }
            // Fixed at the first step, before anything has been decoded
            self.pacer.start();

            let Some(picture) = self.source.next_picture()? else {
                tracing::debug!("End of stream after {} frames", self.stats.frames_total());
                return Ok(StepOutcome::EndOfStream);
            };

            if cancel.is_cancelled() {
                return Ok(StepOutcome::Cancelled);
            }

            let target = match picture.pts {
                Some(pts) => self.timebase.seconds(pts),
                None => self.last_target,
            };
            self.last_target = target;

            if let LateFramePolicy::Drop { threshold_ms } = self.policy {
                let lateness = self.pacer.lateness(target);
                if lateness > Duration::from_millis(threshold_ms) {
                    tracing::trace!("Dropping frame at {:.3}s, {:?} late", target, lateness);
                    self.stats.record_dropped(lateness);
                    continue;
                }
            }

            let upload = self.uploader.upload(&picture, &mut self.state, backend);
            backend.draw()?;
            let pace = self.pacer.pace(target);

            tracing::trace!(
                "Frame {} at {:.3}s: waited {:?}, late {:?}",
                self.stats.frames_presented,
                target,
                pace.waited,
                pace.lateness
            );
            self.stats.record_presented(&upload, &pace);
            return Ok(StepOutcome::Presented);
        }
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        self.source.descriptor()
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    pub fn display_state(&self) -> &DisplayState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pacer(&self) -> &FramePacer<C> {
        &self.pacer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ViewerSettings;
    use crate::video::pacing::Clock;
    use crate::video::stream::PixelAspect;
    use crate::video::test_support::{write_y4m, BackendCall, ManualClock, RecordingBackend, SyntheticSource};

    fn run_to_end<S: PictureSource>(
        pipeline: &mut PlaybackPipeline<S, ManualClock>,
        backend: &mut RecordingBackend,
    ) -> usize {
        let cancel = CancellationToken::new();
        let mut presented = 0;
        while pipeline.step(backend, &cancel).unwrap().has_more() {
            presented += 1;
        }
        presented
    }

    #[test]
    fn test_sixty_frames_reallocate_once() {
        let clock = ManualClock::new();
        let source = SyntheticSource::new(320, 240, 60, 30);
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, clock.clone());
        let mut backend = RecordingBackend::default();

        let presented = run_to_end(&mut pipeline, &mut backend);

        assert_eq!(presented, 60);
        assert_eq!(backend.allocations(), 3);
        assert_eq!(backend.updates(), 59 * 3);
        assert_eq!(backend.quad_writes.len(), 1);
        assert_eq!(backend.draws(), 60);

        let stats = pipeline.stats();
        assert_eq!(stats.frames_presented, 60);
        assert_eq!(stats.texture_reallocations, 1);
        assert_eq!(stats.partial_updates, 59);
        assert_eq!(stats.geometry_updates, 1);

        // Frame 59 is due at 59/30 s and the clock only moves by sleeping
        let expected = 59.0 / 30.0;
        assert!((pipeline.pacer().elapsed().as_secs_f64() - expected).abs() < 1e-3);
        assert_eq!(clock.sleeps().len(), 59);
        assert!((clock.total_slept().as_secs_f64() - expected).abs() < 1e-3);

        // Once exhausted the stream stays exhausted
        let cancel = CancellationToken::new();
        assert_eq!(pipeline.step(&mut backend, &cancel).unwrap(), StepOutcome::EndOfStream);
    }

    #[test]
    fn test_step_order_is_upload_then_draw() {
        let source = SyntheticSource::new(64, 64, 2, 30);
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, ManualClock::new());
        let mut backend = RecordingBackend::default();
        let cancel = CancellationToken::new();

        assert_eq!(pipeline.step(&mut backend, &cancel).unwrap(), StepOutcome::Presented);
        assert_eq!(backend.calls.last(), Some(&BackendCall::Draw));
        assert_eq!(backend.calls[backend.calls.len() - 2], BackendCall::Bind);
    }

    #[test]
    fn test_cancelled_before_start_touches_nothing() {
        let source = SyntheticSource::new(320, 240, 10, 30);
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, ManualClock::new());
        let mut backend = RecordingBackend::default();

        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(pipeline.step(&mut backend, &cancel).unwrap(), StepOutcome::Cancelled);
        assert!(!StepOutcome::Cancelled.has_more());
        assert!(backend.calls.is_empty());
        assert_eq!(pipeline.source().produced(), 0);
    }

    #[test]
    fn test_cancel_mid_playback_stops_cleanly() {
        let source = SyntheticSource::new(320, 240, 10, 30);
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, ManualClock::new());
        let mut backend = RecordingBackend::default();
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            assert!(pipeline.step(&mut backend, &cancel).unwrap().has_more());
        }
        let cloned = cancel.clone();
        cloned.cancel();
        assert!(cancel.is_cancelled());

        let calls_before = backend.calls.len();
        assert_eq!(pipeline.step(&mut backend, &cancel).unwrap(), StepOutcome::Cancelled);
        assert_eq!(backend.calls.len(), calls_before);
        assert_eq!(backend.draws(), 3);
    }

    #[test]
    fn test_dimension_change_reallocates() {
        let source = SyntheticSource::new(320, 240, 6, 30).resize_at(3, 640, 360);
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, ManualClock::new());
        let mut backend = RecordingBackend::default();

        assert_eq!(run_to_end(&mut pipeline, &mut backend), 6);
        assert_eq!(backend.allocations(), 6);
        assert_eq!(backend.updates(), 4 * 3);
        assert_eq!(pipeline.stats().texture_reallocations, 2);
        assert_eq!(pipeline.display_state().textures.size(), Some((640, 360)));
    }

    #[test]
    fn test_anamorphic_stream_keeps_display_aspect() {
        let source = SyntheticSource::new(720, 576, 1, 25).with_pixel_aspect(PixelAspect::new(16, 11));
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, ManualClock::new());
        let mut backend = RecordingBackend::default();

        run_to_end(&mut pipeline, &mut backend);

        // The window is sized to the display aspect, so the quad fills it
        let (display_width, display_height) = pipeline.descriptor().display_size();
        let (window_width, window_height) = ViewerSettings::default().window_size(display_width, display_height);
        assert_eq!((window_width, window_height), (1047, 576));

        assert_eq!(backend.quad_writes.len(), 1);
        let [half_width, half_height, _] = backend.quad_writes[0][0].position;
        let on_screen = (half_width * window_width as f32) / (half_height * window_height as f32);
        let expected = 720.0 * 16.0 / 11.0 / 576.0;
        assert!((on_screen - expected).abs() < 1e-2, "on-screen aspect {on_screen}, expected {expected}");
    }

    #[test]
    fn test_clock_starts_before_first_decode() {
        let clock = ManualClock::new();
        let start = clock.now();
        let source = SyntheticSource::new(64, 64, 2, 30).with_decode_cost(clock.clone(), Duration::from_millis(50));
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, clock.clone());
        let mut backend = RecordingBackend::default();
        let cancel = CancellationToken::new();

        assert_eq!(pipeline.step(&mut backend, &cancel).unwrap(), StepOutcome::Presented);

        // Decoding frame 0 took 50 ms of a schedule that started at the step
        assert_eq!(pipeline.pacer().origin(), Some(start));
        assert_eq!(pipeline.stats().frames_late, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_late_frames_are_presented_by_default() {
        let clock = ManualClock::new();
        let source = SyntheticSource::new(64, 64, 4, 30);
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, clock.clone());
        let mut backend = RecordingBackend::default();
        let cancel = CancellationToken::new();

        pipeline.step(&mut backend, &cancel).unwrap();
        clock.advance(Duration::from_secs(1));

        assert_eq!(run_to_end(&mut pipeline, &mut backend), 3);
        assert_eq!(backend.draws(), 4);
        assert_eq!(pipeline.stats().frames_late, 3);
        assert_eq!(pipeline.stats().frames_dropped, 0);
    }

    #[test]
    fn test_drop_policy_skips_late_frames() {
        let clock = ManualClock::new();
        // 10 fps: frames due every 100 ms
        let source = SyntheticSource::new(64, 64, 10, 10);
        let policy = LateFramePolicy::Drop { threshold_ms: 150 };
        let mut pipeline = PlaybackPipeline::with_clock(source, policy, clock.clone());
        let mut backend = RecordingBackend::default();
        let cancel = CancellationToken::new();

        assert_eq!(pipeline.step(&mut backend, &cancel).unwrap(), StepOutcome::Presented);
        // Stall for half a second: frames 1..=3 are more than 150 ms late
        clock.advance(Duration::from_millis(500));

        assert_eq!(pipeline.step(&mut backend, &cancel).unwrap(), StepOutcome::Presented);
        assert_eq!(pipeline.stats().frames_dropped, 3);
        // Frame 4 (luma 4) was the one uploaded
        assert_eq!(backend.first_luma, vec![0, 4]);

        assert_eq!(run_to_end(&mut pipeline, &mut backend), 5);
        assert_eq!(pipeline.stats().frames_presented, 7);
        assert_eq!(pipeline.stats().frames_total(), 10);
    }

    #[test]
    fn test_source_error_is_fatal() {
        let source = SyntheticSource::new(64, 64, 10, 30).fail_at(
            2,
            PlaybackError::Decode {
                attempts: 33,
                last: "Invalid data found when processing input".to_string(),
            },
        );
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, ManualClock::new());
        let mut backend = RecordingBackend::default();
        let cancel = CancellationToken::new();

        pipeline.step(&mut backend, &cancel).unwrap();
        pipeline.step(&mut backend, &cancel).unwrap();
        let err = pipeline.step(&mut backend, &cancel).unwrap_err();
        assert_eq!(err.kind(), "DecodeError");
        assert_eq!(backend.draws(), 2);
    }

    #[test]
    fn test_missing_file_fails_before_any_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp4");

        let result = FfmpegSource::open(&path, &DecoderConfig::default(), ScalerQuality::default());
        assert!(matches!(result, Err(PlaybackError::Container { .. })));
    }

    #[test]
    fn test_decoded_file_plays_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("count.y4m");
        write_y4m(&path, 320, 240, 60, 30);

        let source = FfmpegSource::open(&path, &DecoderConfig::default(), ScalerQuality::default()).unwrap();
        assert_eq!(source.descriptor().timebase, Timebase::new(1, 30));

        let clock = ManualClock::new();
        let mut pipeline = PlaybackPipeline::with_clock(source, LateFramePolicy::Present, clock.clone());
        let mut backend = RecordingBackend::default();

        assert_eq!(run_to_end(&mut pipeline, &mut backend), 60);
        assert_eq!(backend.allocations(), 3);
        assert_eq!(backend.updates(), 177);
        assert_eq!(backend.quad_writes.len(), 1);
        assert_eq!(backend.draws(), 60);

        // Pacing followed pts 0..59 at 1/30 s per tick
        assert_eq!(clock.sleeps().len(), 59);
        assert!((clock.total_slept().as_secs_f64() - 59.0 / 30.0).abs() < 1e-3);
    }
}
