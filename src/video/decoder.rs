//! Demux/decode adapter using FFmpeg
//!
//! Reads one compressed packet at a time from the container, feeds the packets
//! of the selected video stream to the decoder and hands back decoded pictures
//! in the order the decoder emits them (presentation order).

use std::path::Path;

use super::stream::{PixelAspect, StreamDescriptor, Timebase};
use super::PlaybackError;

/// Default number of consecutive failed decode attempts before giving up
pub const DEFAULT_MAX_DECODE_RETRIES: u32 = 32;

/// Decoder tuning
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Consecutive failures without a decoded picture before `Decode` is raised
    pub max_decode_retries: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_decode_retries: DEFAULT_MAX_DECODE_RETRIES,
        }
    }
}

/// Where the decoder is in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainState {
    /// Packets are still being read from the container
    Reading,
    /// The container is exhausted and EOF has been sent to the decoder
    Flushing,
    /// The decoder has returned everything it had
    Finished,
}

/// Video decoder reading pictures from a media container
pub struct VideoDecoder {
    /// The input format context
    input: ffmpeg_next::format::context::Input,
    /// Video decoder
    decoder: ffmpeg_next::decoder::Video,
    /// Metadata of the selected stream
    descriptor: StreamDescriptor,
    /// Path, kept for diagnostics
    path: String,
    /// Packet the decoder refused with EAGAIN, resubmitted after draining
    pending: Option<ffmpeg_next::Packet>,
    /// Consecutive failures since the last decoded picture
    failed_attempts: u32,
    /// Tuning
    config: DecoderConfig,
    state: DrainState,
    /// Number of pictures produced so far
    frames_decoded: u64,
}

impl VideoDecoder {
    /// Open a container and prepare a decoder for its best video stream
    pub fn open<P: AsRef<Path>>(path: P, config: &DecoderConfig) -> Result<Self, PlaybackError> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        ffmpeg_next::init().map_err(|source| PlaybackError::Container {
            path: path_str.clone(),
            source,
        })?;
        ffmpeg_next::util::log::set_flags(ffmpeg_next::util::log::Flags::SKIP_REPEATED);

        // Opening also probes stream info, so malformed files fail here
        let input = ffmpeg_next::format::input(path).map_err(|source| PlaybackError::Container {
            path: path_str.clone(),
            source,
        })?;

        let video_stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| PlaybackError::NoVideoStream(path_str.clone()))?;

        let index = video_stream.index();
        let timebase = Timebase::from(video_stream.time_base());

        let frame_rate = video_stream.avg_frame_rate();
        let frame_rate = if frame_rate.denominator() > 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            0.0
        };

        let duration = if video_stream.duration() > 0 {
            timebase.seconds(video_stream.duration())
        } else if input.duration() > 0 {
            input.duration() as f64 / ffmpeg_next::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let parameters = video_stream.parameters();
        let codec_id = parameters.id();
        let codec_name = ffmpeg_next::decoder::find(codec_id)
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| format!("{:?}", codec_id).to_lowercase());

        let context = ffmpeg_next::codec::context::Context::from_parameters(parameters).map_err(|e| {
            PlaybackError::UnsupportedCodec {
                codec: codec_name.clone(),
                reason: e.to_string(),
            }
        })?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| PlaybackError::UnsupportedCodec {
                codec: codec_name.clone(),
                reason: e.to_string(),
            })?;

        let aspect = decoder.aspect_ratio();
        let descriptor = StreamDescriptor {
            index,
            width: decoder.width(),
            height: decoder.height(),
            pixel_aspect: PixelAspect::new(aspect.numerator(), aspect.denominator()),
            timebase,
            frame_rate,
            duration,
            codec_name,
            pixel_format: format!("{:?}", decoder.format()),
        };

        tracing::info!(
            "Opened video: {}x{} @ {:.2}fps, duration: {:.2}s, codec: {}, format: {}, timebase: {}/{}",
            descriptor.width,
            descriptor.height,
            descriptor.frame_rate,
            descriptor.duration,
            descriptor.codec_name,
            descriptor.pixel_format,
            descriptor.timebase.num,
            descriptor.timebase.den
        );

        Ok(Self {
            input,
            decoder,
            descriptor,
            path: path_str,
            pending: None,
            failed_attempts: 0,
            config: config.clone(),
            state: DrainState::Reading,
            frames_decoded: 0,
        })
    }

    /// Decode the next picture into `frame`
    ///
    /// Returns `Ok(false)` once the stream is exhausted and the decoder has
    /// been drained.
    pub fn next_frame(&mut self, frame: &mut ffmpeg_next::frame::Video) -> Result<bool, PlaybackError> {
        loop {
            if self.state == DrainState::Finished {
                return Ok(false);
            }

            // Drain everything the decoder already holds before reading more input
            match self.decoder.receive_frame(frame) {
                Ok(()) => {
                    self.failed_attempts = 0;
                    self.frames_decoded += 1;
                    return Ok(true);
                }
                Err(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                }) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    self.state = DrainState::Finished;
                    tracing::debug!("Decoder drained after {} frames", self.frames_decoded);
                    return Ok(false);
                }
                Err(e) => {
                    self.record_failure(&e)?;
                    continue;
                }
            }

            if self.state == DrainState::Flushing {
                // EAGAIN after EOF means the decoder will not produce anything else
                self.state = DrainState::Finished;
                return Ok(false);
            }

            self.feed()?;
        }
    }

    /// Submit one video packet (or EOF) to the decoder
    fn feed(&mut self) -> Result<(), PlaybackError> {
        let packet = match self.pending.take() {
            Some(packet) => packet,
            None => match self.read_video_packet()? {
                Some(packet) => packet,
                None => {
                    tracing::trace!("End of container, flushing decoder");
                    self.state = DrainState::Flushing;
                    if let Err(e) = self.decoder.send_eof() {
                        tracing::warn!("Failed to flush decoder: {}", e);
                        self.state = DrainState::Finished;
                    }
                    return Ok(());
                }
            },
        };

        match self.decoder.send_packet(&packet) {
            Ok(()) => Ok(()),
            Err(ffmpeg_next::Error::Other {
                errno: ffmpeg_next::error::EAGAIN,
            }) => {
                // Output must be drained first; keep the packet for the next round
                self.pending = Some(packet);
                self.record_failure(&ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                })
            }
            Err(e) => {
                tracing::warn!("Dropping undecodable packet (pts {:?}): {}", packet.pts(), e);
                self.record_failure(&e)
            }
        }
    }

    /// Read packets until one belongs to the selected stream
    fn read_video_packet(&mut self) -> Result<Option<ffmpeg_next::Packet>, PlaybackError> {
        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.descriptor.index {
                        return Ok(Some(packet));
                    }
                    // Other streams are dropped here, releasing the packet
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                }) => {}
                Err(source) => {
                    return Err(PlaybackError::Container {
                        path: self.path.clone(),
                        source,
                    });
                }
            }
        }
    }

    /// Count a failed attempt and escalate once progress has stalled
    fn record_failure(&mut self, error: &ffmpeg_next::Error) -> Result<(), PlaybackError> {
        self.failed_attempts += 1;
        if self.failed_attempts > self.config.max_decode_retries {
            return Err(PlaybackError::Decode {
                attempts: self.failed_attempts,
                last: error.to_string(),
            });
        }
        Ok(())
    }

    /// Metadata of the selected stream
    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    /// Pixel format the decoder currently outputs
    pub fn format(&self) -> ffmpeg_next::format::Pixel {
        self.decoder.format()
    }

    /// Number of pictures decoded so far
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}
