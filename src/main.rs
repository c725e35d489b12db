//! Immersive Viewer - Main Entry Point
//!
//! Plays the video stream of a media file in a window, paced by the stream's
//! presentation timestamps.
//!
//! Usage: immersive-viewer <video_file>

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use immersive_viewer::telemetry::init_logging;
use immersive_viewer::video::{CancellationToken, FfmpegSource, PlaybackError, PlaybackPipeline, StepOutcome, YuvRenderer};
use immersive_viewer::{GpuContext, ViewerSettings};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Immersive Viewer";

/// Window and renderer, created once the event loop is running
struct Presentation {
    window: Arc<Window>,
    renderer: YuvRenderer,
}

struct ViewerApp {
    title: String,
    settings: ViewerSettings,
    pipeline: PlaybackPipeline<FfmpegSource>,
    cancel: CancellationToken,
    presentation: Option<Presentation>,
    /// Fatal error that ended playback
    error: Option<PlaybackError>,
}

impl ViewerApp {
    fn new(path: &Path, settings: ViewerSettings, pipeline: PlaybackPipeline<FfmpegSource>) -> Self {
        let title = format!(
            "{} - {}",
            WINDOW_TITLE,
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        Self {
            title,
            settings,
            pipeline,
            cancel: CancellationToken::new(),
            presentation: None,
            error: None,
        }
    }

    fn create_presentation(&self, event_loop: &ActiveEventLoop) -> Result<Presentation, PlaybackError> {
        // Non-square pixels are corrected by the window shape, not the quad
        let (display_width, display_height) = self.pipeline.descriptor().display_size();
        let (width, height) = self.settings.window_size(display_width, display_height);

        let window_attributes = WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(width, height));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .map_err(|e| PlaybackError::PresentationSetup(format!("Failed to create window: {}", e)))?,
        );

        let gpu = pollster::block_on(GpuContext::new(window.clone(), self.settings.vsync_enabled))?;
        let renderer = YuvRenderer::new(gpu);

        tracing::info!("Window {}x{} created", width, height);
        Ok(Presentation { window, renderer })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: PlaybackError) {
        tracing::error!(kind = error.kind(), "{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    /// Run one pipeline step and show the result
    fn advance(&mut self, event_loop: &ActiveEventLoop) {
        let Some(presentation) = &mut self.presentation else {
            return;
        };

        match self.pipeline.step(&mut presentation.renderer, &self.cancel) {
            Ok(StepOutcome::Presented) => {
                presentation.renderer.present();
                presentation.window.request_redraw();
            }
            Ok(outcome @ (StepOutcome::EndOfStream | StepOutcome::Cancelled)) => {
                tracing::info!("Playback ended: {:?}", outcome);
                event_loop.exit();
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        self.cancel.cancel();
        event_loop.exit();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.presentation.is_some() {
            return;
        }

        match self.create_presentation(event_loop) {
            Ok(presentation) => {
                presentation.window.request_redraw();
                self.presentation = Some(presentation);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Window closed");
                self.stop(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    tracing::info!("Escape pressed");
                    self.stop(event_loop);
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(presentation) = &mut self.presentation {
                    presentation.renderer.resize(size);
                }
            }
            WindowEvent::RedrawRequested => self.advance(event_loop),
            _ => {}
        }
    }
}

fn main() -> ExitCode {
    let Some(video_path) = std::env::args().nth(1) else {
        let program = std::env::args().next().unwrap_or_else(|| "immersive-viewer".to_string());
        println!("Usage: {} <video_file>", program);
        return ExitCode::SUCCESS;
    };

    let settings = ViewerSettings::load();

    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&settings.log_config()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Immersive Viewer v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Late frames: {}", settings.late_frame_policy.display_name());

    let path = Path::new(&video_path);
    let source = match FfmpegSource::open(path, &settings.decoder_config(), settings.scaler_quality) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(kind = e.kind(), "{}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = PlaybackPipeline::new(source, settings.late_frame_policy());

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            let e = PlaybackError::PresentationSetup(format!("Failed to create event loop: {}", e));
            tracing::error!(kind = e.kind(), "{}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    // Steps are driven by redraw requests; the pacer does the waiting
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(path, settings, pipeline);
    if let Err(e) = event_loop.run_app(&mut app) {
        tracing::error!("Event loop error: {}", e);
        eprintln!("Error: event loop failed: {}", e);
        return ExitCode::FAILURE;
    }

    app.pipeline.stats().log_summary();

    match app.error {
        Some(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
