use std::{error::Error, path::PathBuf, thread};

use clap::{Parser, ValueEnum};
use pixels::{Pixels, SurfaceTexture};
use rodio::{OutputStream, Sink};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};
use vip8_base::{
    font::Font,
    processor::{
        ControlEvent, Key, KeyState, PartialOffscreenDrawing, Processor, ProcessorBuilder,
        ProcessorEvent, TimerMode,
    },
};
use winit::{
    dpi::{LogicalPosition, LogicalSize, PhysicalSize},
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{EventLoop, EventLoopBuilder},
    window::{Window, WindowBuilder},
};

use crate::tone::EmulatorTone;

mod tone;

const WINDOW_TITLE: &str = "vip8";

/// RGB color for the pixel on-state
const COLOR_PIXEL_ON: [u8; 3] = [0xFF, 0xFF, 0xFF];
/// RGB color for the pixel off-state
const COLOR_PIXEL_OFF: [u8; 3] = [0x00, 0x00, 0x00];

/// Frequency of the tone played while the sound timer is active.
const TONE_FREQUENCY: f32 = 440.0;

trait TryIntoKey {
    type Error;

    fn try_into_key(&self) -> Result<Key, Self::Error>;
}

impl TryIntoKey for VirtualKeyCode {
    type Error = ();

    /// Map the left hand side of a QWERTY keyboard onto the hex keypad of the COSMAC VIP.
    fn try_into_key(&self) -> Result<Key, Self::Error> {
        use VirtualKeyCode::*;

        match *self {
            // row 1
            Key1 => Ok(Key::K1),
            Key2 => Ok(Key::K2),
            Key3 => Ok(Key::K3),
            Key4 => Ok(Key::KC),
            // row 2
            Q => Ok(Key::K4),
            W => Ok(Key::K5),
            E => Ok(Key::K6),
            R => Ok(Key::KD),
            // row 3
            A => Ok(Key::K7),
            S => Ok(Key::K8),
            D => Ok(Key::K9),
            F => Ok(Key::KE),
            // row 4
            Z => Ok(Key::KA),
            X => Ok(Key::K0),
            C => Ok(Key::KB),
            V => Ok(Key::KF),
            _ => Err(()),
        }
    }
}

trait IntoKeyState {
    fn into_key_state(&self) -> KeyState;
}

impl IntoKeyState for ElementState {
    fn into_key_state(&self) -> KeyState {
        match *self {
            ElementState::Pressed => KeyState::Pressed,
            ElementState::Released => KeyState::NotPressed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPartialOffscreenDrawing {
    #[clap(name = "wrap-xy")]
    WrapXY,
    #[clap(name = "clip-xy")]
    ClipXY,
    #[clap(name = "clip-x-wrap-y")]
    ClipXWrapY,
    #[clap(name = "wrap-x-clip-y")]
    WrapXClipY,
}

impl From<CliPartialOffscreenDrawing> for PartialOffscreenDrawing {
    fn from(cli: CliPartialOffscreenDrawing) -> Self {
        match cli {
            CliPartialOffscreenDrawing::WrapXY => Self::WrapXY,
            CliPartialOffscreenDrawing::ClipXY => Self::ClipXY,
            CliPartialOffscreenDrawing::ClipXWrapY => Self::ClipXWrapY,
            CliPartialOffscreenDrawing::WrapXClipY => Self::WrapXClipY,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTimerMode {
    #[clap(name = "fixed-60hz")]
    Fixed60Hz,
    #[clap(name = "per-instruction")]
    PerInstruction,
}

impl From<CliTimerMode> for TimerMode {
    fn from(cli: CliTimerMode) -> Self {
        match cli {
            CliTimerMode::Fixed60Hz => Self::Fixed60Hz,
            CliTimerMode::PerInstruction => Self::PerInstruction,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFont {
    Cosmac,
    Round,
}

impl From<CliFont> for Font {
    fn from(cli: CliFont) -> Self {
        match cli {
            CliFont::Cosmac => Self::Cosmac,
            CliFont::Round => Self::Round,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(version, about)]
struct CliOpts {
    /// The path to the file containing the ROM.
    /// The file's contents will be loaded into the emulator's memory,
    /// starting at address 0x200.
    rom_file: PathBuf,
    /// Don't play a tone while the sound timer is active.
    #[clap(long)]
    no_audio: bool,
    /// The number of instructions executed per second.
    #[clap(long, default_value_t = ProcessorBuilder::DEFAULT_CYCLE_RATE)]
    cycle_rate: u32,
    /// Whether the delay and sound timers count down at 60Hz or once per instruction.
    #[clap(long, value_enum, default_value = "fixed-60hz")]
    timer_mode: CliTimerMode,
    /// The clipping/wrapping behavior for sprites that are drawn partially offscreen.
    #[clap(short, long, value_enum, default_value = "wrap-xy")]
    partial_offscreen_drawing: CliPartialOffscreenDrawing,
    /// The font for the hexadecimal digit sprites.
    #[clap(long, value_enum, default_value = "cosmac")]
    font: CliFont,
}

/// The audio output, kept alive for as long as the tone should be playable.
struct Audio {
    _stream: OutputStream,
    sink: Sink,
}

impl Audio {
    fn new() -> Result<Self, Box<dyn Error>> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;
        sink.set_volume(0.5);
        sink.pause();
        sink.append(EmulatorTone::new(TONE_FREQUENCY));

        Ok(Self {
            _stream: stream,
            sink,
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli_opts = CliOpts::parse();

    tracing_subscriber::fmt()
        .pretty()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let program = std::fs::read(&cli_opts.rom_file).map_err(|error| {
        error!(%error, rom_file = ?cli_opts.rom_file, "could not read the ROM file");
        error
    })?;
    let processor = Processor::builder()
        .font(cli_opts.font.into())
        .partial_offscreen_drawing(cli_opts.partial_offscreen_drawing.into())
        .timer_mode(cli_opts.timer_mode.into())
        .cycle_rate(cli_opts.cycle_rate)
        .program(&program)
        .map_err(|error| {
            error!(%error, rom_file = ?cli_opts.rom_file, "could not load the ROM");
            error
        })?
        .build();
    info!(rom_file = ?cli_opts.rom_file, program_len = program.len(), "ROM loaded");

    let audio = if cli_opts.no_audio {
        None
    } else {
        match Audio::new() {
            Ok(audio) => Some(audio),
            Err(error) => {
                warn!(%error, "could not open an audio output, continuing without sound");
                None
            }
        }
    };

    let event_loop = EventLoopBuilder::<ProcessorEvent>::with_user_event().build();

    let (window, size) = create_window(
        &event_loop,
        WINDOW_TITLE,
        PhysicalSize::new(
            Processor::SCREEN_WIDTH as u32,
            Processor::SCREEN_HEIGHT as u32,
        ),
    )?;
    let surface_texture = SurfaceTexture::new(size.width, size.height, &window);
    let mut pixels = Pixels::new(
        Processor::SCREEN_WIDTH as u32,
        Processor::SCREEN_HEIGHT as u32,
        surface_texture,
    )?;

    let mut screen = *processor.screen();
    let (control_event_sender, processor_event_receiver, processor_join_handle) =
        processor.start()?;

    let mut control_event_sender = Some(control_event_sender);
    let mut processor_join_handle = Some(processor_join_handle);

    let event_loop_proxy = event_loop.create_proxy();
    thread::Builder::new()
        .name("processor event forwarder".to_owned())
        .spawn(move || {
            // Ends when either the processor or the event loop is gone.
            while let Ok(event) = processor_event_receiver.recv() {
                if event_loop_proxy.send_event(event).is_err() {
                    break;
                }
            }
        })?;

    event_loop.run(move |event, _, control_flow| {
        control_flow.set_wait();
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::Resized(size) => {
                    if let Err(error) = pixels.resize_surface(size.width, size.height) {
                        error!(%error, "pixels failed to resize the surface texture");
                        control_flow.set_exit();
                    }
                }
                WindowEvent::CloseRequested => {
                    info!("window closed, exiting...");
                    control_flow.set_exit();
                }
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state,
                            virtual_keycode: Some(virtual_keycode),
                            ..
                        },
                    ..
                } => {
                    debug!(?virtual_keycode, ?state, "host key state changed");
                    if virtual_keycode == VirtualKeyCode::Escape && state == ElementState::Pressed
                    {
                        info!("escape key pressed, exiting...");
                        control_flow.set_exit();
                    } else if let Ok(key) = virtual_keycode.try_into_key() {
                        if state == ElementState::Pressed {
                            window.set_title(WINDOW_TITLE);
                        }
                        let key_state_change = ControlEvent::KeyStateChange {
                            key,
                            new_state: state.into_key_state(),
                        };
                        let sent = control_event_sender
                            .as_ref()
                            .map_or(false, |sender| sender.send(key_state_change).is_ok());
                        if !sent {
                            // The error, if any, arrives as a processor event.
                            debug!("processor stopped, key state change dropped");
                        }
                    }
                }
                _ => (),
            },
            Event::UserEvent(ProcessorEvent::ErrorEncountered { error }) => {
                error!(%error, "error occurred running the CHIP-8 program");
                control_flow.set_exit();
            }
            Event::UserEvent(ProcessorEvent::ScreenUpdate { new_screen }) => {
                screen = new_screen;
                window.request_redraw();
            }
            Event::UserEvent(ProcessorEvent::WaitForKeyPress) => {
                window.set_title(&format!("{} (waiting for key press)", WINDOW_TITLE));
            }
            Event::UserEvent(ProcessorEvent::StartPlayingSound) => {
                if let Some(audio) = &audio {
                    audio.sink.play();
                }
            }
            Event::UserEvent(ProcessorEvent::StopPlayingSound) => {
                if let Some(audio) = &audio {
                    audio.sink.pause();
                }
            }
            Event::RedrawRequested(_) => {
                pixels
                    .frame_mut()
                    .chunks_exact_mut(4)
                    .zip(screen.pixels())
                    .for_each(|(frame_pixel, screen_pixel_on)| {
                        frame_pixel[0..3].copy_from_slice(if screen_pixel_on {
                            &COLOR_PIXEL_ON
                        } else {
                            &COLOR_PIXEL_OFF
                        }); // RGB
                        frame_pixel[3] = 0xFF; // alpha
                    });
                if let Err(error) = pixels.render() {
                    error!(%error, "pixels failed to draw pixel buffer to surface texture");
                    control_flow.set_exit();
                }
            }
            Event::LoopDestroyed => {
                if let Some(audio) = &audio {
                    audio.sink.stop();
                }
                // dropping this makes the processor stop
                drop(control_event_sender.take());
                if let Some(join_handle) = processor_join_handle.take() {
                    match join_handle.join() {
                        Ok(Ok(())) => info!("processor stopped"),
                        // Already logged when it was encountered.
                        Ok(Err(_)) => (),
                        Err(_) => error!("the processor thread panicked"),
                    }
                }
            }
            _ => (),
        }
    });
}

/// Create a hidden window, size it to a multiple of `pixel_buffer_size`
/// and center it on the current monitor, then show it.
///
/// Returns the window and its physical inner size.
fn create_window<T>(
    event_loop: &EventLoop<T>,
    title: &str,
    pixel_buffer_size: PhysicalSize<u32>,
) -> Result<(Window, PhysicalSize<u32>), winit::error::OsError> {
    let pixel_buffer_size: PhysicalSize<f64> = pixel_buffer_size.cast();

    let window = WindowBuilder::new()
        .with_visible(false)
        .with_title(title)
        .build(event_loop)?;

    let hidpi_factor = window.scale_factor();
    let (monitor_width, monitor_height) = match window.current_monitor() {
        Some(monitor) => {
            let size = monitor.size().to_logical::<f64>(hidpi_factor);
            (size.width, size.height)
        }
        None => (pixel_buffer_size.width, pixel_buffer_size.height),
    };

    // Scale to two thirds of the smaller dimension of the monitor,
    // relative to the size of the pixel buffer.
    let scale = (monitor_width / pixel_buffer_size.width)
        .min(monitor_height / pixel_buffer_size.height)
        * 2.0
        / 3.0;
    let scale = scale.round().max(1.0);

    let min_size = pixel_buffer_size.to_logical::<f64>(hidpi_factor);

    let default_size = LogicalSize::new(
        pixel_buffer_size.width * scale,
        pixel_buffer_size.height * scale,
    );

    let upper_left_of_centered = LogicalPosition::new(
        (monitor_width - default_size.width) / 2.0,
        (monitor_height - default_size.height) / 2.0,
    );

    window.set_min_inner_size(Some(min_size));
    window.set_inner_size(default_size);
    window.set_outer_position(upper_left_of_centered);
    window.set_visible(true);

    let physical_default_size = default_size.to_physical::<f64>(hidpi_factor);

    Ok((
        window,
        PhysicalSize::new(
            physical_default_size.width.round() as u32,
            physical_default_size.height.round() as u32,
        ),
    ))
}
