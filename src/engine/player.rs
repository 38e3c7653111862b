//! Real-time audio playback using cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

use super::host::{AcquireError, AudioHost, GestureSignal, Sink};
use super::Mixer;

/// Audio host backed by the system's default cpal host
#[derive(Debug, Default)]
pub struct CpalHost {
    device_name: Option<String>,
    buffer_size: Option<u32>,
    gestures: Arc<GestureSignal>,
}

impl CpalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer an output device whose name contains `name`
    pub fn with_device(mut self, name: Option<String>) -> Self {
        self.device_name = name;
        self
    }

    /// Request a fixed callback buffer size, in frames
    pub fn with_buffer_size(mut self, frames: Option<u32>) -> Self {
        self.buffer_size = frames;
        self
    }
}

impl AudioHost for CpalHost {
    fn acquire(&self, mixer: Arc<Mutex<Mixer>>) -> Result<Box<dyn Sink>, AcquireError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();
        let device_name = self.device_name.clone();
        let buffer_size = self.buffer_size;

        // cpal streams are not Send, so the stream lives on its own thread
        let handle = thread::Builder::new()
            .name("chime-output".to_string())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), buffer_size, mixer) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run_stream(stream, command_rx);
            })
            .map_err(|e| AcquireError::Backend(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(Box::new(CpalSink {
                sample_rate,
                commands: Some(command_tx),
                handle: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AcquireError::Backend("output thread exited before the stream opened".to_string()))
            }
        }
    }

    fn gestures(&self) -> Arc<GestureSignal> {
        Arc::clone(&self.gestures)
    }
}

enum StreamCommand {
    Pause,
    Resume,
}

/// A running cpal stream. Dropping it closes the stream.
struct CpalSink {
    sample_rate: u32,
    commands: Option<Sender<StreamCommand>>,
    handle: Option<JoinHandle<()>>,
}

impl Sink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn pause(&mut self) {
        self.send(StreamCommand::Pause);
    }

    fn resume(&mut self) {
        self.send(StreamCommand::Resume);
    }
}

impl CpalSink {
    fn send(&self, command: StreamCommand) {
        if let Some(commands) = &self.commands {
            if commands.send(command).is_err() {
                warn!("output thread is gone");
            }
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        // Hanging up the channel ends the output thread
        self.commands = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_stream(stream: Stream, commands: Receiver<StreamCommand>) {
    while let Ok(command) = commands.recv() {
        let result = match command {
            StreamCommand::Pause => stream.pause().map_err(|e| e.to_string()),
            StreamCommand::Resume => stream.play().map_err(|e| e.to_string()),
        };
        if let Err(e) = result {
            warn!("output stream control failed: {}", e);
        }
    }
    debug!("output stream closed");
}

fn open_stream(
    device_name: Option<&str>,
    buffer_size: Option<u32>,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<(Stream, u32), AcquireError> {
    let device = find_device(device_name)?;

    let config = device
        .default_output_config()
        .map_err(|e| AcquireError::Backend(e.to_string()))?;
    let sample_format = config.sample_format();
    let mut stream_config: StreamConfig = config.into();
    if let Some(frames) = buffer_size {
        stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
    }

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, mixer)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, mixer)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, mixer)?,
        other => return Err(AcquireError::Backend(format!("unsupported sample format {:?}", other))),
    };

    stream.play().map_err(|e| AcquireError::Backend(e.to_string()))?;
    debug!(
        device = %device.name().unwrap_or_default(),
        sample_rate = stream_config.sample_rate.0,
        channels = stream_config.channels,
        "output stream started"
    );

    Ok((stream, stream_config.sample_rate.0))
}

fn find_device(name: Option<&str>) -> Result<Device, AcquireError> {
    let host = cpal::default_host();

    if let Some(name) = name {
        let devices = host
            .output_devices()
            .map_err(|e| AcquireError::Backend(e.to_string()))?;
        for device in devices {
            if device.name().map(|n| n.contains(name)).unwrap_or(false) {
                return Ok(device);
            }
        }
        warn!(device = name, "output device not found, using the default");
    }

    host.default_output_device().ok_or(AcquireError::NoOutput)
}

fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<Stream, AcquireError> {
    let channels = config.channels as usize;
    let mut mono: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                if mono.len() < frames {
                    mono.resize(frames, 0.0);
                }

                if let Ok(mut mixer) = mixer.try_lock() {
                    mixer.fill_buffer(&mut mono[..frames]);
                    for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                        for channel_sample in frame.iter_mut() {
                            *channel_sample = T::from_sample(sample);
                        }
                    }
                } else {
                    // Mixer busy, fill with silence
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                }
            },
            |err| {
                error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AcquireError::Backend(e.to_string()))
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device()
        .and_then(|d| d.name().ok())
}

/// List all available output devices
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}
