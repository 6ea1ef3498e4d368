use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use super::decode::{AudioSource, DecodeError, SourceInfo};
use super::spectrum::{SpectrumAnalyzer, SpectrumConfig};
use super::transport::PlaybackTransport;

/// Lifecycle of the update driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// No source loaded.
    Idle,
    /// Source loaded, not ticking.
    Loaded,
    /// Ticking on schedule.
    Active,
}

pub type SpectrumCallback = Box<dyn Fn(&[f32]) + Send>;

enum Command {
    Load(PathBuf, Sender<Result<SourceInfo, DecodeError>>),
    Unload(Sender<()>),
    Play(Sender<()>),
    Pause(Sender<()>),
    Stop(Sender<()>),
    Subscribe(SpectrumCallback, Sender<()>),
    State(Sender<DriverState>),
    Shutdown,
}

/// Periodically recomputes the spectrum at the current playback position
/// and fans frames out to subscribers.
///
/// A dedicated worker thread owns the decoder and analyzer; all control
/// calls are acknowledged by the worker before returning, so once `pause`
/// returns no further frame is published. Ticks never overlap: the next
/// deadline is scheduled from the completion of the previous tick, so an
/// overrunning tick drops frames instead of queueing them.
pub struct SpectrumUpdateDriver {
    commands: Sender<Command>,
    latest: Arc<Mutex<Option<Vec<f32>>>>,
    worker: Option<JoinHandle<()>>,
}

impl SpectrumUpdateDriver {
    pub fn new(
        transport: Arc<dyn PlaybackTransport>,
        config: &SpectrumConfig,
        interval: Duration,
    ) -> Result<Self> {
        let analyzer = SpectrumAnalyzer::new(config)?;
        let (commands, rx) = unbounded();
        let latest = Arc::new(Mutex::new(None));

        let worker = Worker {
            rx,
            transport,
            analyzer,
            interval,
            chunk_size: config.fft_size,
            source: None,
            subscribers: Vec::new(),
            state: DriverState::Idle,
            latest: Arc::clone(&latest),
        };

        let handle = thread::Builder::new()
            .name("spectrum-driver".into())
            .spawn(move || worker.run())
            .context("Failed to spawn spectrum driver thread")?;

        Ok(Self {
            commands,
            latest,
            worker: Some(handle),
        })
    }

    /// Open `path` as the new source, replacing and closing any previous
    /// one. On failure the driver holds no source and is Idle.
    pub fn load(&self, path: &Path) -> Result<SourceInfo, DecodeError> {
        self.request(|reply| Command::Load(path.to_path_buf(), reply))
    }

    /// Release the current source. The decoder is closed before this
    /// returns.
    pub fn unload(&self) {
        self.request(Command::Unload)
    }

    /// Begin ticking. A no-op (logged) when no source is loaded.
    pub fn play(&self) {
        self.request(Command::Play)
    }

    /// Stop ticking, keeping the source. No frame is published after this
    /// returns.
    pub fn pause(&self) {
        self.request(Command::Pause)
    }

    /// Like `pause`, additionally clearing the latest-frame cache.
    pub fn stop(&self) {
        self.request(Command::Stop)
    }

    /// Register a fan-out callback, invoked on the worker thread for every
    /// published frame. Subscribers needing a UI thread marshal themselves.
    pub fn subscribe(&self, callback: impl Fn(&[f32]) + Send + 'static) {
        self.request(|reply| Command::Subscribe(Box::new(callback), reply))
    }

    pub fn state(&self) -> DriverState {
        self.request(Command::State)
    }

    /// The most recently published frame, if any.
    pub fn latest_frame(&self) -> Option<Vec<f32>> {
        self.latest.lock().unwrap().clone()
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> Command) -> T {
        let (reply, response) = bounded(1);
        self.commands
            .send(make(reply))
            .expect("spectrum driver thread exited");
        response.recv().expect("spectrum driver thread exited")
    }
}

impl Drop for SpectrumUpdateDriver {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

struct Worker {
    rx: Receiver<Command>,
    transport: Arc<dyn PlaybackTransport>,
    analyzer: SpectrumAnalyzer,
    interval: Duration,
    chunk_size: usize,
    source: Option<AudioSource>,
    subscribers: Vec<SpectrumCallback>,
    state: DriverState,
    latest: Arc<Mutex<Option<Vec<f32>>>>,
}

impl Worker {
    fn run(mut self) {
        let mut next_tick = Instant::now();

        loop {
            let command = if self.state == DriverState::Active {
                match self.rx.recv_deadline(next_tick) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            } else {
                match self.rx.recv() {
                    Ok(command) => Some(command),
                    Err(_) => return,
                }
            };

            match command {
                Some(Command::Shutdown) => return,
                Some(command) => self.handle(command, &mut next_tick),
                None => {
                    self.tick();
                    // Scheduled from completion: a slow tick skips frames
                    // instead of building a backlog.
                    next_tick = Instant::now() + self.interval;
                }
            }
        }
    }

    fn handle(&mut self, command: Command, next_tick: &mut Instant) {
        match command {
            Command::Load(path, reply) => {
                // Release the previous source before opening the new one.
                self.source = None;
                match AudioSource::open(&path) {
                    Ok(source) => {
                        let info = source.info();
                        self.source = Some(source);
                        self.state = DriverState::Loaded;
                        let _ = reply.send(Ok(info));
                    }
                    Err(err) => {
                        self.state = DriverState::Idle;
                        *self.latest.lock().unwrap() = None;
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Command::Unload(reply) => {
                self.source = None;
                self.state = DriverState::Idle;
                *self.latest.lock().unwrap() = None;
                log::info!("Source unloaded");
                let _ = reply.send(());
            }
            Command::Play(reply) => {
                if self.source.is_some() {
                    self.state = DriverState::Active;
                    *next_tick = Instant::now();
                    log::info!("Spectrum ticking started");
                } else {
                    log::warn!("Play requested with no source loaded");
                }
                let _ = reply.send(());
            }
            Command::Pause(reply) => {
                if self.state == DriverState::Active {
                    self.state = DriverState::Loaded;
                    log::info!("Spectrum ticking stopped");
                }
                let _ = reply.send(());
            }
            Command::Stop(reply) => {
                if self.state == DriverState::Active {
                    self.state = DriverState::Loaded;
                    log::info!("Spectrum ticking stopped");
                }
                *self.latest.lock().unwrap() = None;
                let _ = reply.send(());
            }
            Command::Subscribe(callback, reply) => {
                self.subscribers.push(callback);
                let _ = reply.send(());
            }
            Command::State(reply) => {
                let _ = reply.send(self.state);
            }
            Command::Shutdown => unreachable!("handled in run"),
        }
    }

    /// One update: sample the position, read, analyze, publish.
    fn tick(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };

        let position = self.transport.position();
        let chunk = source.read_chunk_at(position, self.chunk_size);
        let frame = self.analyzer.analyze(&chunk);

        if let Some(max) = frame.iter().cloned().reduce(f32::max) {
            log::debug!(
                "Spectrum updated at {:.2}s, max bar {:.3}",
                position.as_secs_f64(),
                max
            );
        }

        *self.latest.lock().unwrap() = Some(frame.clone());
        for subscriber in &self.subscribers {
            subscriber(&frame);
        }
    }
}
