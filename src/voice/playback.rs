//! Audio playback handles and players
//!
//! Playback is asynchronous: a player returns a [`PlaybackHandle`] as soon as
//! audio starts. The handle can stop the audio and exposes a [`Completion`]
//! that resolves when playback ends, whichever way it ends.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::{Error, Result};

/// Resolves when a playback or utterance ends
///
/// Dropping it is fine; the audio keeps playing.
#[derive(Debug)]
pub struct Completion(Option<oneshot::Receiver<Result<()>>>);

impl Completion {
    /// A completion that has already happened
    #[must_use]
    pub const fn done() -> Self {
        Self(None)
    }

    /// Wait for the end of playback
    ///
    /// # Errors
    ///
    /// Returns the error the player reported, if any
    pub async fn wait(self) -> Result<()> {
        match self.0 {
            Some(rx) => rx.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }

    /// Build a completion fed by `tx`
    pub(crate) fn channel() -> (oneshot::Sender<Result<()>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self(Some(rx)))
    }
}

/// Stops one playback; stopping twice or after the end is a no-op
#[derive(Debug, Default)]
pub struct Stopper(Option<oneshot::Sender<()>>);

impl Stopper {
    pub fn stop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }

    /// Whether the playback may still be running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// Handle to audio that has started playing
#[derive(Debug)]
pub struct PlaybackHandle {
    stopper: Stopper,
    completion: Completion,
}

impl PlaybackHandle {
    /// Create a handle and the control half given to the playing task
    #[must_use]
    pub fn channel() -> (Self, PlaybackControl) {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, completion) = Completion::channel();
        (
            Self {
                stopper: Stopper(Some(stop_tx)),
                completion,
            },
            PlaybackControl {
                stop: stop_rx,
                done: done_tx,
            },
        )
    }

    /// A handle for something that finished immediately
    #[must_use]
    pub fn finished() -> Self {
        Self {
            stopper: Stopper::default(),
            completion: Completion::done(),
        }
    }

    pub fn stop(&mut self) {
        self.stopper.stop();
    }

    /// Wait for the end of playback
    ///
    /// # Errors
    ///
    /// Returns the error the player reported, if any
    pub async fn wait(self) -> Result<()> {
        self.completion.wait().await
    }

    #[must_use]
    pub fn into_parts(self) -> (Stopper, Completion) {
        (self.stopper, self.completion)
    }

    #[must_use]
    pub const fn from_parts(stopper: Stopper, completion: Completion) -> Self {
        Self {
            stopper,
            completion,
        }
    }
}

/// Task-side half of a [`PlaybackHandle`]
#[derive(Debug)]
pub struct PlaybackControl {
    stop: oneshot::Receiver<()>,
    done: oneshot::Sender<Result<()>>,
}

impl PlaybackControl {
    /// Resolves when a stop is requested; never resolves if the handle's
    /// stopper was dropped without stopping
    pub async fn stopped(&mut self) {
        if (&mut self.stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Report how playback ended
    pub fn finish(self, result: Result<()>) {
        let _ = self.done.send(result);
    }
}

/// Something that can play an audio file
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Start playing `path`, returning once audio has started
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot start
    async fn play(&self, path: &Path) -> Result<PlaybackHandle>;

    /// Player name for logging
    fn name(&self) -> &'static str;
}

/// Plays files through an external command such as `mpg123 -q`
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    /// Parse a whitespace-separated command line; the file path is appended
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the command is empty
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| Error::Config("audio player command is empty".to_string()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, path: &Path) -> Result<PlaybackHandle> {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).arg(path);
        tracing::debug!(program = %self.program, path = %path.display(), "starting player");
        spawn_process(command)
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Run a child process as a playback: stopping kills it, exit ends it
///
/// # Errors
///
/// Returns [`Error::Audio`] if the process cannot be spawned
pub(crate) fn spawn_process(mut command: tokio::process::Command) -> Result<PlaybackHandle> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let mut child = command
        .spawn()
        .map_err(|e| Error::Audio(format!("failed to start {program}: {e}")))?;

    let (handle, mut control) = PlaybackHandle::channel();

    tokio::spawn(async move {
        let result = tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(Error::Audio(format!("{program} exited with {status}"))),
                Err(e) => Err(Error::Io(e)),
            },
            () = control.stopped() => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(error = %e, "failed to kill audio process");
                }
                Ok(())
            }
        };
        control.finish(result);
    });

    Ok(handle)
}

#[cfg(feature = "speaker")]
pub use speaker::SpeakerPlayer;

#[cfg(feature = "speaker")]
mod speaker {
    //! MP3 playback on the default output device

    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{SampleRate, StreamConfig};

    use super::{AudioPlayer, PlaybackHandle};
    use crate::{Error, Result};

    /// Decodes MP3 with `minimp3` and plays it through `cpal`
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SpeakerPlayer;

    #[async_trait]
    impl AudioPlayer for SpeakerPlayer {
        async fn play(&self, path: &Path) -> Result<PlaybackHandle> {
            let data = tokio::fs::read(path).await?;
            let (samples, sample_rate) = decode_mp3(&data)?;

            let stop_flag = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&stop_flag);
            let mut blocking = tokio::task::spawn_blocking(move || {
                play_samples_blocking(&samples, sample_rate, &flag)
            });

            let (handle, mut control) = PlaybackHandle::channel();
            tokio::spawn(async move {
                let result = tokio::select! {
                    joined = &mut blocking => joined
                        .map_err(|e| Error::Audio(e.to_string()))
                        .and_then(|r| r),
                    () = control.stopped() => {
                        stop_flag.store(true, Ordering::SeqCst);
                        let _ = blocking.await;
                        Ok(())
                    }
                };
                control.finish(result);
            });

            Ok(handle)
        }

        fn name(&self) -> &'static str {
            "speaker"
        }
    }

    /// Play mono samples, returning when done or when `stop` is set
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn play_samples_blocking(samples: &[f32], sample_rate: u32, stop: &AtomicBool) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() <= 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config: StreamConfig = supported.with_sample_rate(SampleRate(sample_rate)).config();
        let channels = config.channels as usize;

        let samples: Arc<[f32]> = Arc::from(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.load(Ordering::Relaxed);
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Relaxed);
                                0.0
                            });
                            frame.fill(sample);
                            if pos < samples.len() {
                                position.store(pos + 1, Ordering::Relaxed);
                            }
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate.max(1));
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Relaxed) && !stop.load(Ordering::SeqCst) {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        drop(stream);
        tracing::debug!(samples = samples.len(), "playback complete");
        Ok(())
    }

    /// Decode MP3 bytes to mono f32 samples and their sample rate
    #[allow(clippy::cast_sign_loss)]
    fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
        let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
        let mut samples = Vec::new();
        let mut sample_rate = 16_000;

        loop {
            match decoder.next_frame() {
                Ok(frame) => {
                    sample_rate = frame.sample_rate as u32;
                    if frame.channels == 2 {
                        samples.extend(frame.data.chunks(2).map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        }));
                    } else {
                        samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                    }
                }
                Err(minimp3::Error::Eof) => break,
                Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
            }
        }

        Ok((samples, sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_parsing() {
        let player = CommandPlayer::from_command_line("ffplay -nodisp -autoexit").unwrap();
        assert_eq!(player.program(), "ffplay");
        assert_eq!(player.args(), ["-nodisp", "-autoexit"]);

        assert!(CommandPlayer::from_command_line("   ").is_err());
    }

    #[tokio::test]
    async fn finished_handle_resolves() {
        let handle = PlaybackHandle::finished();
        assert!(handle.wait().await.is_ok());
    }

    #[tokio::test]
    async fn control_reports_result() {
        let (handle, control) = PlaybackHandle::channel();
        control.finish(Err(Error::Audio("device lost".to_string())));
        assert!(matches!(handle.wait().await, Err(Error::Audio(_))));
    }

    #[tokio::test]
    async fn stop_reaches_control() {
        let (mut handle, mut control) = PlaybackHandle::channel();
        let task = tokio::spawn(async move {
            control.stopped().await;
            control.finish(Ok(()));
        });

        handle.stop();
        handle.stop();
        task.await.unwrap();
        assert!(handle.wait().await.is_ok());
    }

    #[tokio::test]
    async fn dropped_control_counts_as_done() {
        let (handle, control) = PlaybackHandle::channel();
        drop(control);
        assert!(handle.wait().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_playback_can_be_stopped() {
        let mut command = tokio::process::Command::new("sleep");
        command.arg("30");
        let mut handle = spawn_process(command).unwrap();
        handle.stop();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle.wait()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
