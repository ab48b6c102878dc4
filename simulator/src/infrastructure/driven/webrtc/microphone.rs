use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Capture rate; also the Opus encoder's input rate
pub const SAMPLE_RATE: u32 = 48_000;

/// Default input device streaming mono `f32` chunks into a channel.
///
/// `cpal::Stream` is not `Send`, so the stream lives on its own thread
/// until the handle is closed or dropped.
pub struct Microphone {
    stop: Option<std_mpsc::Sender<()>>,
}

impl Microphone {
    /// Open the default input device at [`SAMPLE_RATE`].
    ///
    /// Fails when there is no input device or it cannot stream at that rate.
    pub async fn open(samples: mpsc::Sender<Vec<f32>>) -> Result<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || run_stream(samples, ready_tx, stop_rx))
            .context("failed to spawn microphone thread")?;

        let device = ready_rx
            .await
            .map_err(|_| anyhow!("microphone thread exited before starting"))??;
        info!(device = %device, sample_rate = SAMPLE_RATE, "microphone capture started");

        Ok(Self {
            stop: Some(stop_tx),
        })
    }

    pub fn close(&mut self) {
        if self.stop.take().is_some() {
            debug!("microphone capture closing");
        }
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_stream(
    samples: mpsc::Sender<Vec<f32>>,
    ready: oneshot::Sender<Result<String>>,
    stop: std_mpsc::Receiver<()>,
) {
    let stream = match build_stream(samples) {
        Ok((stream, device)) => {
            let _ = ready.send(Ok(device));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Returns once the handle's sender is dropped
    let _ = stop.recv();
    drop(stream);
    debug!("microphone stream closed");
}

fn build_stream(samples: mpsc::Sender<Vec<f32>>) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no input device available"))?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device
        .supported_input_configs()
        .with_context(|| format!("failed to query input configs of {name}"))?
        .filter(|range| matches!(range.sample_format(), SampleFormat::F32 | SampleFormat::I16))
        .find(|range| {
            range.min_sample_rate().0 <= SAMPLE_RATE && range.max_sample_rate().0 >= SAMPLE_RATE
        })
        .ok_or_else(|| anyhow!("input device {name} cannot capture at {SAMPLE_RATE} Hz"))?
        .with_sample_rate(SampleRate(SAMPLE_RATE));

    let format = supported.sample_format();
    let config = supported.config();
    let channels = usize::from(config.channels);
    let on_error = |err: cpal::StreamError| error!(error = %err, "microphone stream error");

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                forward(downmix(data, channels), &samples);
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let data: Vec<f32> = data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                forward(downmix(&data, channels), &samples);
            },
            on_error,
            None,
        ),
        other => return Err(anyhow!("unsupported sample format {other:?}")),
    }
    .with_context(|| format!("failed to build input stream on {name}"))?;

    stream
        .play()
        .with_context(|| format!("failed to start input stream on {name}"))?;
    Ok((stream, name))
}

/// Average interleaved frames down to one channel
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn forward(chunk: Vec<f32>, samples: &mpsc::Sender<Vec<f32>>) {
    if samples.try_send(chunk).is_err() {
        debug!("microphone queue full, dropping samples");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix() {
        assert_eq!(downmix(&[0.5, -0.5, 1.0, 0.0], 2), vec![0.0, 0.5]);
        assert_eq!(downmix(&[0.25, 0.75], 1), vec![0.25, 0.75]);
        // a trailing partial frame is averaged on its own
        assert_eq!(downmix(&[0.25, 0.25, 0.25, 0.5], 3), vec![0.25, 0.5]);
    }
}
