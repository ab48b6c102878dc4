use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use super::microphone::{Microphone, SAMPLE_RATE};
use crate::application::ports::CaptureHandle;

const FRAME: Duration = Duration::from_millis(20);
const FRAME_SAMPLES: usize = (SAMPLE_RATE / 50) as usize;
const MAX_PACKET: usize = 4000;
const CAPTURE_QUEUE: usize = 64;

/// The trainee's microphone, Opus-encoded onto a local track
pub struct LocalAudio {
    microphone: Microphone,
    cancel: CancellationToken,
    feeder: Option<JoinHandle<()>>,
}

impl LocalAudio {
    /// Open the microphone, add its track to `peer` and start streaming.
    ///
    /// No track is added when the microphone is unavailable.
    pub async fn attach(peer: &Arc<RTCPeerConnection>) -> Result<Self> {
        let (tx, rx) = mpsc::channel(CAPTURE_QUEUE);
        let microphone = Microphone::open(tx).await?;
        let encoder = opus::Encoder::new(SAMPLE_RATE, opus::Channels::Mono, opus::Application::Voip)
            .context("failed to create Opus encoder")?;

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: SAMPLE_RATE,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                rtcp_feedback: vec![],
            },
            "audio".to_owned(),
            "trainee-microphone".to_owned(),
        ));

        peer.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        let cancel = CancellationToken::new();
        let feeder = tokio::spawn(stream_microphone(rx, encoder, track, cancel.clone()));
        info!("attached local audio track");

        Ok(Self {
            microphone,
            cancel,
            feeder: Some(feeder),
        })
    }
}

#[async_trait]
impl CaptureHandle for LocalAudio {
    async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();
        self.microphone.close();
        if let Some(feeder) = self.feeder.take() {
            feeder.await?;
        }
        debug!("local audio stopped");
        Ok(())
    }
}

impl Drop for LocalAudio {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Regroups arbitrary capture chunks into fixed-size encoder frames
struct FrameBuffer {
    size: usize,
    pending: Vec<f32>,
}

impl FrameBuffer {
    fn new(size: usize) -> Self {
        Self {
            size,
            pending: Vec::with_capacity(size * 2),
        }
    }

    fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);
    }

    fn next_frame(&mut self) -> Option<Vec<f32>> {
        if self.pending.len() < self.size {
            return None;
        }
        Some(self.pending.drain(..self.size).collect())
    }
}

async fn stream_microphone(
    mut rx: mpsc::Receiver<Vec<f32>>,
    mut encoder: opus::Encoder,
    track: Arc<TrackLocalStaticSample>,
    cancel: CancellationToken,
) {
    let mut frames = FrameBuffer::new(FRAME_SAMPLES);
    let mut packet = vec![0u8; MAX_PACKET];
    let mut sent: u64 = 0;

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = rx.recv() => match chunk {
                Some(chunk) => chunk,
                None => {
                    warn!("microphone stream ended");
                    break;
                }
            },
        };
        frames.push(&chunk);

        while let Some(frame) = frames.next_frame() {
            let len = match encoder.encode_float(&frame, &mut packet) {
                Ok(len) => len,
                Err(e) => {
                    warn!(error = %e, "failed to encode audio frame");
                    continue;
                }
            };
            let sample = Sample {
                data: Bytes::copy_from_slice(&packet[..len]),
                duration: FRAME,
                ..Default::default()
            };
            if let Err(e) = track.write_sample(&sample).await {
                warn!(error = %e, "failed to write audio sample");
                return;
            }

            sent += 1;
            if sent % 3000 == 0 {
                debug!(frames = sent, "local audio frames sent");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_regrouped() {
        let mut frames = FrameBuffer::new(4);
        frames.push(&[0.1, 0.2, 0.3]);
        assert!(frames.next_frame().is_none());

        frames.push(&[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        assert_eq!(frames.next_frame(), Some(vec![0.1, 0.2, 0.3, 0.4]));
        assert_eq!(frames.next_frame(), Some(vec![0.5, 0.6, 0.7, 0.8]));
        assert!(frames.next_frame().is_none());

        frames.push(&[1.0, 1.0, 1.0]);
        assert_eq!(frames.next_frame(), Some(vec![0.9, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_frame_matches_opus_frame_size() {
        assert_eq!(FRAME_SAMPLES, 960);
        assert_eq!(FRAME_SAMPLES as u128 * 1000 / SAMPLE_RATE as u128, FRAME.as_millis());
    }
}
