use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;

use crate::application::ports::{CommandChannelPort, PeerEventKind, PeerEventSink};

/// The `commands` data channel of a peer connection
pub struct RtcCommandChannel {
    channel: Arc<RTCDataChannel>,
}

impl RtcCommandChannel {
    /// Wrap `channel` and forward its callbacks to `sink`
    pub fn bind(channel: Arc<RTCDataChannel>, sink: &PeerEventSink) -> Self {
        let on_open = sink.clone();
        let label = channel.label().to_owned();
        channel.on_open(Box::new(move || {
            debug!(label = %label, "data channel open");
            on_open.emit(PeerEventKind::ChannelOpen);
            Box::pin(async {})
        }));

        let on_close = sink.clone();
        channel.on_close(Box::new(move || {
            on_close.emit(PeerEventKind::ChannelClosed);
            Box::pin(async {})
        }));

        let on_message = sink.clone();
        channel.on_message(Box::new(move |msg: DataChannelMessage| {
            on_message.emit(PeerEventKind::ChannelMessage(msg.data));
            Box::pin(async {})
        }));

        Self { channel }
    }
}

#[async_trait]
impl CommandChannelPort for RtcCommandChannel {
    fn is_open(&self) -> bool {
        self.channel.ready_state() == RTCDataChannelState::Open
    }

    async fn send_text(&self, payload: String) -> Result<()> {
        self.channel.send_text(payload).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.channel.close().await?;
        Ok(())
    }
}
