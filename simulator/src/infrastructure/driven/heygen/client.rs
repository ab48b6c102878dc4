use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, info};

use super::dto::{
    self, IceBody, NewSessionBody, NewSessionData, SessionDescription, StartBody, StartData,
    StopBody,
};
use crate::application::ports::{ApiError, NewSessionRequest, StartAnswer, StreamingApiPort};
use crate::domain::value_objects::{IceCandidate, SessionParams};

/// HeyGen streaming API over HTTPS
pub struct HeygenStreamingApi {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HeygenStreamingApi {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Bytes, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: dto::error_message(status.as_u16(), &body),
            });
        }
        Ok(body)
    }

    fn authorized(&self, params: &SessionParams, endpoint: &str) -> RequestBuilder {
        self.client
            .post(params.endpoint(endpoint))
            .bearer_auth(&params.access_token)
    }
}

#[async_trait]
impl StreamingApiPort for HeygenStreamingApi {
    async fn create_session(&self, request: &NewSessionRequest) -> Result<SessionParams, ApiError> {
        let url = format!("{}/v1/streaming.new", self.base_url);
        let body = self
            .send(
                self.client
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .json(&NewSessionBody::from(request)),
            )
            .await?;

        let data: NewSessionData = dto::decode_data(&body)?;
        info!(
            session_id = %data.session_id,
            avatar_id = %request.avatar_id,
            media_url = data.url.as_deref().unwrap_or("-"),
            "created streaming session"
        );
        Ok(SessionParams::new(
            data.session_id,
            data.access_token,
            self.base_url.clone(),
        ))
    }

    async fn start(&self, params: &SessionParams, offer_sdp: &str) -> Result<StartAnswer, ApiError> {
        let body = self
            .send(self.authorized(params, "streaming.start").json(&StartBody {
                session_id: &params.session_id,
                sdp: SessionDescription::offer(offer_sdp),
            }))
            .await?;

        let data: StartData = dto::decode_data(&body)?;
        if data.sdp.kind != "answer" {
            return Err(ApiError::Decode(format!(
                "expected an answer, got {}",
                data.sdp.kind
            )));
        }
        Ok(StartAnswer {
            sdp: data.sdp.sdp,
            ice_candidates: data.ice_candidates.unwrap_or_default(),
        })
    }

    async fn submit_ice(&self, params: &SessionParams, candidate: &IceCandidate) -> Result<(), ApiError> {
        self.send(self.authorized(params, "streaming.ice").json(&IceBody {
            session_id: &params.session_id,
            candidate,
        }))
        .await?;
        debug!(session_id = %params.session_id, "submitted ICE candidate");
        Ok(())
    }

    async fn stop(&self, params: &SessionParams) -> Result<(), ApiError> {
        self.send(self.authorized(params, "streaming.stop").json(&StopBody {
            session_id: &params.session_id,
        }))
        .await?;
        info!(session_id = %params.session_id, "stopped streaming session");
        Ok(())
    }
}
