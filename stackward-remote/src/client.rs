//! Blocking HTTP implementation of [`RemoteApi`].

use serde::de::DeserializeOwned;
use ureq::{Agent, AgentBuilder, Request};

use stackward_core::config::REMOTE_TIMEOUT;
use stackward_core::{DeployedUnit, RemoteTarget};

use crate::error::RemoteError;
use crate::wire::{CreateStackBody, Routes, StackFileResponse, UpdateStackBody};
use crate::RemoteApi;

/// Header carrying the pre-shared API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// HTTP client for the orchestration API.
///
/// Every request carries the API key header and is bounded by
/// [`REMOTE_TIMEOUT`]. There is no retry.
#[derive(Clone)]
pub struct HttpRemote {
    agent: Agent,
    routes: Routes,
    api_key: String,
}

impl HttpRemote {
    pub fn new(base: &str, api_key: impl Into<String>) -> Self {
        let agent = AgentBuilder::new().timeout(REMOTE_TIMEOUT).build();
        Self {
            agent,
            routes: Routes::new(base),
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: &str, url: &str) -> Request {
        self.agent
            .request(method, url)
            .set(API_KEY_HEADER, &self.api_key)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        tracing::debug!(url, "GET");
        let response = self
            .request("GET", url)
            .call()
            .map_err(|err| RemoteError::from_ureq("GET", url, err))?;
        response.into_json().map_err(|source| RemoteError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn send(
        &self,
        method: &'static str,
        url: &str,
        body: impl serde::Serialize,
    ) -> Result<(), RemoteError> {
        tracing::debug!(url, method, "sending");
        let response = self
            .request(method, url)
            .send_json(body)
            .map_err(|err| RemoteError::from_ureq(method, url, err))?;
        // Drain so the connection returns to the pool; content is not used.
        if let Err(err) = response.into_string() {
            tracing::debug!(url, method, error = %err, "failed to read response body");
        }
        Ok(())
    }
}

impl RemoteApi for HttpRemote {
    fn list_targets(&self) -> Result<Vec<RemoteTarget>, RemoteError> {
        self.get_json(&self.routes.endpoints())
    }

    fn list_units(&self) -> Result<Vec<DeployedUnit>, RemoteError> {
        self.get_json(&self.routes.stacks())
    }

    fn unit_file(&self, unit_id: i64) -> Result<String, RemoteError> {
        let body: StackFileResponse = self.get_json(&self.routes.stack_file(unit_id))?;
        Ok(body.stack_file_content)
    }

    fn update_unit(&self, unit_id: i64, target_id: i64, content: &str) -> Result<(), RemoteError> {
        self.send(
            "PUT",
            &self.routes.update_stack(unit_id, target_id),
            UpdateStackBody {
                stack_file_content: content,
                pull_image: true,
            },
        )
    }

    fn create_unit(&self, target_id: i64, name: &str, content: &str) -> Result<(), RemoteError> {
        self.send(
            "POST",
            &self.routes.create_stack(target_id),
            CreateStackBody {
                name,
                stack_file_content: content,
            },
        )
    }
}
