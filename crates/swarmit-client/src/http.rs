//! REST client for the shared job store.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use swarmit_core::blocker::{DependencyType, NewBlocker};
use swarmit_core::split::NewSplitProposal;
use swarmit_core::{
    Job, JobId, JobPool, JobSort, JobStatus, NewPheromone, PheromoneDeposit, PheromoneType,
    Result, SignalStore,
};
use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Deserialize)]
struct LockResponse {
    locked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewDependency<'a> {
    to_job_id: &'a JobId,
    #[serde(rename = "type")]
    dependency_type: DependencyType,
}

/// Job store reached over HTTP with optional bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpJobStore {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl HttpJobStore {
    pub fn new(base: &Url, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.as_str().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!(method = %method, url = %url, "Job store request");
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = self.send(builder).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder)
            .await
            .map(|_| ())
            .map_err(ClientError::into_store_error)
    }
}

#[async_trait]
impl JobPool for HttpJobStore {
    async fn list_open_jobs(&self, group_id: &str, sort_by: JobSort) -> Result<Vec<Job>> {
        let sort = sort_by.to_string();
        let builder = self
            .request(Method::GET, &["groups", group_id, "jobs"])
            .query(&[("status", "open"), ("sortBy", sort.as_str())]);
        self.send_json(builder)
            .await
            .map_err(ClientError::into_store_error)
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<Job>> {
        let builder = self.request(Method::GET, &["jobs", job_id.as_str()]);
        match self.send_json(builder).await {
            Ok(job) => Ok(Some(job)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into_store_error()),
        }
    }

    async fn lock_job(&self, job_id: &JobId, agent_id: &str, agent_name: &str) -> Result<bool> {
        let builder = self
            .request(Method::POST, &["jobs", job_id.as_str(), "lock"])
            .json(&json!({ "agentId": agent_id, "agentName": agent_name }));
        match self.send_json::<LockResponse>(builder).await {
            Ok(response) => Ok(response.locked),
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e.into_store_error()),
        }
    }

    async fn unlock_job(&self, job_id: &JobId, agent_id: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, &["jobs", job_id.as_str(), "unlock"])
            .json(&json!({ "agentId": agent_id }));
        self.send_empty(builder).await
    }

    async fn force_unlock_job(&self, job_id: &JobId, requested_by: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, &["jobs", job_id.as_str(), "force-unlock"])
            .json(&json!({ "requestedBy": requested_by }));
        self.send_empty(builder).await
    }

    async fn update_job_status(&self, job_id: &JobId, status: JobStatus) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &["jobs", job_id.as_str()])
            .json(&json!({ "status": status }));
        self.send_empty(builder).await
    }
}

#[async_trait]
impl SignalStore for HttpJobStore {
    async fn deposit_pheromone(&self, job_id: &JobId, pheromone: NewPheromone) -> Result<()> {
        let builder = self
            .request(Method::POST, &["jobs", job_id.as_str(), "pheromones"])
            .json(&pheromone);
        self.send_empty(builder).await
    }

    async fn remove_pheromone(&self, job_id: &JobId, pheromone_type: PheromoneType) -> Result<()> {
        let builder = self.request(
            Method::DELETE,
            &["jobs", job_id.as_str(), "pheromones", pheromone_type.as_str()],
        );
        self.send_empty(builder).await
    }

    async fn get_pheromones(&self, job_id: &JobId) -> Result<Vec<PheromoneDeposit>> {
        let builder = self.request(Method::GET, &["jobs", job_id.as_str(), "pheromones"]);
        self.send_json(builder)
            .await
            .map_err(ClientError::into_store_error)
    }

    async fn add_blocker(&self, job_id: &JobId, blocker: NewBlocker) -> Result<()> {
        let builder = self
            .request(Method::POST, &["jobs", job_id.as_str(), "blockers"])
            .json(&blocker);
        self.send_empty(builder).await
    }

    async fn remove_blocker(&self, job_id: &JobId, blocker_id: &str) -> Result<()> {
        let builder = self.request(
            Method::DELETE,
            &["jobs", job_id.as_str(), "blockers", blocker_id],
        );
        self.send_empty(builder).await
    }

    async fn resolve_blocker(
        &self,
        job_id: &JobId,
        blocker_id: &str,
        resolved_by: &str,
    ) -> Result<()> {
        let builder = self
            .request(
                Method::POST,
                &["jobs", job_id.as_str(), "blockers", blocker_id, "resolve"],
            )
            .json(&json!({ "resolvedBy": resolved_by }));
        self.send_empty(builder).await
    }

    async fn add_dependency(&self, from: &JobId, to: &JobId) -> Result<()> {
        let builder = self
            .request(Method::POST, &["jobs", from.as_str(), "dependencies"])
            .json(&NewDependency {
                to_job_id: to,
                dependency_type: DependencyType::Blocks,
            });
        self.send_empty(builder).await
    }

    async fn remove_dependency(&self, from: &JobId, to: &JobId) -> Result<()> {
        let builder = self.request(
            Method::DELETE,
            &["jobs", from.as_str(), "dependencies", to.as_str()],
        );
        match self.send(builder).await {
            Ok(_) => Ok(()),
            // Already gone.
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(())
            }
            Err(e) => Err(e.into_store_error()),
        }
    }

    async fn add_split_proposal(&self, job_id: &JobId, proposal: NewSplitProposal) -> Result<Job> {
        let builder = self
            .request(Method::POST, &["jobs", job_id.as_str(), "split-proposals"])
            .json(&proposal);
        self.send_json(builder)
            .await
            .map_err(ClientError::into_store_error)
    }

    async fn accept_split_proposal(&self, job_id: &JobId, proposal_id: &str) -> Result<()> {
        let builder = self.request(
            Method::POST,
            &["jobs", job_id.as_str(), "split-proposals", proposal_id, "accept"],
        );
        self.send_empty(builder).await
    }
}
