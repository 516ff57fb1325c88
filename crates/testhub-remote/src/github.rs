use crate::adapter::RemoteSource;
use crate::types::{CommitQuery, RemoteBranch, RemoteCommit, RemoteFile, RemotePull};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use testhub_core::config::RemoteConfig;
use testhub_core::error::RemoteError;
use testhub_core::time::format_iso8601;
use tracing::debug;

/// REST client for a GitHub-compatible API.
///
/// Built once per process and passed by reference to whatever needs it.
pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: Option<String>,
    per_page: u32,
}

impl GitHubClient {
    /// Build a client, reading the credential from the env var named by `token_env`.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::new(config, token)
    }

    pub fn new(config: &RemoteConfig, token: Option<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(RemoteError::transport)?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            per_page: config.per_page.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let url = self.url(path);
        let mut request = self
            .client
            .get(&url)
            .header("accept", "application/vnd.github+json")
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(RemoteError::transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::not_found(path));
        }
        if !status.is_success() {
            return Err(RemoteError::Http {
                status: status.as_u16(),
                url,
            });
        }
        response.json::<T>().map_err(RemoteError::decode)
    }

    /// Fetch pages until one comes back short, or just the first page.
    fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auto_paginate: bool,
    ) -> Result<Vec<T>, RemoteError> {
        let mut out = Vec::new();
        let mut page: u32 = 1;
        loop {
            let mut paged = query.to_vec();
            paged.push(("per_page", self.per_page.to_string()));
            paged.push(("page", page.to_string()));
            let batch: Vec<T> = self.get_json(path, &paged)?;
            let fetched = batch.len();
            out.extend(batch);
            debug!(path, page, fetched, "Fetched remote page");
            if !auto_paginate || fetched < self.per_page as usize {
                break;
            }
            page += 1;
        }
        Ok(out)
    }
}

impl RemoteSource for GitHubClient {
    fn list_branches(&self, repo: &str) -> Result<Vec<RemoteBranch>, RemoteError> {
        self.get_paginated(&format!("repos/{repo}/branches"), &[], true)
    }

    fn list_commits(
        &self,
        repo: &str,
        query: &CommitQuery,
    ) -> Result<Vec<RemoteCommit>, RemoteError> {
        let mut params = vec![("sha", query.reference.clone())];
        if let Some(since) = query.since {
            params.push(("since", format_iso8601(since)));
        }
        self.get_paginated(
            &format!("repos/{repo}/commits"),
            &params,
            query.auto_paginate,
        )
    }

    fn list_open_pulls(&self, repo: &str) -> Result<Vec<RemotePull>, RemoteError> {
        self.get_paginated(
            &format!("repos/{repo}/pulls"),
            &[("state", "open".to_string())],
            true,
        )
    }

    fn get_commit(&self, repo: &str, sha: &str) -> Result<RemoteCommit, RemoteError> {
        self.get_json(&format!("repos/{repo}/commits/{sha}"), &[])
    }

    fn get_file_content(
        &self,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<RemoteFile, RemoteError> {
        self.get_json(
            &format!("repos/{repo}/contents/{path}"),
            &[("ref", reference.to_string())],
        )
    }
}
