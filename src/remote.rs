// src/remote.rs

use crate::error::{Error, Result};
use crate::model::{DeploymentRecord, LatestDeploy};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Where the tracking service lives and how to authenticate against it
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Identifies the deployment stream a run reports on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub organization: String,
    pub deployment: String,
    pub environment: String,
}

/// The two remote operations the deploy pipeline needs.
pub trait DeploymentService {
    fn latest_deploy(&self, target: &Target) -> Result<Option<LatestDeploy>>;

    fn register_deploy(&self, target: &Target, record: &DeploymentRecord) -> Result<()>;
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Ailing,
    Unhealthy,
    /// Clear a previously set health
    Reset,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Health::Healthy => "HEALTHY",
            Health::Ailing => "AILING",
            Health::Unhealthy => "UNHEALTHY",
            Health::Reset => "reset",
        };
        f.write_str(value)
    }
}

pub struct TrackerClient {
    config: RemoteConfig,
    http: Client,
}

impl TrackerClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        // Requests are never retried or cut short.
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn graphql_url(&self) -> String {
        format!("{}/graphql", self.base_url())
    }

    fn with_api_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("apikey {}", self.config.api_key))
    }

    fn with_bearer(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
    }

    /// Marks a recorded deploy. Returns whether the service accepted the change.
    pub fn set_health(&self, target: &Target, deploy_slug: &str, health: Health) -> Result<bool> {
        let query = format!(
            "mutation {{ setHealth(orgSlug: {}, deploymentSlug: {}, deploySlug: {}, health: {}) {{ success }} }}",
            quoted(&target.organization),
            quoted(&target.deployment),
            quoted(deploy_slug),
            quoted(&health.to_string()),
        );
        let request = self
            .with_bearer(self.http.post(self.graphql_url()))
            .json(&GraphQlRequest { query: &query });
        let data: SetHealthData = decode_graphql(request.send()?)?;
        Ok(data.set_health.success)
    }

    /// Uploads a rules file for validation and returns the titles of the parsed rules.
    pub fn validate_rules(&self, organization: &str, deployment: &str, path: &Path) -> Result<Vec<String>> {
        let query = format!(
            "mutation ($file: Upload!) {{ validateRules(orgSlug: {}, deploymentSlug: {}, file: $file) {{ rules {{ title }} }} }}",
            quoted(organization),
            quoted(deployment),
        );
        let operations = serde_json::json!({ "query": query, "variables": { "file": null } });
        let map = serde_json::json!({ "0": ["variables.file"] });
        let form = multipart::Form::new()
            .text("operations", operations.to_string())
            .text("map", map.to_string())
            .file("0", path)?;

        let request = self
            .with_bearer(self.http.post(self.graphql_url()))
            .multipart(form);
        let data: ValidateRulesData = decode_graphql(request.send()?)?;
        Ok(data.validate_rules.rules.into_iter().map(|r| r.title).collect())
    }
}

impl DeploymentService for TrackerClient {
    fn latest_deploy(&self, target: &Target) -> Result<Option<LatestDeploy>> {
        let query = format!(
            "{{ deployment(orgSlug: {}, deploymentSlug: {}) {{ ... on CodeChangeSource {{ latestChange(environmentSlug: {}) {{ revision slug url }} }} }} }}",
            quoted(&target.organization),
            quoted(&target.deployment),
            quoted(&target.environment),
        );
        let request = self
            .with_api_key(self.http.get(self.graphql_url()))
            .json(&GraphQlRequest { query: &query });
        let data: LatestChangeData = decode_graphql(request.send()?)?;

        let latest = data.deployment.and_then(|d| d.latest_change).map(|change| LatestDeploy {
            slug: change.slug,
            revision: change.revision,
            url: change.url,
        });
        debug!(?latest, "looked up latest deploy");
        Ok(latest)
    }

    fn register_deploy(&self, target: &Target, record: &DeploymentRecord) -> Result<()> {
        let body = RegisterDeployBody {
            record,
            ignore_if_duplicate: "true",
        };
        println!("Sending: \n{}", serde_json::to_string_pretty(&body)?);

        let url = format!(
            "{}/api/1/deployments/{}/{}/register_deploy",
            self.base_url(),
            target.organization,
            target.deployment
        );
        let response = self.with_api_key(self.http.post(url)).json(&body).send()?;
        check_status(response)?;
        Ok(())
    }
}

/// Renders a GraphQL string literal. JSON string escaping is a subset of what
/// GraphQL accepts, so serde_json does the quoting.
fn quoted(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Reads the body and fails unless the status is a success.
fn check_status(response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text()?;
    classify(status, body)
}

/// 401 is a credential problem; any other non-2xx carries the service's own explanation.
fn classify(status: StatusCode, body: String) -> Result<String> {
    if status == StatusCode::UNAUTHORIZED {
        warn!(%status, %body, "tracking service rejected credentials");
        return Err(Error::Authentication);
    }
    if !status.is_success() {
        warn!(%status, "tracking service returned an error");
        return Err(Error::RemoteValidation(body));
    }
    Ok(body)
}

fn decode_graphql<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = check_status(response)?;
    let parsed: GraphQlResponse<T> = serde_json::from_str(&body)?;
    parsed.into_data()
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl<T> GraphQlResponse<T> {
    fn into_data(self) -> Result<T> {
        if !self.errors.is_empty() {
            let messages: Vec<_> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(Error::RemoteValidation(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| Error::RemoteValidation("response carried no data".to_string()))
    }
}

#[derive(Deserialize)]
struct LatestChangeData {
    deployment: Option<DeploymentNode>,
}

#[derive(Deserialize)]
struct DeploymentNode {
    #[serde(rename = "latestChange", default)]
    latest_change: Option<LatestChangeNode>,
}

#[derive(Deserialize)]
struct LatestChangeNode {
    revision: String,
    slug: String,
    url: String,
}

#[derive(Deserialize)]
struct SetHealthData {
    #[serde(rename = "setHealth")]
    set_health: SetHealthNode,
}

#[derive(Deserialize)]
struct SetHealthNode {
    success: bool,
}

#[derive(Deserialize)]
struct ValidateRulesData {
    #[serde(rename = "validateRules")]
    validate_rules: ValidateRulesNode,
}

#[derive(Deserialize)]
struct ValidateRulesNode {
    rules: Vec<RuleNode>,
}

#[derive(Deserialize)]
struct RuleNode {
    title: String,
}

#[derive(Serialize)]
struct RegisterDeployBody<'a> {
    #[serde(flatten)]
    record: &'a DeploymentRecord,
    ignore_if_duplicate: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileChange, UrlTemplates};
    use chrono::Utc;

    #[test]
    fn quoted_escapes_graphql_strings() {
        assert_eq!(quoted("acme"), "\"acme\"");
        assert_eq!(quoted("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn health_renders_as_the_service_expects() {
        assert_eq!(Health::Healthy.to_string(), "HEALTHY");
        assert_eq!(Health::Unhealthy.to_string(), "UNHEALTHY");
        assert_eq!(Health::Reset.to_string(), "reset");
    }

    #[test]
    fn unauthorized_is_an_authentication_failure() {
        let result = classify(StatusCode::UNAUTHORIZED, "bad key".to_string());
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn other_failures_keep_the_body_verbatim() {
        for status in [StatusCode::UNPROCESSABLE_ENTITY, StatusCode::INTERNAL_SERVER_ERROR, StatusCode::FORBIDDEN] {
            let body = "{\"detail\": \"unknown environment 'prod'\"}\n".to_string();
            match classify(status, body.clone()) {
                Err(Error::RemoteValidation(detail)) => assert_eq!(detail, body),
                other => panic!("expected RemoteValidation for {status}, got {other:?}"),
            }
        }
    }

    #[test]
    fn success_statuses_pass_the_body_through() {
        assert_eq!(classify(StatusCode::OK, "{}".to_string()).unwrap(), "{}");
        assert_eq!(classify(StatusCode::NO_CONTENT, String::new()).unwrap(), "");
    }

    #[test]
    fn latest_change_decodes() {
        let body = r#"{"data":{"deployment":{"latestChange":{"revision":"abc","slug":"d-1","url":"/d/1"}}}}"#;
        let parsed: GraphQlResponse<LatestChangeData> = serde_json::from_str(body).unwrap();
        let change = parsed.into_data().unwrap().deployment.unwrap().latest_change.unwrap();
        assert_eq!(change.revision, "abc");
        assert_eq!(change.slug, "d-1");
        assert_eq!(change.url, "/d/1");
    }

    #[test]
    fn missing_latest_change_means_no_baseline() {
        let body = r#"{"data":{"deployment":{"latestChange":null}}}"#;
        let parsed: GraphQlResponse<LatestChangeData> = serde_json::from_str(body).unwrap();
        let data = parsed.into_data().unwrap();
        assert!(data.deployment.unwrap().latest_change.is_none());

        let body = r#"{"data":{"deployment":{}}}"#;
        let parsed: GraphQlResponse<LatestChangeData> = serde_json::from_str(body).unwrap();
        assert!(parsed.into_data().unwrap().deployment.unwrap().latest_change.is_none());
    }

    #[test]
    fn graphql_errors_surface_as_validation_failures() {
        let body = r#"{"data":null,"errors":[{"message":"no such org"},{"message":"try again"}]}"#;
        let parsed: GraphQlResponse<LatestChangeData> = serde_json::from_str(body).unwrap();
        match parsed.into_data() {
            Err(Error::RemoteValidation(detail)) => assert_eq!(detail, "no such org; try again"),
            other => panic!("expected RemoteValidation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn register_body_carries_record_and_flags() {
        let templates = UrlTemplates {
            commit: "https://example.com/REVISION".to_string(),
            file: "https://example.com/REVISION/PATH".to_string(),
        };
        let record = DeploymentRecord {
            head_revision: "abc".to_string(),
            environment: "production".to_string(),
            timestamp: Utc::now(),
            commits: Vec::new(),
            files: vec![FileChange::new(&templates, "abc", "a.txt")],
            pull_requests: Vec::new(),
        };
        let body = RegisterDeployBody {
            record: &record,
            ignore_if_duplicate: "true",
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["sha"], "abc");
        assert_eq!(json["environment"], "production");
        assert_eq!(json["ignore_if_duplicate"], "true");
        assert_eq!(json["pull_requests"], serde_json::json!([]));
        assert_eq!(json["commits"], serde_json::json!([]));
        assert_eq!(
            json["files"],
            serde_json::json!([{ "path": "a.txt", "url": "https://example.com/abc/a.txt", "additions": 0, "deletions": 0 }])
        );
        assert!(json["date"].is_string());
    }
}
