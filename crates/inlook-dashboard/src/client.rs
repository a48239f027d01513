use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::instance::InstanceNode;
use crate::registry::RegistrySource;

const API_PREFIX: [&str; 2] = ["api", "v1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootAction {
    Instantiate,
    Execute,
    Reset,
    Shutdown,
}

impl RootAction {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Instantiate => "instantiate-root-recursive",
            Self::Execute => "execute-root-recursive",
            Self::Reset => "reset-all-instances",
            Self::Shutdown => "shutdown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Instantiate => "instantiate",
            Self::Execute => "execute",
            Self::Reset => "reset",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    http: Client,
    // Registry lookups are not bounded by the request timeout.
    registry_http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::msg(format!("invalid base URL '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::msg(format!("invalid base URL '{base_url}'")));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::msg(format!("failed to build HTTP client: {e}")))?;
        let registry_http = Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| Error::msg(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base,
            http,
            registry_http,
        })
    }

    pub fn from_config(cfg: &ServerConfig) -> Result<Self> {
        Self::new(&cfg.resolve_base_url(), cfg.timeout())
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::msg(format!("invalid base URL '{}'", self.base)))?;
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        Ok(url)
    }

    pub fn fetch_instance_tree(&self) -> Result<InstanceNode> {
        let url = self.endpoint(&["fetch-plugin-instance-tree"])?;
        get_json(&self.http, url)
    }

    pub fn fetch_plugin_names(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["fetch-plugin-name"])?;
        get_json(&self.http, url)
    }

    pub fn fetch_registry_implements(&self, create_func: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&["fetch-plugin-registry-implements", create_func])?;
        get_json(&self.registry_http, url)
    }

    pub fn fetch_workflows(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["fetch-workflows"])?;
        get_json(&self.http, url)
    }

    pub fn set_workflow(&self, workflow: &str) -> Result<()> {
        let workflow = workflow.trim();
        if workflow.is_empty() {
            return Err(Error::msg("no workflow selected"));
        }
        let url = self.endpoint(&["set-workflow"])?;
        info!(workflow, "selecting workflow");
        let res = self
            .http
            .post(url)
            .json(&json!({ "workflow": workflow }))
            .send()?;
        check_status(res, "set-workflow").map(|_| ())
    }

    pub fn run_action(&self, action: RootAction) -> Result<()> {
        let url = self.endpoint(&[action.endpoint()])?;
        info!(action = action.label(), %url, "requesting root action");
        let res = self.http.post(url).send()?;
        check_status(res, action.endpoint()).map(|_| ())
    }
}

impl RegistrySource for ApiClient {
    fn implementations(&self, create_func: &str) -> Result<Vec<String>> {
        self.fetch_registry_implements(create_func)
    }
}

fn get_json<T: DeserializeOwned>(http: &Client, url: Url) -> Result<T> {
    debug!(%url, "GET");
    let what = url.path().to_string();
    let res = http.get(url).send()?;
    let res = check_status(res, &what)?;
    res.json::<T>()
        .map_err(|e| Error::msg(format!("{what}: unexpected response body: {e}")))
}

fn check_status(res: Response, what: &str) -> Result<Response> {
    if res.status().is_success() {
        return Ok(res);
    }
    Err(Error::msg(format!(
        "{what} failed with status {}",
        res.status()
    )))
}
