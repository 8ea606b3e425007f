/// Runtime API version the protocol paths are rooted at.
pub const DEFAULT_API_VERSION: &str = "2018-06-01";

/// Header carrying the id of the invocation returned by `/invocation/next`.
pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";

/// Header carrying the distributed-trace id, when tracing is active.
pub const TRACE_ID_HEADER: &str = "Lambda-Runtime-Trace-Id";

/// Location of the platform's runtime API. Built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEndpoint {
    authority: String,
    api_version: String,
}

impl RuntimeEndpoint {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            api_version: DEFAULT_API_VERSION.into(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    fn base(&self) -> String {
        format!("http://{}/{}/runtime", self.authority, self.api_version)
    }

    pub fn next_invocation_url(&self) -> String {
        format!("{}/invocation/next", self.base())
    }

    pub fn response_url(&self, request_id: &str) -> String {
        format!("{}/invocation/{request_id}/response", self.base())
    }

    pub fn init_error_url(&self) -> String {
        format!("{}/init/error", self.base())
    }

    pub fn invocation_error_url(&self, request_id: &str) -> String {
        format!("{}/invocation/{request_id}/error", self.base())
    }
}
