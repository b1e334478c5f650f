// -
// Annotation marker

/// Private prefix for every annotation the controller writes
pub const ANNOTATION_PREFIX: &str = "registrar.workloads.io";

pub const ANNOTATION_REGISTERED: &str = "registrar.workloads.io/registered";
pub const ANNOTATION_LAST_UPDATED: &str = "registrar.workloads.io/last-updated";
pub const ANNOTATION_LAST_VERSION: &str = "registrar.workloads.io/last-version";

// -
// Registry

/// Environment variable selecting the registry base address
pub const REGISTRY_ADDRESS_ENV: &str = "REGISTRY_API_ADDRESS";

pub const DEFAULT_REGISTRY_ADDRESS: &str = "localhost:8090/deployments";

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

// -
// Configuration

/// Prefix of layered environment overrides, e.g. `REGISTRAR__CONTROLLER__WORKERS`
pub const CONFIG_ENV_PREFIX: &str = "REGISTRAR";

pub const CONFIG_FILE: &str = "config/registrar";

pub const QUEUE_NAME: &str = "workloads";
