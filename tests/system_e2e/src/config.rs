use envconfig::Envconfig;
use netcheck_core::HarnessConfig;

#[derive(Envconfig, Debug, Clone)]
pub struct TestConfig {
    #[envconfig(from = "NETCHECK_E2E_CLUSTER_NAME", default = "spider")]
    pub cluster_name: String,

    /// Comma separated scenario names, or `all`
    #[envconfig(from = "NETCHECK_E2E_SCENARIOS", default = "all")]
    pub scenarios: String,

    #[envconfig(
        from = "NETCHECK_E2E_IMAGE",
        default = "docker.io/library/nginx:alpine"
    )]
    pub image: String,

    #[envconfig(from = "NETCHECK_E2E_REPLICAS", default = "2")]
    pub replicas: usize,

    #[envconfig(from = "NETCHECK_E2E_PORT", default = "80")]
    pub port: i32,

    /// Leave namespaces behind for debugging
    #[envconfig(from = "NETCHECK_E2E_NO_CLEANUP", default = "false")]
    pub no_cleanup: bool,

    #[envconfig(nested)]
    pub harness: HarnessConfig,
}
