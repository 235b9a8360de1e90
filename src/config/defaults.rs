//! Default configuration values

/// Default Talos installer image
pub const DEFAULT_IMAGE: &str = "factory.talos.dev/nocloud-installer/6adc7e7fba27948460e2231e5272e88b85159da3f3db980551976bf9898ff64b:v1.12.2";

/// Default Kubernetes version
pub const DEFAULT_K8S_VERSION: &str = "1.35.0";

/// Default directory for generated configs
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Default cluster name
pub const DEFAULT_CLUSTER_NAME: &str = "talos-demo";

/// Default network interface
pub const DEFAULT_IFACE: &str = "ens18";

/// Default network prefix length
pub const DEFAULT_NETMASK: &str = "24";

/// Default DNS servers
pub const DEFAULT_DNS: [&str; 2] = ["8.8.8.8", "8.8.4.4"];

/// Default NTP servers
pub const DEFAULT_NTP: [&str; 3] = [
    "1.ru.pool.ntp.org",
    "2.ru.pool.ntp.org",
    "3.ru.pool.ntp.org",
];

/// Default install disk
pub const DEFAULT_DISK: &str = "/dev/sda";

/// Maximum number of control planes
pub const MAX_CONTROL_PLANES: usize = 7;

/// Maximum number of workers
pub const MAX_WORKERS: usize = 15;

/// kubelet maxPods when the raised limit is requested
pub const RAISED_MAX_PODS: u32 = 512;

/// Kubernetes API server port
pub const API_SERVER_PORT: u16 = 6443;

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Smoke-test arguments for an installed binary
pub const SMOKE_TEST_ARGS: &[&str] = &["--version"];
