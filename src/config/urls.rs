//! Upstream URLs

/// Project homepage
pub const HOMEPAGE: &str = "https://github.com/vasyakrg/talostpl";

/// GitHub API endpoint for the latest release
pub const LATEST_RELEASE_API: &str =
    "https://api.github.com/repos/vasyakrg/talostpl/releases/latest";

/// Release listing
pub const RELEASES_PAGE: &str = "https://github.com/vasyakrg/talostpl/releases";

/// Registry mirrors used for docker.io
pub const DOCKER_IO_MIRRORS: [&str; 2] = ["https://dockerhub.timeweb.cloud", "https://mirror.gcr.io"];

/// Cilium installation guide shown after bootstrap
pub const CILIUM_DOCS: &str = "https://docs.cilium.io/en/stable/gettingstarted/k8s-install-default/";

/// kubectl installation guide
pub const KUBECTL_DOCS: &str = "https://kubernetes.io/docs/tasks/tools/install-kubectl/";

/// kubectl installation guide for Windows
pub const KUBECTL_WINDOWS_DOCS: &str = "https://kubernetes.io/docs/tasks/tools/install-kubectl-windows/";

/// talosctl installation guide
pub const TALOSCTL_DOCS: &str =
    "https://www.talos.dev/v1.5/introduction/getting-started/#installing-talosctl";
