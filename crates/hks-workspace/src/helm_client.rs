use std::collections::HashMap;

use async_trait::async_trait;
use hks_core::Result;
use serde_json::Value;

/// Thin seam over the Helm CLI/SDK for the shared-plan installs the
/// provisioning handler runs after the vCluster itself is ready.
#[async_trait]
pub trait HelmClient: Send + Sync + 'static {
    async fn install_or_upgrade(
        &self,
        release: &str,
        chart_path: &str,
        namespace: &str,
        values: HashMap<String, Value>,
    ) -> Result<()>;
}

pub mod fake {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeHelmClient {
        pub installs: Mutex<Vec<(String, String, String)>>,
        pub fail_release: Mutex<Option<String>>,
    }

    impl FakeHelmClient {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl HelmClient for FakeHelmClient {
        async fn install_or_upgrade(
            &self,
            release: &str,
            chart_path: &str,
            namespace: &str,
            _values: HashMap<String, Value>,
        ) -> Result<()> {
            if self.fail_release.lock().unwrap().as_deref() == Some(release) {
                return Err(hks_core::Error::provider("simulated helm install failure", true));
            }
            self.installs
                .lock()
                .unwrap()
                .push((release.to_string(), chart_path.to_string(), namespace.to_string()));
            Ok(())
        }
    }
}

pub use fake::FakeHelmClient;
