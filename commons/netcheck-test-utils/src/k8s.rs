use k8s_openapi::api::core::v1::Namespace;
use kube::{
    Client,
    api::{Api, DeleteParams},
};

/// Deletes a namespace (and with it everything a scenario created) when
/// dropped. Must be dropped inside a tokio runtime.
pub struct NamespaceGuard {
    name: String,
    client: Client,
    keep: bool,
}

impl NamespaceGuard {
    pub fn new(name: &str, client: Client) -> Self {
        Self {
            name: name.to_string(),
            client,
            keep: false,
        }
    }

    /// Leave the namespace behind for debugging.
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        if self.keep {
            tracing::info!(ns = %self.name, "keeping namespace");
            return;
        }
        let name = self.name.clone();
        let client = self.client.clone();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(ns = %name, "no runtime; namespace not deleted");
            return;
        };
        handle.spawn(async move {
            let api: Api<Namespace> = Api::all(client);
            if let Err(e) = api.delete(&name, &DeleteParams::default()).await {
                tracing::warn!(ns = %name, error = %e, "namespace cleanup failed");
            }
        });
    }
}
