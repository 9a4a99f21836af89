use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Namespace;
use kube::Api;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;

use kbox_types::{ContextInfo, NamespaceInfo};

/// Namespace used when the current context does not set one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Contexts and selection read from the active kubeconfig
pub struct KubeContexts {
    kubeconfig: Kubeconfig,
}

impl KubeContexts {
    /// Read the kubeconfig the way kubectl does (`$KUBECONFIG`, then `~/.kube/config`)
    pub fn load() -> Result<Self> {
        let kubeconfig =
            Kubeconfig::read().context("Failed to read kubeconfig. Is kubectl configured?")?;
        Ok(Self::from_kubeconfig(kubeconfig))
    }

    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        Self { kubeconfig }
    }

    /// All contexts in file order, the current one marked
    pub fn contexts(&self) -> Vec<ContextInfo> {
        let current = self.current_context();
        self.kubeconfig
            .contexts
            .iter()
            .map(|ctx| {
                let context = ctx.context.as_ref();
                ContextInfo::new(
                    ctx.name.clone(),
                    context.map(|c| c.cluster.clone()).unwrap_or_default(),
                    context.and_then(|c| c.user.clone()).unwrap_or_default(),
                    context.and_then(|c| c.namespace.clone()),
                    Some(ctx.name.as_str()) == current,
                )
            })
            .collect()
    }

    pub fn current_context(&self) -> Option<&str> {
        self.kubeconfig.current_context.as_deref()
    }

    /// Namespace of the current context, `default` when unset
    pub fn current_namespace(&self) -> &str {
        self.current_context()
            .and_then(|current| self.kubeconfig.contexts.iter().find(|c| c.name == current))
            .and_then(|c| c.context.as_ref())
            .and_then(|c| c.namespace.as_deref())
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kubeconfig.contexts.iter().any(|c| c.name == name)
    }

    /// Client for the current context
    pub async fn client(&self) -> Result<kube::Client> {
        let context = self
            .current_context()
            .context("No current context set in kubeconfig")?
            .to_string();

        let config = kube::Config::from_custom_kubeconfig(
            self.kubeconfig.clone(),
            &KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            },
        )
        .await
        .context(format!("Failed to create config for context: {}", context))?;

        kube::Client::try_from(config)
            .context(format!("Failed to create client for context: {}", context))
    }

    /// Namespaces of the current context sorted by name, the current one marked
    pub async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        let client = self.client().await?;
        let namespaces: Api<Namespace> = Api::all(client);
        let list = namespaces
            .list(&ListParams::default())
            .await
            .context("Failed to list namespaces")?;
        debug!(count = list.items.len(), "listed namespaces");

        let mut infos: Vec<NamespaceInfo> = list
            .items
            .into_iter()
            .map(|ns| {
                let name = ns.metadata.name.unwrap_or_default();
                let status = ns
                    .status
                    .and_then(|s| s.phase)
                    .unwrap_or_else(|| "Unknown".to_string());
                NamespaceInfo::new(name, status)
            })
            .collect();
        self.mark_current(&mut infos);
        Ok(infos)
    }

    fn mark_current(&self, namespaces: &mut [NamespaceInfo]) {
        let current = self.current_namespace();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        for ns in namespaces.iter_mut() {
            ns.is_current = ns.name == current;
        }
    }
}
