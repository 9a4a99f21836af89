use anyhow::{Context, Result};
use tracing::info;

use kbox_invoke::{InvocationRequest, Invoker, ProcessRunner};
use kbox_types::{KboxError, Tool, ToolSpec};

use crate::client::KubeContexts;

/// Make `name` the current context
///
/// The kubeconfig is checked first so a typo fails without starting kubectl.
pub async fn switch_context<R: ProcessRunner>(
    invoker: &Invoker<R>,
    kubectl: &ToolSpec,
    contexts: &KubeContexts,
    name: &str,
) -> Result<()> {
    if !contexts.contains(name) {
        return Err(KboxError::ContextNotFound(name.to_string()).into());
    }
    run_kubectl(invoker, kubectl, &["config", "use-context", name])
        .await
        .context(format!("Failed to switch to context: {}", name))?;
    info!(context = name, "switched context");
    Ok(())
}

/// Set the namespace of the current context
pub async fn switch_namespace<R: ProcessRunner>(
    invoker: &Invoker<R>,
    kubectl: &ToolSpec,
    namespace: &str,
) -> Result<()> {
    run_kubectl(
        invoker,
        kubectl,
        &["config", "set-context", "--current", "--namespace", namespace],
    )
    .await
    .context(format!("Failed to switch to namespace: {}", namespace))?;
    info!(namespace, "switched namespace");
    Ok(())
}

async fn run_kubectl<R: ProcessRunner>(
    invoker: &Invoker<R>,
    kubectl: &ToolSpec,
    args: &[&str],
) -> Result<(), KboxError> {
    let request = InvocationRequest::new(Tool::Kubectl, args.iter().copied());
    invoker
        .invoke(kubectl, &request)
        .await?
        .into_success(Tool::Kubectl)?;
    Ok(())
}
