use kbox_types::{Tool, ToolSpec};

/// Container runtime used when nothing else is configured
pub const DEFAULT_RUNTIME: &str = "docker";

/// Built-in image and version for a tool
pub fn default_spec(tool: Tool) -> ToolSpec {
    let (image, version) = match tool {
        Tool::Kubectl => ("bitnami/kubectl", "1.15.12"),
        Tool::Helm => ("alpine/helm", "2.16.12"),
        Tool::Vault => ("vault", "1.5.4"),
        Tool::Stim => ("premiereglobal/stim", "0.1.7"),
        Tool::Kops => ("premiereglobal/kops", "1.15.3"),
        Tool::Terraform => ("hashicorp/terraform", "0.12.29"),
    };
    ToolSpec::new(tool, image, version)
}
