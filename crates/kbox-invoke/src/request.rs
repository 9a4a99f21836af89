use kbox_types::{InvocationRequest, KboxError, Tool};

const DOCKER_ARGS_FLAG: &str = "--docker-args";

/// Build a request from command-line arguments
///
/// `--docker-args "<string>"` as the first two arguments is split into
/// shell words and inserted into the container-runtime call; everything
/// else is passed to the tool untouched.
pub fn parse_tool_args(tool: Tool, args: Vec<String>) -> Result<InvocationRequest, KboxError> {
    if args.first().map(String::as_str) != Some(DOCKER_ARGS_FLAG) {
        return Ok(InvocationRequest::new(tool, args));
    }

    let mut args = args.into_iter().skip(1);
    let raw = args
        .next()
        .ok_or_else(|| KboxError::InvalidDockerArgs("missing value".to_string()))?;
    let docker_args = shlex::split(&raw)
        .ok_or_else(|| KboxError::InvalidDockerArgs(format!("unbalanced quotes in '{}'", raw)))?;

    Ok(InvocationRequest::new(tool, args).with_docker_args(docker_args))
}
