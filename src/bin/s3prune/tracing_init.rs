// Logs go to stderr; stdout belongs to the progress line.

use std::env;
use std::io::IsTerminal;

use s3prune::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";

const AWS_SDK_TARGETS: &[&str] = &["aws_sdk_s3", "aws_smithy_runtime", "aws_config", "aws_sigv4"];

pub fn init_tracing(config: &TracingConfig) {
    let (event_filter, show_target) = event_filter(config, env::var(EVENT_FILTER_ENV_VAR).ok());

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .compact()
        .with_ansi(!config.disable_color_tracing && std::io::stderr().is_terminal())
        .with_env_filter(event_filter)
        .with_target(show_target);

    if config.json_tracing {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }
}

/// Returns the filter directive and whether event targets are shown.
///
/// `--aws-sdk-tracing` wins over `RUST_LOG`. Targets are only hidden when
/// s3prune is the sole source of events.
fn event_filter(config: &TracingConfig, rust_log: Option<String>) -> (String, bool) {
    let level = config.tracing_level;

    if config.aws_sdk_tracing {
        let mut directives = vec![format!("s3prune={level}")];
        directives.extend(AWS_SDK_TARGETS.iter().map(|target| format!("{target}={level}")));
        return (directives.join(","), true);
    }

    match rust_log {
        Some(filter) => (filter, true),
        None => (format!("s3prune={level}"), false),
    }
}
