//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Targets that are only interesting when something goes wrong
const QUIET_TARGETS: &[&str] = &["aws_config", "aws_sdk_ec2", "aws_sdk_sts", "aws_smithy_runtime"];

/// Build the log filter: `RUST_LOG` if set, `info` otherwise, with the AWS SDK
/// held at `warn` unless `RUST_LOG` names it explicitly.
pub fn env_filter() -> EnvFilter {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let mut filter = match from_env.as_deref() {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new("info"),
    };

    for target in QUIET_TARGETS {
        if from_env.as_deref().is_some_and(|d| d.contains(target)) {
            continue;
        }
        if let Ok(directive) = format!("{target}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Install the global subscriber. Logs go to stderr so the report on stdout
/// stays readable.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_quiets_sdk_targets() {
        let rendered = env_filter().to_string();
        for target in QUIET_TARGETS {
            assert!(rendered.contains(target), "missing directive for {target}");
        }
    }
}
