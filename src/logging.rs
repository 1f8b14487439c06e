use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// Install the global subscriber: `RUST_LOG`-style filtering, terse
/// stderr output. Call once per process.
pub fn init_logging(stderr: bool) {
  let env_filter = EnvFilter::from_default_env();

  let stderr_log = if stderr {
    Some(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
  } else {
    None
  };

  registry().with(env_filter).with(stderr_log).init();
}

#[allow(dead_code)]
pub(crate) fn init_test_logging() {
  let env_filter = EnvFilter::from_default_env();

  let stderr_log = fmt::layer().with_target(false).without_time().with_test_writer();

  registry().with(env_filter).with(stderr_log).try_init().ok();
}
