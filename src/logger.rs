use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt::time, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the tracing subscriber. Logs go to stderr so command output stays clean.
///
/// `verbosity` raises the crate's own level: 0 keeps the default, 1 is debug, 2+ is trace.
pub fn init(verbosity: u8) -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_timer(time::uptime()),
        )
        .with(env_filter(verbosity, rust_log.as_deref())?)
        .try_init()?;
    Ok(())
}

/// Build the log filter. A non-empty `RUST_LOG` replaces the build-profile
/// default; `-v` flags still apply on top of it.
pub fn env_filter(verbosity: u8, rust_log: Option<&str>) -> anyhow::Result<EnvFilter> {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::WARN.into());
    let filter = match rust_log.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            let filter = builder.parse(raw)?;
            match verbose_level(verbosity) {
                Some(level) => filter.add_directive(format!("tag_runners={}", level).parse()?),
                None => filter,
            }
        }
        None => {
            let level = verbose_level(verbosity).unwrap_or(if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            });
            builder
                .parse("")?
                .add_directive(format!("tag_runners={}", level).parse()?)
        }
    };
    Ok(filter)
}

fn verbose_level(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}
