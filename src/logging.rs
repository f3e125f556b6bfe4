use tracing_subscriber::EnvFilter;

/// Filter directive for the given `-v` count, starting from `base`.
pub fn directive(verbosity: u8, base: &str) -> &str {
    match verbosity {
        0 => base,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over everything else.
pub fn init(verbosity: u8, base: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive(verbosity, base)))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "error")]
    #[case(1, "info")]
    #[case(2, "debug")]
    #[case(3, "trace")]
    #[case(9, "trace")]
    fn test_directive(#[case] verbosity: u8, #[case] expected: &str) {
        assert_eq!(directive(verbosity, "error"), expected);
    }
}
