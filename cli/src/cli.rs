//! CLI argument definitions using clap

use clap::Parser;

/// Build a URL inside a sandboxed guest and fetch it
#[derive(Parser, Debug, Default)]
#[command(name = "guestfetch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Host or URL to pass through the guest
    #[arg(short, long, default_value = "")]
    pub url: String,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_absent_is_empty() {
        let cli = Cli::try_parse_from(["guestfetch"]).unwrap();
        assert_eq!(cli.url, "");
        assert!(!cli.verbose);
    }

    #[test]
    fn test_url_short_and_long_flags() {
        for args in [
            ["guestfetch", "-u", "example.com"],
            ["guestfetch", "--url", "example.com"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(cli.url, "example.com");
        }
        let cli = Cli::try_parse_from(["guestfetch", "--url=https://example.com", "-v"]).unwrap();
        assert_eq!(cli.url, "https://example.com");
        assert!(cli.verbose);
    }

    #[test]
    fn test_url_flag_requires_value() {
        assert!(Cli::try_parse_from(["guestfetch", "--url"]).is_err());
        assert!(Cli::try_parse_from(["guestfetch", "example.com"]).is_err());
    }
}
