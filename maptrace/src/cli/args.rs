//! CLI argument definitions

use clap::Parser;

use crate::config::ResolverConfig;

#[derive(Parser)]
#[command(
    name = "maptrace",
    about = "Resolve addresses of this process into backtrace lines",
    after_help = "\
EXAMPLES:
    maptrace                              Resolve a few of maptrace's own functions
    maptrace --list                       Same, then dump the memory map registry
    maptrace --json --ignore libc.so.6    JSON frames, stop at the first libc frame

Addresses are only meaningful inside this process; they are probed in place."
)]
pub struct Args {
    /// Addresses to resolve, hex with or without 0x (default: built-in samples)
    #[arg(value_name = "ADDR", value_parser = parse_address)]
    pub addresses: Vec<usize>,

    /// Stop the backtrace at the first frame in an object ending with NAME
    #[arg(long, value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Dump the memory map registry after resolving
    #[arg(long)]
    pub list: bool,

    /// Emit JSON instead of backtrace lines
    #[arg(long)]
    pub json: bool,
}

impl Args {
    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        self.ignore.iter().fold(ResolverConfig::default(), |config, name| config.ignore(name))
    }
}

/// Parse a hex address such as `7f3a2b4c780` or `0x7f3a2b4c780`
///
/// # Errors
/// Returns a message if the text is not a hex number that fits a pointer
pub fn parse_address(text: &str) -> Result<usize, String> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    usize::from_str_radix(digits, 16).map_err(|e| format!("invalid address '{text}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1000"), Ok(0x1000));
        assert_eq!(parse_address("0XfF"), Ok(0xff));
        assert_eq!(parse_address("7f3a2b4c"), Ok(0x7f3a_2b4c));
        assert!(parse_address("0x").is_err());
        assert!(parse_address("main").is_err());
    }

    #[test]
    fn test_args_to_config() {
        let args = Args::parse_from(["maptrace", "--ignore", "libc.so.6", "--json", "0x10", "20"]);

        assert_eq!(args.addresses, vec![0x10, 0x20]);
        assert!(args.json);
        assert!(!args.list);
        assert_eq!(args.resolver_config().ignored_objects, vec!["libc.so.6"]);
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Args::try_parse_from(["maptrace", "nothex"]).is_err());
    }
}
