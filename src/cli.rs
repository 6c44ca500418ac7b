use clap::{Parser, Subcommand};

/// Introspector: find out what an access token means
#[derive(Parser)]
#[command(name = "introspector", version, about)]
pub struct Cli {
    /// Print the Prometheus counters after the command (ignored with the DogStatsD sink)
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Introspect a token and print the result as JSON
    Introspect {
        token: String,
        /// Bypass the cache layer
        #[arg(long)]
        no_cache: bool,
    },

    /// Check whether a token grants a permission
    Allowed {
        token: String,
        #[arg(long, default_value = "")]
        action: String,
        #[arg(long, default_value = "")]
        resource: String,
        /// Context attribute, repeatable
        #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_pair)]
        context: Vec<(String, String)>,
        /// Required scope, repeatable
        #[arg(long = "scope", value_name = "SCOPE")]
        scopes: Vec<String>,
        /// Bypass the cache layer
        #[arg(long)]
        no_cache: bool,
    },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("'{}' must be in the form key=value", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allowed() {
        let cli = Cli::try_parse_from([
            "introspector",
            "--print-metrics",
            "allowed",
            "tok",
            "--action",
            "drive",
            "--context",
            "weather=windy",
            "--scope",
            "profile:cars",
        ])
        .unwrap();
        assert!(cli.print_metrics);
        match cli.command {
            Commands::Allowed { action, context, scopes, resource, .. } => {
                assert_eq!(action, "drive");
                assert_eq!(resource, "");
                assert_eq!(context, vec![("weather".to_string(), "windy".to_string())]);
                assert_eq!(scopes, vec!["profile:cars"]);
            }
            _ => panic!("expected allowed"),
        }
    }

    #[test]
    fn test_bad_context_pair_rejected() {
        let res = Cli::try_parse_from(["introspector", "allowed", "tok", "--context", "windy"]);
        assert!(res.is_err());
    }
}
