use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "prov",
    about = "Provenance anchoring: hash, sign, and anchor content digests",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Private key PEM [default: provenance_key.pem, or PROV_KEY_PATH]
    #[arg(long, global = true)]
    pub key_path: Option<PathBuf>,

    /// Hash log JSON file [default: data/hashes.json, or PROV_HASH_LOG]
    #[arg(long, global = true)]
    pub log_path: Option<PathBuf>,

    /// TOML file with service settings and a [ledger] table, re-read on
    /// every ledger call. Without it, ledger settings come from PROV_LEDGER_*.
    #[arg(long, global = true)]
    pub ledger_config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the SHA-256 digest of a file (or stdin with "-")
    Hash(InputArgs),
    /// Sign a hex digest
    Sign(DigestArgs),
    /// Verify a signature over a hex digest
    Verify(VerifyArgs),
    /// Print the public key PEM
    Pubkey,
    /// Publish the public key to the ledger
    PublishPubkey,
    /// Append a hex digest to the hash log
    Ingest(DigestArgs),
    /// Hash, log, and sign a file (or stdin with "-")
    Record(InputArgs),
    /// Print the current Merkle root of the hash log
    Root,
    /// Print an inclusion proof for a logged digest
    Proof(DigestArgs),
    /// Anchor the current Merkle root to the ledger
    Anchor(AnchorArgs),
    /// Anchor on a fixed interval
    Schedule(ScheduleArgs),
    /// Start the HTTP API
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct InputArgs {
    /// Path, or "-" for stdin
    pub input: String,
}

#[derive(Args)]
pub struct DigestArgs {
    /// 64 hex characters
    pub digest: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub digest: String,
    /// DER signature, hex
    pub signature: String,
}

#[derive(Args)]
pub struct AnchorArgs {
    /// Batch identifier [default: generated]
    #[arg(long)]
    pub batch_id: Option<String>,
}

#[derive(Args)]
pub struct ScheduleArgs {
    /// Seconds between cycles
    #[arg(long, default_value = "60")]
    pub interval: u64,
    /// Stop after this many cycles [default: run until interrupted]
    #[arg(long)]
    pub runs: Option<u32>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:9001")]
    pub bind: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    const H1: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn parse_hash_stdin() {
        let cli = Cli::try_parse_from(["prov", "hash", "-"]).unwrap();
        if let Command::Hash(args) = cli.command {
            assert_eq!(args.input, "-");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_sign() {
        let cli = Cli::try_parse_from(["prov", "sign", H1]).unwrap();
        if let Command::Sign(args) = cli.command {
            assert_eq!(args.digest, H1);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verify() {
        let cli = Cli::try_parse_from(["prov", "verify", H1, "3045"]).unwrap();
        if let Command::Verify(args) = cli.command {
            assert_eq!(args.signature, "3045");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn verify_requires_signature() {
        assert!(Cli::try_parse_from(["prov", "verify", H1]).is_err());
    }

    #[test]
    fn parse_publish_pubkey() {
        let cli = Cli::try_parse_from(["prov", "publish-pubkey"]).unwrap();
        assert!(matches!(cli.command, Command::PublishPubkey));
    }

    #[test]
    fn parse_anchor_with_batch() {
        let cli = Cli::try_parse_from(["prov", "anchor", "--batch-id", "nightly-1"]).unwrap();
        if let Command::Anchor(args) = cli.command {
            assert_eq!(args.batch_id.as_deref(), Some("nightly-1"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_schedule_defaults() {
        let cli = Cli::try_parse_from(["prov", "schedule"]).unwrap();
        if let Command::Schedule(args) = cli.command {
            assert_eq!(args.interval, 60);
            assert!(args.runs.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_schedule_bounded() {
        let cli = Cli::try_parse_from(["prov", "schedule", "--interval", "5", "--runs", "3"]).unwrap();
        if let Command::Schedule(args) = cli.command {
            assert_eq!(args.interval, 5);
            assert_eq!(args.runs, Some(3));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve_bind() {
        let cli = Cli::try_parse_from(["prov", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind.port(), 8080);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn serve_default_bind() {
        let cli = Cli::try_parse_from(["prov", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, "127.0.0.1:9001".parse::<SocketAddr>().unwrap());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "prov", "root", "--format", "json", "-vv", "--key-path", "k.pem", "--log-path", "h.json",
            "--ledger-config", "prov.toml",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Root));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.key_path, Some(PathBuf::from("k.pem")));
        assert_eq!(cli.log_path, Some(PathBuf::from("h.json")));
        assert_eq!(cli.ledger_config, Some(PathBuf::from("prov.toml")));
    }

    #[test]
    fn unknown_format_rejected() {
        assert!(Cli::try_parse_from(["prov", "root", "--format", "yaml"]).is_err());
    }
}
