use crate::CLAP_STYLING;
use clap::{arg, command};
use swarmwatch_core::config::DEFAULT_CONFIG_PATH;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("swarmwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("swarmwatch")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Load a saved page and annotate its comments with bot swarm risk badges, \
                re-scanning on a timer as the live page would.",
                )
                .arg(
                    arg!(-p --"page" <PATH>)
                        .required(true)
                        .help("Path to an HTML snapshot of the page")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-H --"host" <HOST>)
                        .required(true)
                        .help("Host the page was served from, e.g. www.reddit.com or a full URL"),
                )
                .arg(
                    arg!(-e --"endpoint" <URL>)
                        .required(false)
                        .help("Scoring service endpoint (overrides the config file)")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to the config file")
                        .default_value(DEFAULT_CONFIG_PATH),
                )
                .arg(
                    arg!(-n --"cycles" <NUM_CYCLES>)
                        .required(false)
                        .help("Stop after this many scan cycles (default: scan until interrupted)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("submit")
                .about("Score ad-hoc comments directly against the scoring service")
                .arg(
                    arg!(-m --"comment" <COMMENT>)
                        .required(true)
                        .help("A comment as \"author: text\" or just \"text\". Repeatable.")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-e --"endpoint" <URL>)
                        .required(false)
                        .help("Scoring service endpoint")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to the config file")
                        .default_value(DEFAULT_CONFIG_PATH),
                ),
        )
        .subcommand(
            command!("health")
                .about("Check that the scoring service is up")
                .arg(
                    arg!(-e --"endpoint" <URL>)
                        .required(false)
                        .help("Scoring service endpoint")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to the config file")
                        .default_value(DEFAULT_CONFIG_PATH),
                ),
        )
}
