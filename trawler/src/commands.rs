use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("trawler")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("trawler")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Fetch a list of pages and extract emails, phone numbers, social profiles \
                and the people named on them.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("A single URL to crawl")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to crawl ('#' starts a comment)")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("YAML file with crawl options. Flags override its values.")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of pages fetched at once (default: 5)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-p --"proxy-file" <PATH>)
                        .required(false)
                        .help("Route requests through the proxies in this file (host:port[:user:pass] per line)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"rotation" <STRATEGY>)
                        .required(false)
                        .help("How the next proxy is chosen (default: round-robin)")
                        .value_parser(["none", "random", "round-robin", "smart"]),
                )
                .arg(
                    arg!(-r --"retries" <NUM>)
                        .required(false)
                        .help("Attempts per URL before giving up (default: 3)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"cooldown-ms" <MS>)
                        .required(false)
                        .help("Minimum gap between two requests to the same host (default: 5000)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"min-delay-ms" <MS>)
                        .required(false)
                        .help("Upper bound of the random pause before every request (default: 1000)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"names-db" <PATH>)
                        .required(false)
                        .help("CSV of first names, last names and roles (default: built-in list)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"no-people")
                        .required(false)
                        .help("Skip people detection")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-social")
                        .required(false)
                        .help("Skip LinkedIn and GitHub profile extraction")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-facebook")
                        .required(false)
                        .help("Skip Facebook profile extraction")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-inference")
                        .required(false)
                        .help("Never ask the inference endpoint about people")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_url_and_hosts_file_conflict() {
        let result = command_argument_builder().try_get_matches_from([
            "trawler", "crawl", "-u", "https://acme.io", "-H", "urls.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_crawl_flags_parse() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "trawler", "-q", "crawl", "-u", "https://acme.io", "-t", "8", "--rotation",
                "smart", "--no-facebook", "-f", "json",
            ])
            .unwrap();
        assert!(matches.get_flag("quiet"));

        let (name, crawl) = matches.subcommand().unwrap();
        assert_eq!(name, "crawl");
        assert_eq!(crawl.get_one::<usize>("threads"), Some(&8));
        assert_eq!(crawl.get_one::<String>("rotation").map(String::as_str), Some("smart"));
        assert!(crawl.get_flag("no-facebook"));
        assert!(!crawl.get_flag("no-people"));
        assert_eq!(crawl.get_one::<String>("format").map(String::as_str), Some("json"));
    }
}
