// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, ArgGroup, Command};

pub fn build_cli() -> Command {
    Command::new("spendscope")
        .about("Rebuild an account's purchase history and summarize its spend")
        .version(clap::crate_version!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Log progress to stderr (-vv for debug)"),
        )
        .subcommand(Command::new("init").about("Create the settings database"))
        .subcommand(with_output_flags(with_source_args(
            Command::new("report").about("Walk the purchase history and print the spend report"),
        )))
        .subcommand(
            Command::new("export")
                .about("Write a spend report to a file")
                .subcommand(with_source_args(
                    Command::new("report")
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .required(true)
                                .help("csv|json"),
                        )
                        .arg(Arg::new("out").long("out").required(true)),
                )),
        )
        .subcommand(
            Command::new("fx")
                .about("Exchange-rate snapshots")
                .subcommand(
                    Command::new("fetch")
                        .about("Fetch and cache a snapshot (defaults to the home currency)")
                        .arg(Arg::new("currency")),
                )
                .subcommand(Command::new("list").about("List cached snapshots"))
                .subcommand(
                    Command::new("convert")
                        .about("Convert an amount with the latest cached snapshot")
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("from").long("from").required(true))
                        .arg(Arg::new("to").long("to").required(true)),
                ),
        )
        .subcommand(
            Command::new("settings")
                .about("Persistent report settings")
                .subcommand(Command::new("show"))
                .subcommand(
                    Command::new("set-home").arg(Arg::new("currency").required(true)),
                )
                .subcommand(
                    Command::new("set-multiplier").arg(Arg::new("value").required(true)),
                )
                .subcommand(
                    Command::new("set-page-limit")
                        .about("Maximum pages per pull, or 'none'")
                        .arg(Arg::new("value").required(true)),
                )
                .subcommand(
                    Command::new("set-rates")
                        .about("Where rates come from by default: live|cache")
                        .arg(Arg::new("mode").required(true)),
                ),
        )
        .subcommand(
            Command::new("rules")
                .about("Custom history label rules, checked before the built-in ones")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("pattern").long("pattern").required(true))
                        .arg(Arg::new("category").long("category").required(true))
                        .arg(Arg::new("note").long("note")),
                )
                .subcommand(Command::new("list"))
                .subcommand(Command::new("rm").arg(Arg::new("id").long("id").required(true))),
        )
        .subcommand(Command::new("doctor").about("Check settings, rate cache and rules"))
}

fn with_source_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("account")
            .long("account")
            .required(true)
            .action(ArgAction::Append)
            .help("Account name; repeat to pull several accounts"),
    )
    .arg(
        Arg::new("currency")
            .long("currency")
            .help("Account wallet currency (defaults to the home currency)"),
    )
    .arg(
        Arg::new("dump")
            .long("dump")
            .action(ArgAction::Append)
            .help("History dump JSON, one per --account"),
    )
    .arg(
        Arg::new("endpoint")
            .long("endpoint")
            .help("Base URL of a JSON history endpoint"),
    )
    .arg(Arg::new("session").long("session").help("Session cookie header"))
    .group(
        ArgGroup::new("source")
            .args(["dump", "endpoint"])
            .required(true),
    )
    .arg(
        Arg::new("rates")
            .long("rates")
            .value_parser(["live", "cache"])
            .help("Override the configured rate source"),
    )
    .arg(
        Arg::new("rates_file")
            .long("rates-file")
            .conflicts_with("rates")
            .help("Read the rate snapshot from a JSON file"),
    )
    .arg(Arg::new("home").long("home").help("Report currency override"))
    .arg(Arg::new("multiplier").long("multiplier"))
    .arg(Arg::new("page_limit").long("page-limit"))
}

fn with_output_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json"),
    )
}
