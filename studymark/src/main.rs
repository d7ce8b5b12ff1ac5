use clap::ArgMatches;
use colored::Colorize;
use std::path::PathBuf;
use studymark::commands::command_argument_builder;
use studymark::handlers::*;
use studymark_core::{StudySession, print_banner};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    // the TUI owns the terminal, so it runs without a log subscriber
    if !matches!(chosen_command.subcommand(), Some(("ui", _))) {
        init_tracing(chosen_command.get_flag("verbose"));
    }

    if let Err(e) = dispatch(&chosen_command, quiet).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn dispatch(matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let config = build_config(matches);

    match matches.subcommand() {
        Some(("ui", _)) => {
            let session = StudySession::start(config).await?;
            tokio::task::block_in_place(|| studymark_tui::run(session))
        }
        Some(("init", sub)) => handle_init(&config, sub.get_flag("force")),
        Some(("list", _)) => handle_list(&config, quiet).await,
        Some(("open", sub)) => {
            handle_open(
                &config,
                required(sub, "DOC"),
                sub.get_flag("html"),
                sub.get_one::<PathBuf>("output").map(PathBuf::as_path),
                quiet,
            )
            .await
        }
        Some(("toggle", sub)) => {
            handle_toggle(&config, required(sub, "DOC"), required(sub, "LINK"), quiet).await
        }
        Some(("visit", sub)) => {
            handle_visit(&config, required(sub, "DOC"), required(sub, "LINK"), quiet).await
        }
        Some(("stats", sub)) => {
            handle_stats(
                &config,
                sub.get_one::<String>("format").map(String::as_str).unwrap_or("text"),
                sub.get_one::<PathBuf>("output").map(PathBuf::as_path),
                quiet,
            )
            .await
        }
        Some(("reset", sub)) => handle_reset(&config, sub.get_flag("force")),
        Some(("manifest", sub)) => {
            let root = sub
                .get_one::<PathBuf>("DIR")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("."));
            let content_dir = sub
                .get_one::<String>("content-dir")
                .map(String::as_str)
                .unwrap_or("content");
            handle_manifest(&root, content_dir)
        }
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

/// Required positionals are enforced by clap.
fn required<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches.get_one::<String>(id).map(String::as_str).unwrap_or_default()
}
