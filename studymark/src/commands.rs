use clap::{arg, command};
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("studymark")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("studymark")
        .styles(CLAP_STYLING)
        .about("Browse a markdown study site and track which links you have worked through")
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log debug output to stderr").required(false))
        .arg(
            arg!(-s --"site" <SITE>)
                .required(false)
                .global(true)
                .help("Base URL or local directory of the study site")
                .default_value("."),
        )
        .arg(
            arg!(-d --"data-dir" <PATH>)
                .required(false)
                .global(true)
                .help("Directory holding the progress database")
                .default_value("~/.config/studymark/"),
        )
        .arg(
            arg!(-n --"namespace" <NAME>)
                .required(false)
                .global(true)
                .help("Progress namespace, one per course or site")
                .default_value("study"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .global(true)
                .help("Request timeout in seconds (default: no timeout)")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            arg!(--"manifest-name" <FILE>)
                .required(false)
                .global(true)
                .help("Manifest resource at the site root (default: manifest.json)"),
        )
        .arg(
            arg!(--"file-list-name" <FILE>)
                .required(false)
                .global(true)
                .help("Plain file listing at the site root (default: files.txt)"),
        )
        .arg(
            arg!(--"companion-marker" <TEXT>)
                .required(false)
                .global(true)
                .help("Links whose URL contains this open in place; empty disables (default: _context.md)"),
        )
        .arg(
            arg!(--"companion-dir" <DIR>)
                .required(false)
                .global(true)
                .help("Site directory holding companion documents (default: content)"),
        )
        .arg(
            arg!(--"auto-check-ms" <MILLIS>)
                .required(false)
                .global(true)
                .help("Delay before a followed link is checked off (default: 100)")
                .value_parser(clap::value_parser!(u64)),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the data directory and the progress database")
                .arg(
                    arg!(-f --"force")
                        .help("Replace an existing progress database without asking")
                        .required(false),
                ),
        )
        .subcommand(command!("list").about("Lists the site's documents with their progress"))
        .subcommand(
            command!("open")
                .about("Renders a document and prints its link checklist")
                .arg(
                    arg!(<DOC>)
                        .required(true)
                        .help("Document path, or its 1-based number from `list`"),
                )
                .arg(
                    arg!(--"html")
                        .required(false)
                        .help("Print the enhanced HTML instead of the checklist")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the output to a file")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("toggle")
                .about("Flips the completion state of one link")
                .arg(arg!(<DOC>).required(true).help("Document path or number"))
                .arg(
                    arg!(<LINK>)
                        .required(true)
                        .help("Link number from the checklist, or the link id"),
                ),
        )
        .subcommand(
            command!("visit")
                .about("Follows a link; external links are checked off after a short delay")
                .arg(arg!(<DOC>).required(true).help("Document path or number"))
                .arg(
                    arg!(<LINK>)
                        .required(true)
                        .help("Link number from the checklist, or the link id"),
                ),
        )
        .subcommand(
            command!("stats")
                .about("Prints a progress report")
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("reset")
                .about("Clears all progress in the namespace")
                .arg(
                    arg!(-f --"force")
                        .help("Do not ask for confirmation")
                        .required(false),
                ),
        )
        .subcommand(
            command!("manifest")
                .about("Generates manifest.json and files.txt for a local site")
                .arg(
                    arg!(<DIR>)
                        .required(true)
                        .help("Site root directory")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"content-dir" <DIR>)
                        .required(false)
                        .help("Directory below the root that holds the markdown files")
                        .default_value("content"),
                ),
        )
        .subcommand(command!("ui").about("Opens the interactive study browser"))
}
