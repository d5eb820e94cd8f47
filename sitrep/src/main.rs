use colored::Colorize;
use sitrep::commands::command_argument_builder;
use sitrep::handlers::{handle_folders, handle_report, init_logging};
use sitrep_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    init_logging(chosen_command.get_flag("verbose"));

    let outcome = match chosen_command.subcommand() {
        Some(("report", primary_command)) => handle_report(primary_command).await,
        Some(("folders", primary_command)) => handle_folders(primary_command).await,
        // No subcommand provided, just show the banner
        None => return,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
