//! Line-oriented interactive loop. History lives in the process, so this is
//! where undo/redo are usable from the terminal.

use crate::load_index;
use crate::print::*;
use bibkeep::api::BibApi;
use bibkeep::error::Result;
use bibkeep::model::ClosureStyle;
use colored::*;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const HELP: &str = "\
open PATH          select a bibliography file
scan DIR           list bibliography files below DIR
pick NAME          select a file from the last scan
list               list entries
show KEY           print an entry
add [TEXT]         add entries (without TEXT: read lines until a single '.')
delete KEY...      delete entries
reformat quotes|braces
undo | redo
quit";

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Quit,
}

pub async fn run(api: &BibApi) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_info("Type 'help' for commands.");

    loop {
        prompt(api);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match dispatch(api, line.trim(), &mut lines).await {
            Ok(Step::Quit) => break,
            Ok(Step::Continue) => {}
            Err(e) => println!("{}", e.to_string().red()),
        }
    }
    Ok(())
}

fn prompt(api: &BibApi) {
    let name = api.selected_file_name().unwrap_or_default();
    print!("{}> ", name.cyan());
    let _ = std::io::stdout().flush();
}

async fn dispatch(api: &BibApi, line: &str, lines: &mut Lines<BufReader<Stdin>>) -> Result<Step> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "" => {}
        "quit" | "exit" | "q" => return Ok(Step::Quit),
        "help" | "?" => println!("{}", HELP),
        "open" => {
            api.select_file(rest);
            load_index(api).await?;
            print_info(&format!("{} entries", api.rows().len()));
        }
        "scan" => {
            let report = api.open_directory(rest).finish().await?;
            for name in report.display_names() {
                println!("{}", name);
            }
        }
        "pick" => {
            api.select_from_directory_list(rest)?;
            load_index(api).await?;
        }
        "list" => {
            load_index(api).await?;
            print_rows(&api.rows());
        }
        "show" => println!("{}", api.lookup(rest)?.replace("\r\n", "\n")),
        "add" => {
            let text = if rest.is_empty() {
                read_block(lines).await?
            } else {
                rest.to_string()
            };
            print_insert(&api.insert(text).await?);
        }
        "delete" | "rm" => {
            let keywords = rest.split_whitespace().map(str::to_string).collect();
            print_delete(&api.delete(keywords).await?);
        }
        "reformat" => {
            let style = match rest {
                "quotes" => ClosureStyle::Quote,
                "braces" => ClosureStyle::Brace,
                _ => {
                    print_warning("usage: reformat quotes|braces");
                    return Ok(Step::Continue);
                }
            };
            print_reformat(&api.reformat(style).await?);
        }
        "undo" => {
            let action = api.undo().await?;
            print_info(&format!("Undid {}", action));
        }
        "redo" => {
            let action = api.redo().await?;
            print_info(&format!("Redid {}", action));
        }
        other => print_warning(&format!("Unknown command: {} (try 'help')", other)),
    }
    Ok(Step::Continue)
}

async fn read_block(lines: &mut Lines<BufReader<Stdin>>) -> Result<String> {
    let mut block = String::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "." {
            break;
        }
        block.push_str(&line);
        block.push('\n');
    }
    Ok(block)
}
