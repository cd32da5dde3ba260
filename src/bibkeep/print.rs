use bibkeep::detector::Detection;
use bibkeep::model::{ClosureStyle, DisplayRow};
use bibkeep::store::{DeleteReport, InsertReport, ReformatReport};
use colored::*;

const TITLE_WIDTH: usize = 48;
const AUTHOR_WIDTH: usize = 28;

pub fn print_rows(rows: &[DisplayRow]) {
    if rows.is_empty() {
        println!("No entries found.");
        return;
    }
    let key_width = rows.iter().map(|r| r.keyword.chars().count()).max().unwrap_or(0);

    for row in rows {
        println!(
            "{}  {:<13}  {:>4}  {}  {}",
            format!("{:<width$}", row.keyword, width = key_width).yellow(),
            row.entry_type.to_string().dimmed(),
            row.year,
            truncate(&row.title, TITLE_WIDTH).bold(),
            truncate(&row.author, AUTHOR_WIDTH).dimmed(),
        );
    }
}

pub fn print_record(text: &str) {
    println!("{}", text.replace("\r\n", "\n"));
}

pub fn print_insert(report: &InsertReport) {
    for keyword in &report.inserted {
        println!("{} {}", "Added".green(), keyword);
    }
    for keyword in &report.updated {
        println!("{} {}", "Updated".green(), keyword);
    }
}

pub fn print_delete(report: &DeleteReport) {
    for keyword in &report.deleted {
        println!("{} {}", "Deleted".green(), keyword);
    }
    for error in report.not_found_errors() {
        println!("{}", error.to_string().yellow());
    }
}

pub fn print_reformat(report: &ReformatReport) {
    let style = match report.style {
        ClosureStyle::Brace => "braces",
        ClosureStyle::Quote => "quotes",
    };
    println!(
        "{}",
        format!("Reformatted {} entries with {}", report.reformatted, style).green()
    );
}

pub fn print_detection(detection: &Detection) {
    match detection {
        Detection::Record { keyword, text } => {
            println!("{} {}", "Entry detected:".green(), keyword.yellow());
            print_record(text);
        }
        Detection::Invalid => println!("{}", "Clipboard holds no valid entry".dimmed()),
        Detection::Empty => println!("{}", "Clipboard is empty".dimmed()),
    }
}

pub fn print_info(message: &str) {
    println!("{}", message.dimmed());
}

pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
