use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Result;
use clap::Parser;

use score_recorder::{
    presenter::RowAction,
    records_dir,
    storage::DocHandle,
    ui::{format_elapsed, ShareTarget, Ui},
    AppContext,
};

#[derive(Parser, Debug)]
#[command(name = "scorerec", about = "Score tally with recorded sessions")]
struct Args {
    /// Directory holding settings and exported records. Defaults to the
    /// platform data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

struct ConsoleUi;

impl Ui for ConsoleUi {
    fn show_message(&self, text: &str) {
        println!("* {text}");
    }

    fn score_changed(&self, score: i64) {
        println!("score: {score}");
    }

    fn timer_tick(&self, elapsed_secs: u64) {
        println!("elapsed: {}", format_elapsed(elapsed_secs));
    }

    fn recording_changed(&self, recording: bool) {
        if recording {
            println!("-- recording --");
        } else {
            println!("-- stopped --");
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim(), "y" | "Y" | "yes")
    }

    fn prompt_edit(&self, name: &str, content: &str) -> Option<String> {
        println!("--- editing {name} (finish with a single '.', abort with 'q') ---");
        println!("{content}");
        println!("--- enter replacement content ---");

        let mut lines = Vec::new();
        for line in io::stdin().lock().lines() {
            let line = line.ok()?;
            match line.as_str() {
                "." => {
                    let mut text = lines.join("\n");
                    text.push('\n');
                    return Some(text);
                }
                "q" => return None,
                _ => lines.push(line),
            }
        }
        None
    }
}

/// Console stand-in for the platform share sheet: reveals where the record
/// lives so the user can hand it to whatever they like.
struct ConsoleShare {
    records_dir: PathBuf,
}

impl ShareTarget for ConsoleShare {
    fn share(&self, handle: &DocHandle, name: &str, mime: &str) -> Result<()> {
        println!(
            "* share {name} ({mime}): {}",
            self.records_dir.join(handle.as_str()).display()
        );
        Ok(())
    }
}

const HELP: &str = "\
commands:
  +            increase score (volume-up)
  -            decrease score (volume-down)
  0            reset score
  start        start a recording session
  end          end the session and export it
  remark TEXT  set the remark for the next export
  list         list exported records
  share N      share record N
  edit N       edit record N
  delete N     delete record N
  expand N     toggle a long remark on record N
  remark? N    load the remark of record N
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    log::info!("score recorder starting, data dir {}", data_dir.display());

    let ui = Arc::new(ConsoleUi);
    let share = Arc::new(ConsoleShare {
        records_dir: records_dir(&data_dir),
    });
    let mut app = AppContext::with_fs_defaults(&data_dir, ui, share)?;

    println!("{HELP}");

    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();
        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "+" => app.increase().await?,
            "-" => app.decrease().await?,
            "0" => app.reset().await?,
            "start" => app.start_recording().await,
            "end" => app.end_recording().await,
            "remark" => app.set_remark(rest),
            "list" => {
                app.reload_documents().await;
                print_rows(&app);
            }
            "share" | "edit" | "delete" | "expand" | "remark?" => match rest.parse::<usize>() {
                Ok(index) => {
                    dispatch_row_command(&mut app, command, index).await?;
                }
                Err(_) => println!("usage: {command} N"),
            },
            "help" => println!("{HELP}"),
            "quit" | "exit" => break,
            other => println!("unknown command '{other}' (try 'help')"),
        }
    }

    Ok(())
}

async fn dispatch_row_command(app: &mut AppContext, command: &str, index: usize) -> Result<()> {
    match command {
        "share" => app.row_action(index, RowAction::Share).await?,
        "edit" => app.row_action(index, RowAction::Edit).await?,
        "delete" => app.row_action(index, RowAction::Delete).await?,
        "expand" => {
            app.toggle_expand(index);
            print_rows(app);
        }
        "remark?" => match app.load_remark(index).await {
            Some(remark) if !remark.is_empty() => println!("remark: {remark}"),
            Some(_) => println!("(no remark)"),
            None => println!("no such record"),
        },
        _ => unreachable!("filtered by the caller"),
    }
    Ok(())
}

fn print_rows(app: &AppContext) {
    let rows = app.rows();
    if rows.is_empty() {
        println!("(no records)");
        return;
    }
    for (index, row) in rows.iter().enumerate() {
        println!("[{index}] {}  {}  {}", row.name, row.date_text, row.size_text);
        if row.remark_visible {
            let marker = match (row.expandable, row.expanded) {
                (true, false) => " [+]",
                (true, true) => " [-]",
                (false, _) => "",
            };
            let text = match row.max_lines {
                Some(limit) => row
                    .remark_text
                    .lines()
                    .take(limit)
                    .collect::<Vec<_>>()
                    .join("\n      "),
                None => row.remark_text.replace('\n', "\n      "),
            };
            println!("      {text}{marker}");
        }
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("HOME is not set; pass --data-dir"))?;
    Ok(home.join(".score-recorder"))
}
