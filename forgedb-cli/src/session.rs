use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rustyline::config::Builder;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};

use forgedb::statement::{QueryResult, SetStmt, Statement};

use crate::config::ConfigLoad;
use crate::rusty::CliHelper;
use crate::show::Show;

const DEFAULT_PROMPT: &str = "forgedb";

pub struct Session {
    is_repl: bool,
    settings: ConfigLoad,
    query: String,
    running: Arc<AtomicBool>,
    engine: forgedb::session::Session,
}

impl Session {
    pub fn new(settings: ConfigLoad, is_repl: bool, running: Arc<AtomicBool>) -> Self {
        if is_repl {
            println!("Welcome to forgedb-cli.");
            println!();
        }

        let mut engine = forgedb::session::Session::new();
        if let Some(epsilon) = settings.dp_epsilon {
            let _ = engine.execute(&Statement::Set(SetStmt { key: "DP_EPSILON".to_string(), value: epsilon }));
        }

        Session { is_repl, settings, query: String::new(), running, engine }
    }

    fn prompt(&self) -> String {
        if !self.query.trim().is_empty() {
            "  -> ".to_string()
        } else {
            match &self.settings.prompt {
                Some(prompt) => format!("{} > ", prompt.trim_end()),
                None => format!("{} > ", DEFAULT_PROMPT),
            }
        }
    }

    pub fn handle_repl(&mut self) {
        let config = Builder::new()
            .completion_prompt_limit(5)
            .completion_type(CompletionType::Circular)
            .build();
        let mut rl = Editor::<CliHelper, DefaultHistory>::with_config(config).unwrap();

        rl.set_helper(Some(CliHelper::new()));
        rl.load_history(&get_history_path()).ok();

        'repl: while self.running.load(Ordering::SeqCst) {
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    if let Some(query) = self.append_line(&line) {
                        let _ = rl.add_history_entry(query.as_str());
                        match self.handle_query(true, &query) {
                            Ok(true) => {}
                            Ok(false) => break 'repl,
                            Err(e) => {
                                eprintln!("error: {}", e);
                                self.query.clear();
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    self.query.clear();
                    println!("^C");
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("io err: {}", e);
                    break;
                }
            }
        }

        println!("Bye~");
        let _ = rl.save_history(&get_history_path());
    }

    pub fn handle_reader<R: BufRead>(&mut self, r: R) -> Result<()> {
        let start = std::time::Instant::now();

        for line in r.lines() {
            let line = line.map_err(|e| anyhow!("read line err: {}", e))?;
            if let Some(query) = self.append_line(&line) {
                self.handle_query(false, &query)?;
            }
        }

        let remaining = self.query.trim().to_owned();
        if !remaining.is_empty() {
            self.query.clear();
            self.handle_query(false, &remaining)?;
        }

        if self.settings.show_stats.unwrap_or(false) {
            println!("{:.3}", start.elapsed().as_secs_f64());
        }

        Ok(())
    }

    /// Accumulates `line` into the pending statement buffer and returns the
    /// completed statement once a bare `;` terminates it. With multi-line
    /// mode off, every non-empty line is its own statement.
    fn append_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            return None;
        }

        if self.is_repl && (line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")) {
            return Some(line.to_string());
        }

        if !self.settings.multi_line.unwrap_or(true) {
            return Some(line.trim_end_matches(';').trim().to_string());
        }

        if !self.query.is_empty() {
            self.query.push(' ');
        }
        self.query.push_str(line);

        if self.query.trim_end().ends_with(';') {
            let statement = self.query.trim().trim_end_matches(';').trim().to_string();
            self.query.clear();
            Some(statement)
        } else {
            None
        }
    }

    /// Executes one complete statement. `Ok(false)` tells the REPL loop to
    /// stop (an `exit`/`quit` line); `Ok(true)` otherwise.
    fn handle_query(&mut self, is_repl: bool, query: &str) -> Result<bool> {
        if is_repl && (query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit")) {
            return Ok(false);
        }

        let show = Show::new(is_repl, self.settings.show_stats.unwrap_or(false));
        let stmt = forgedb_sql::parse(query);
        let result = self.engine.execute(&stmt).map_err(|e| anyhow!(e.to_string()))?;
        print_result(&result);
        show.output(&result);
        Ok(true)
    }
}

fn print_result(result: &QueryResult) {
    if !result.headers.is_empty() {
        let widths: Vec<usize> = result
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| result.rows.iter().map(|r| r[i].to_string().len()).chain([h.len()]).max().unwrap_or(h.len()))
            .collect();
        let line = |cells: &[String]| -> String {
            cells.iter().zip(&widths).map(|(c, w)| format!("{:<width$}", c, width = w)).collect::<Vec<_>>().join(" | ")
        };
        println!("{}", line(&result.headers));
        println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
        for row in &result.rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            println!("{}", line(&cells));
        }
    } else if !result.ok {
        eprintln!("error: {}", result.message);
    } else {
        println!("{}", result.message);
    }
}

fn get_history_path() -> String {
    format!("{}/.forgedb_history", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}
