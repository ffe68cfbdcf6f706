pub mod capture;
pub mod cli;
pub mod config;
pub mod directory;
pub mod filter;
pub mod format;
pub mod identifiers;
pub mod nodebook;
pub mod packet;

use anyhow::{Context, anyhow};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub use capture::{CaptureError, CaptureReader, CaptureWriter};
pub use cli::{Cli, ColorMode, LabelMode, cli_parse};
pub use config::{ConfigError, MeshcapConfig, load_config};
pub use directory::{DirectoryError, JsonDirectory, NodeDirectory};
pub use filter::{FilterError, FilterEvaluator, FilterExpression};
pub use format::{FormatOptions, PayloadFormatter, format_node_label, format_packet};
pub use identifiers::{IdentifierError, NodeLabel, NodeNum, to_node_num, to_user_id};
pub use nodebook::{CacheStats, NodeBook};
pub use packet::PacketRecord;

/// Install the stderr log subscriber; `RUST_LOG` wins over `-v`
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // A subscriber may already be installed when embedded in tests.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Returns whether packet lines should be colorized
fn apply_color_mode(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => {
            colored::control::set_override(true);
            true
        }
        ColorMode::Never => {
            colored::control::set_override(false);
            false
        }
        ColorMode::Auto => io::stdout().is_terminal(),
    }
}

fn load_directory(path: Option<&Path>) -> anyhow::Result<Option<Arc<dyn NodeDirectory>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let directory = JsonDirectory::load(path).context("Failed to load node directory")?;
    info!(nodes = directory.len(), path = %path.display(), "loaded node directory");
    Ok(Some(Arc::new(directory)))
}

/// Everything needed to filter and print one capture stream
struct Session<'a, W: Write> {
    expression: &'a FilterExpression,
    evaluator: FilterEvaluator,
    book: &'a NodeBook,
    options: FormatOptions,
    writer: Option<CaptureWriter<std::fs::File>>,
    limit: Option<usize>,
    out: W,
}

impl<W: Write> Session<'_, W> {
    /// Replay a capture, returning the number of matching packets
    fn process<R: BufRead>(&mut self, reader: &mut CaptureReader<R>) -> anyhow::Result<usize> {
        let mut matched = 0usize;

        while let Some(item) = reader.next() {
            let packet = match item {
                Ok(packet) => packet,
                Err(CaptureError::InvalidFormat { line, message }) => {
                    warn!(line, %message, "skipping unreadable capture line");
                    continue;
                }
                Err(err) => return Err(err).context("Failed to read capture"),
            };

            let record = PacketRecord::new(&packet);
            match self.evaluator.evaluate(
                self.expression.instructions(),
                &record,
                self.book.directory(),
            ) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(line = reader.line(), error = %err, "filter evaluation failed, packet skipped");
                    continue;
                }
            }

            matched += 1;
            if let Some(writer) = self.writer.as_mut() {
                writer.write_packet(&packet)?;
            }

            let line = format_packet(&packet, self.book, &self.options);
            if let Err(err) = writeln!(self.out, "{line}") {
                if err.kind() == io::ErrorKind::BrokenPipe {
                    debug!("output closed, stopping");
                    break;
                }
                return Err(err.into());
            }

            // Stop before pulling another line from a live source.
            if self.limit.is_some_and(|limit| matched >= limit) {
                break;
            }
        }

        Ok(matched)
    }
}

fn stats_table(stats: &CacheStats) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Node cache"), Cell::new("Value")]);

    table.add_row(vec![Cell::new("Hits"), Cell::new(stats.hits)]);
    table.add_row(vec![Cell::new("Misses"), Cell::new(stats.misses)]);
    table.add_row(vec![Cell::new("Evictions"), Cell::new(stats.evictions)]);
    table.add_row(vec![
        Cell::new("Size"),
        Cell::new(format!("{}/{}", stats.current_size, stats.max_size)),
    ]);
    table.add_row(vec![
        Cell::new("Hit rate"),
        Cell::new(format!("{:.1}%", stats.hit_rate)),
    ]);
    table
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    init_tracing(cli.verbose);
    let color = apply_color_mode(cli.color);

    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;

    let expression = FilterExpression::compile(&cli.filter)
        .map_err(|err| anyhow!("Invalid filter expression: {err}"))?;
    if !expression.is_empty() {
        eprintln!("Using filter: {expression}");
    }
    debug!(program = ?expression.instructions(), "compiled filter");

    let directory = load_directory(cli.nodes.as_deref())?;
    let book = NodeBook::new(directory, config.cache.capacity);

    let writer = cli
        .write_file
        .as_deref()
        .map(CaptureWriter::create)
        .transpose()?;

    let mut session = Session {
        expression: &expression,
        evaluator: FilterEvaluator::new(config.port_table()),
        book: &book,
        options: FormatOptions {
            label_mode: cli.label_mode.unwrap_or(config.display.label_mode),
            no_resolve: cli.no_resolve,
            verbose: cli.verbose > 0 || config.display.verbose_payloads,
            color,
        },
        writer,
        limit: cli.count.filter(|&count| count > 0),
        out: io::stdout().lock(),
    };

    let matched = match cli.input_path() {
        Some(path) => session.process(&mut CaptureReader::open(path)?)?,
        None => session.process(&mut CaptureReader::new(io::stdin().lock()))?,
    };

    if let Some(writer) = session.writer.as_ref() {
        info!(packets = writer.written(), "capture written");
    }
    eprintln!("Processed {matched} matching packets.");

    if cli.stats {
        eprintln!("{}", stats_table(&book.cache_stats()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_session(filter: &[&str], input: &str, limit: Option<usize>) -> (usize, String) {
        replay(filter, &mut CaptureReader::new(Cursor::new(input)), limit)
    }

    fn replay<R: BufRead>(
        filter: &[&str],
        reader: &mut CaptureReader<R>,
        limit: Option<usize>,
    ) -> (usize, String) {
        let expression = FilterExpression::compile(filter).unwrap();
        let book = NodeBook::with_defaults();
        let mut session = Session {
            expression: &expression,
            evaluator: FilterEvaluator::default(),
            book: &book,
            options: FormatOptions {
                label_mode: LabelMode::HexOnly,
                ..FormatOptions::default()
            },
            writer: None,
            limit,
            out: Vec::new(),
        };
        let matched = session.process(reader).unwrap();
        (matched, String::from_utf8(session.out).unwrap())
    }

    const INPUT: &str = concat!(
        "{\"fromId\":\"!00000001\",\"decoded\":{\"portnum\":\"TEXT_MESSAGE_APP\",\"text\":\"a\"}}\n",
        "not json at all\n",
        "{\"fromId\":\"!00000002\",\"hopLimit\":2,\"decoded\":{\"portnum\":\"TEXT_MESSAGE_APP\",\"text\":\"b\"}}\n",
        "{\"fromId\":\"!00000003\",\"encrypted\":\"AAAA\"}\n",
    );

    #[test]
    fn test_session_filters_and_skips_bad_lines() {
        let (matched, out) = run_session(&["port", "text"], INPUT, None);
        assert_eq!(matched, 2);
        assert!(out.contains("from:!00000001"));
        assert!(out.contains("from:!00000002"));
        assert!(!out.contains("!00000003"));
    }

    #[test]
    fn test_session_honours_limit() {
        let (matched, out) = run_session(&[], INPUT, Some(1));
        assert_eq!(matched, 1);
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_limit_stops_without_reading_ahead() {
        let mut reader = CaptureReader::new(Cursor::new(INPUT));
        let (matched, out) = replay(&[], &mut reader, Some(1));
        assert_eq!(matched, 1);
        assert!(out.contains("from:!00000001"));
        assert_eq!(reader.line(), 1);

        let mut reader = CaptureReader::new(Cursor::new(INPUT));
        let (matched, _) = replay(&["port", "text"], &mut reader, Some(2));
        assert_eq!(matched, 2);
        assert_eq!(reader.line(), 3);
    }

    #[test]
    fn test_evaluation_errors_skip_packets() {
        let (matched, out) = run_session(&["hop_limit", "<", "x"], INPUT, None);
        assert_eq!(matched, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_stats_table_lists_counters() {
        let book = NodeBook::with_defaults();
        book.get("!00000001").unwrap();
        book.get("!00000001").unwrap();
        let rendered = stats_table(&book.cache_stats()).to_string();
        assert!(rendered.contains("Hits"));
        assert!(rendered.contains("50.0%"));
    }
}
