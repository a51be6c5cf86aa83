use env_logger::{Builder, Env};
use log::{Level, LevelFilter, Record};
use std::fmt::Arguments;
use std::io::{self, Write};
use std::thread;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

pub use log::{debug, error, info, trace, warn};

const CRATE_PREFIX: &str = "deskview::";

/// Installs the process logger: `RUST_LOG` filtering (default
/// `deskview=info`), one colored `[LEVEL][module@thread] message` line per
/// record on stderr. Later calls are ignored.
pub fn init_logger() {
    let mut builder =
        Builder::from_env(Env::default().default_filter_or("deskview=info"));
    builder.filter_module("tao", LevelFilter::Warn);
    builder.filter_module("wry", LevelFilter::Warn);

    builder.format(|_buf, record| {
        let writer = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = writer.buffer();
        write_record(&mut buffer, record)?;
        writer.print(&buffer)
    });

    let _ = builder.try_init();
}

fn write_record(out: &mut impl WriteColor, record: &Record) -> io::Result<()> {
    let current = thread::current();
    write_line(
        out,
        record.level(),
        record.module_path().unwrap_or("<unknown>"),
        current.name().unwrap_or("unnamed"),
        record.args(),
    )
}

fn write_line(
    out: &mut impl WriteColor,
    level: Level,
    module_path: &str,
    thread_name: &str,
    args: &Arguments,
) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(level_color(level))))?;
    write!(
        out,
        "[{}][{}@{}]",
        level,
        short_module(module_path),
        thread_name
    )?;
    out.reset()?;
    writeln!(out, " {}", args)
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Trace => Color::Cyan,
        Level::Debug => Color::Blue,
        Level::Info => Color::Green,
        Level::Warn => Color::Yellow,
        Level::Error => Color::Red,
    }
}

/// Drops the crate prefix from our own modules; foreign modules are kept
/// whole.
fn short_module(module_path: &str) -> &str {
    module_path.strip_prefix(CRATE_PREFIX).unwrap_or(module_path)
}

#[cfg(test)]
mod tests {
    use termcolor::Buffer;

    use super::*;

    fn line(level: Level, module_path: &str, thread_name: &str) -> String {
        let mut buffer = Buffer::no_color();
        write_line(
            &mut buffer,
            level,
            module_path,
            thread_name,
            &format_args!("window '{}' created", "main"),
        )
        .unwrap();
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    #[test]
    fn line_names_level_module_and_thread() {
        assert_eq!(
            line(Level::Info, "deskview::runtime::app", "main"),
            "[INFO][runtime::app@main] window 'main' created\n"
        );
    }

    #[test]
    fn foreign_modules_keep_their_full_path() {
        assert_eq!(short_module("wry::webview"), "wry::webview");
        assert_eq!(short_module("deskview"), "deskview");
        assert_eq!(
            line(Level::Warn, "tao::event_loop", "deskview-throttle"),
            "[WARN][tao::event_loop@deskview-throttle] window 'main' created\n"
        );
    }

    #[test]
    fn every_level_has_a_distinct_color() {
        let levels = [
            Level::Trace,
            Level::Debug,
            Level::Info,
            Level::Warn,
            Level::Error,
        ];
        let colors: Vec<_> = levels.into_iter().map(level_color).collect();

        for (i, color) in colors.iter().enumerate() {
            assert!(!colors[i + 1..].contains(color));
        }
        assert_eq!(level_color(Level::Error), Color::Red);
    }
}
