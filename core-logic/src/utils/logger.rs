use anyhow::{Context, Result};
use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Targets,
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Target used for the one-line cycle summaries shown on the console.
pub const CYCLE_TARGET: &str = "cycle_result";

/// Installs the global subscriber: a coloured console layer and an hourly
/// rotated file layer under `log_dir`.
///
/// The returned guard flushes the file writer and MUST be kept alive by the
/// caller. `RUST_LOG`, when set, replaces the console filter.
pub fn setup_logger(log_dir: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir))?;

    let file_appender = tracing_appender::rolling::hourly(log_dir, "aurand");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // File keeps everything the oracle says at INFO, libraries at WARN
    let file_filter = oracle_targets(Level::INFO, Level::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter);

    let console_layer = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => console_layer.with_filter(env_filter).boxed(),
        Err(_) => console_layer
            .with_filter(oracle_targets(Level::INFO, Level::ERROR))
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to set global subscriber")?;

    Ok(guard)
}

fn oracle_targets(oracle: Level, default: Level) -> Targets {
    Targets::new()
        .with_target(CYCLE_TARGET, Level::INFO)
        .with_target("aurand_bot", oracle)
        .with_target("core_logic", oracle)
        .with_default(default)
}

// --- Formatters ---

/// Collects the message and the structured fields of an event.
#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push((field.name(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }
}

impl EventVisitor {
    fn render(&self) -> String {
        if self.fields.is_empty() {
            return self.message.clone();
        }
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        format!("{} {}", self.message, fields.join(" "))
    }
}

/// Highlights SUCCESS/FAILED words the same way the console always has.
fn colorize(msg: String, level: &Level) -> String {
    if msg.contains("SUCCESS") || msg.contains("Success") {
        let green_text = Style::new().fg(Color::LightGreen).bold();
        msg.replace("SUCCESS", &format!("{}", green_text.paint("SUCCESS")))
            .replace("Success", &format!("{}", green_text.paint("Success")))
    } else if msg.contains("FAILED") || msg.contains("Failed") {
        let red_text = Style::new().fg(Color::LightRed).bold();
        msg.replace("FAILED", &format!("{}", red_text.paint("FAILED")))
            .replace("Failed", &format!("{}", red_text.paint("Failed")))
    } else if *level == Level::ERROR {
        Color::Red.paint(msg).to_string()
    } else if *level == Level::WARN {
        Color::Rgb(255, 165, 0).paint(msg).to_string()
    } else if *level >= Level::DEBUG {
        Color::DarkGray.paint(msg).to_string()
    } else {
        msg
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let timestamp = Local::now().format("%H:%M:%S");
        let colored_msg = colorize(visitor.render(), event.metadata().level());

        writeln!(writer, "{} {}", Color::DarkGray.paint(timestamp.to_string()), colored_msg)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        writeln!(writer, "{}", visitor.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_highlights_success_and_failed() {
        let success = colorize("Cycle SUCCESS".to_string(), &Level::INFO);
        assert!(success.contains("SUCCESS"));
        assert_ne!(success, "Cycle SUCCESS");

        let failed = colorize("Broadcast 1 FAILED".to_string(), &Level::WARN);
        assert_ne!(failed, "Broadcast 1 FAILED");
    }

    #[test]
    fn test_colorize_leaves_plain_info_untouched() {
        assert_eq!(
            colorize("Waiting for commitments".to_string(), &Level::INFO),
            "Waiting for commitments"
        );
    }

    #[test]
    fn test_visitor_render_appends_fields() {
        let visitor = EventVisitor {
            message: "Broadcast result".to_string(),
            fields: vec![("endpoint", "primary".to_string()), ("height", "42".to_string())],
        };
        assert_eq!(visitor.render(), "Broadcast result endpoint=primary height=42");
    }
}
