use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};
use std::time::{Duration, Instant};

const STATUS_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy)]
enum StatusKind {
    Pending,
    Success,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn supports_color(stream: Stream) -> bool {
    let is_tty = match stream {
        Stream::Stdout => io::stdout().is_terminal(),
        Stream::Stderr => io::stderr().is_terminal(),
    };
    is_tty && std::env::var_os("NO_COLOR").is_none()
}

fn style_for(kind: StatusKind) -> Style {
    let style = Style::new().bold();
    match kind {
        StatusKind::Pending => style.fg_color(Some(AnsiColor::Cyan.into())),
        StatusKind::Success => style.fg_color(Some(AnsiColor::Green.into())),
        StatusKind::Info => style.fg_color(Some(AnsiColor::Blue.into())),
        StatusKind::Warn => style.fg_color(Some(AnsiColor::Yellow.into())),
        StatusKind::Error => style.fg_color(Some(AnsiColor::Red.into())),
    }
}

fn stream_for(kind: StatusKind) -> Stream {
    match kind {
        StatusKind::Warn | StatusKind::Error => Stream::Stderr,
        _ => Stream::Stdout,
    }
}

fn styled_label(kind: StatusKind, label: &str, stream: Stream) -> String {
    let padded_label = if label.is_empty() {
        " ".repeat(STATUS_WIDTH)
    } else {
        format!("{:>width$}", label, width = STATUS_WIDTH)
    };

    if supports_color(stream) {
        let style = style_for(kind);
        format!("{}{padded_label}{}", style.render(), style.render_reset())
    } else {
        padded_label
    }
}

fn write_status(kind: StatusKind, label: &str, message: &str) {
    let stream = stream_for(kind);
    let mut handle: Box<dyn Write> = match stream {
        Stream::Stdout => Box::new(io::stdout().lock()),
        Stream::Stderr => Box::new(io::stderr().lock()),
    };

    let label = styled_label(kind, label, stream);
    for (idx, line) in message.split('\n').enumerate() {
        if idx == 0 {
            let _ = writeln!(handle, "{label} {line}");
        } else {
            let _ = writeln!(handle, "{:>width$} {line}", "", width = STATUS_WIDTH);
        }
    }
    let _ = handle.flush();
}

pub(crate) fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 60 {
        let minutes = duration.as_secs() / 60;
        let seconds = duration.as_secs() % 60;
        if seconds == 0 {
            format!("{minutes}m")
        } else {
            format!("{minutes}m {seconds}s")
        }
    } else if duration.as_secs_f64() >= 1.0 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if duration.as_millis() >= 1 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}µs", duration.as_micros())
    }
}

pub fn status(label: &str, message: impl Display) {
    write_status(StatusKind::Pending, label, &message.to_string());
}

pub fn info(message: impl Display) {
    write_status(StatusKind::Info, "Info", &message.to_string());
}

pub fn warn(message: impl Display) {
    write_status(StatusKind::Warn, "Warning", &message.to_string());
}

pub fn error(message: impl Display) {
    write_status(StatusKind::Error, "Error", &message.to_string());
}

pub fn success(label: &str, message: impl Display) {
    write_status(StatusKind::Success, label, &message.to_string());
}

/// Indented, unlabelled line for output relayed from a child process.
pub fn detail(message: impl Display) {
    let mut handle = io::stdout().lock();
    let _ = writeln!(handle, "{:>width$} {message}", "", width = STATUS_WIDTH);
    let _ = handle.flush();
}

/// Stage banner: prints a pending line on creation and a success line with
/// the elapsed time when finished. Dropping it unfinished reports the stage
/// as aborted.
pub struct Progress {
    message: String,
    started: Instant,
    complete: bool,
}

impl Progress {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        let label = label.into();
        let message = message.into();
        write_status(StatusKind::Pending, &label, &message);

        Self {
            message,
            started: Instant::now(),
            complete: false,
        }
    }

    pub fn success(mut self, label: &str, detail: Option<String>) {
        if self.complete {
            return;
        }

        self.complete = true;
        let mut combined = self.message.clone();
        if let Some(detail) = detail {
            if !detail.is_empty() {
                combined.push(' ');
                combined.push_str(&detail);
            }
        }
        let elapsed = format_duration(self.started.elapsed());
        combined.push_str(" in ");
        combined.push_str(&elapsed);

        write_status(StatusKind::Success, label, &combined);
    }

    pub fn skip(mut self, reason: impl Display) {
        if self.complete {
            return;
        }

        self.complete = true;
        let combined = format!("{} ({})", self.message, reason);
        write_status(StatusKind::Info, "Skipped", &combined);
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.complete {
            let elapsed = format_duration(self.started.elapsed());
            let combined = format!("{} (aborted after {})", self.message, elapsed);
            write_status(StatusKind::Warn, "Aborted", &combined);
            self.complete = true;
        }
    }
}

/// Single progress line rewritten in place with `current/total`.
pub struct Counter {
    label: String,
    total: usize,
    current: usize,
}

impl Counter {
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        Self {
            label: label.into(),
            total,
            current: 0,
        }
    }

    pub fn increment(&mut self) {
        self.current += 1;
        let line = counter_line(self.current, self.total);
        let mut handle = io::stdout().lock();
        let label = styled_label(StatusKind::Pending, &self.label, Stream::Stdout);
        let _ = write!(handle, "\r{label} {line}");
        let _ = handle.flush();
    }

    #[cfg(test)]
    fn current(&self) -> usize {
        self.current
    }

    /// Terminate the progress line so later output starts on a fresh line.
    pub fn finish(self) {
        if self.current > 0 {
            let mut handle = io::stdout().lock();
            let _ = writeln!(handle);
            let _ = handle.flush();
        }
    }
}

fn counter_line(current: usize, total: usize) -> String {
    format!("{current}/{total}")
}
