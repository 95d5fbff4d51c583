// Local crates
use crate::helpers::load_config::{LoggingConfig, SourceStyle};

// External crates
use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::{self, Write};
use std::path::Path;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, format};
use tracing_subscriber::registry::LookupSpan;

const DATE_FORMAT: &str = "%Y/%m/%d";
const TIME_FORMAT: &str = "%H:%M:%S%.6f";

/// Event formatter producing the standard line layout:
///
/// ```text
/// 2024/01/23 01:23:23.123123 main.rs:23: message key=value
/// ```
///
/// The date, microsecond time and call site make up the prefix. The call
/// site can be switched to the full path or dropped, the clock switched to
/// UTC, and the level tag enabled, through [`LoggingConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardFormat {
    utc: bool,
    source: SourceStyle,
    show_level: bool,
}

impl Default for StandardFormat {
    fn default() -> Self {
        Self {
            utc: false,
            source: SourceStyle::Short,
            show_level: false,
        }
    }
}

impl From<&LoggingConfig> for StandardFormat {
    fn from(cfg: &LoggingConfig) -> Self {
        Self {
            utc: cfg.utc,
            source: cfg.source,
            show_level: cfg.show_level,
        }
    }
}

impl StandardFormat {
    /// Render timestamps in UTC rather than local time.
    #[must_use]
    pub fn with_utc(self, utc: bool) -> Self {
        Self { utc, ..self }
    }

    #[must_use]
    pub fn with_source(self, source: SourceStyle) -> Self {
        Self { source, ..self }
    }

    #[must_use]
    pub fn with_level(self, show_level: bool) -> Self {
        Self { show_level, ..self }
    }

    /// Write everything preceding the message, trailing separator included.
    pub fn write_prefix<W, Tz>(
        &self,
        w: &mut W,
        now: &DateTime<Tz>,
        level: Option<&tracing::Level>,
        file: Option<&str>,
        line: Option<u32>,
    ) -> fmt::Result
    where
        W: Write + ?Sized,
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        write!(w, "{} {} ", now.format(DATE_FORMAT), now.format(TIME_FORMAT))?;

        if self.show_level
            && let Some(level) = level
        {
            write!(w, "{level:>5} ")?;
        }

        let file = match self.source {
            SourceStyle::None => None,
            SourceStyle::Long => file,
            SourceStyle::Short => file.map(short_file),
        };
        if let Some(file) = file {
            // Unknown lines print as 0
            write!(w, "{}:{}: ", file, line.unwrap_or(0))?;
        }
        Ok(())
    }
}

/// Final path component of a source file, accepting either separator.
fn short_file(file: &str) -> &str {
    Path::new(file)
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.rsplit('\\').next().unwrap_or(name))
        .unwrap_or(file)
}

impl<S, N> FormatEvent<S, N> for StandardFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let level = Some(meta.level());

        if self.utc {
            self.write_prefix(&mut writer, &Utc::now(), level, meta.file(), meta.line())?;
        } else {
            self.write_prefix(&mut writer, &Local::now(), level, meta.file(), meta.line())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
