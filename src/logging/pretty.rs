use nu_ansi_term::{Color, Style};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Colorized console formatter for local development.
pub struct PrettyConsoleLogFormat;

macro_rules! styled {
    ($writer:expr, $style:expr, $block:block) => {
        let style = $style;
        write!($writer, "{}", style.prefix())?;
        $block;
        write!($writer, "{}", style.suffix())?;
    };
}

impl PrettyConsoleLogFormat {
    fn format_timestamp(writer: &mut Writer) -> std::fmt::Result {
        styled!(writer, Style::new().dimmed(), {
            write!(writer, "{} ", chrono::offset::Local::now().format("%T%.3f"))?;
        });

        Ok(())
    }

    fn format_level(writer: &mut Writer, level: Level) -> std::fmt::Result {
        let style = match level {
            Level::TRACE => Style::new().fg(Color::Purple),
            Level::DEBUG => Style::new().fg(Color::Blue),
            Level::INFO => Style::new().fg(Color::Green),
            Level::WARN => Style::new().fg(Color::Yellow),
            Level::ERROR => Style::new().fg(Color::Red),
        };

        styled!(writer, style, {
            write!(writer, "{:<5}", level)?;
        });

        Ok(())
    }

    fn format_nesting(writer: &mut Writer, nesting: usize) -> std::fmt::Result {
        styled!(writer, Style::new().fg(Color::Magenta), {
            write!(writer, " ")?;
            for _ in 0..nesting {
                write!(writer, "|")?;
            }
        });

        Ok(())
    }

    fn format_target(writer: &mut Writer, event: &Event<'_>) -> std::fmt::Result {
        styled!(writer, Style::new().dimmed(), {
            write!(writer, "{}: ", event.metadata().target())?;
        });

        Ok(())
    }
}

impl<S, N> FormatEvent<S, N> for PrettyConsoleLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        Self::format_timestamp(&mut writer)?;
        Self::format_level(&mut writer, *event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            Self::format_nesting(&mut writer, scope.count())?;
        }

        write!(writer, " ")?;
        Self::format_target(&mut writer, event)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
