//! Metric command handling
//!
//! Line protocol read by `metrics-pipe`, one command per line:
//! - `count <name> [<value> [<tags>]]`: increment a counter (default 1)
//! - `gauge <name> <value> [<tags>]`: set a gauge
//! - `histogram <name> <value> [<tags>]`: record a histogram sample
//! - `set <name> <member> [<tags>]`: add a set member
//! - `flush`: emit everything buffered
//!
//! `<tags>` is a comma-separated list, e.g. `env:prod,host:web01`.

use super::aggregator::Aggregator;
use super::emitter::Emitter;
use super::error::MetricsError;
use super::types::{MetricKind, Number};

/// Parsed metric command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsCommand {
    Record {
        kind: MetricKind,
        name: String,
        value: CommandValue,
        tags: Vec<String>,
    },
    Flush,
}

/// Value carried by a recording command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandValue {
    Number(Number),
    Member(String),
}

/// Why a command line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    UnknownCommand(String),
    MissingArgument(&'static str),
    InvalidNumber(String),
    TooManyArguments(usize),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Empty => write!(f, "No command provided"),
            CommandError::UnknownCommand(cmd) => write!(f, "Unknown metric command: {}", cmd),
            CommandError::MissingArgument(arg) => write!(f, "Missing argument: {}", arg),
            CommandError::InvalidNumber(v) => write!(f, "Invalid numeric value: {}", v),
            CommandError::TooManyArguments(n) => {
                write!(f, "Too many arguments: expected at most 4, got {}", n)
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Result of executing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Recorded,
    Flushed(usize),
}

impl MetricsCommand {
    /// Parse one whitespace-separated command line
    pub fn parse(line: &str) -> Result<MetricsCommand, CommandError> {
        let args: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = args.split_first() else {
            return Err(CommandError::Empty);
        };

        if verb.eq_ignore_ascii_case("flush") {
            return Ok(MetricsCommand::Flush);
        }

        let kind: MetricKind = verb
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| CommandError::UnknownCommand(verb.to_string()))?;

        if args.len() > 3 {
            return Err(CommandError::TooManyArguments(args.len() + 1));
        }

        let name = args
            .first()
            .ok_or(CommandError::MissingArgument("name"))?
            .to_string();

        let value = match (kind, args.get(1)) {
            (MetricKind::Count, None) => CommandValue::Number(Number::Int(1)),
            (_, None) => return Err(CommandError::MissingArgument("value")),
            (MetricKind::Set, Some(member)) => CommandValue::Member(member.to_string()),
            (_, Some(raw)) => CommandValue::Number(Self::parse_number(raw)?),
        };

        let tags = args.get(2).map(|raw| Self::parse_tags(raw)).unwrap_or_default();

        Ok(MetricsCommand::Record {
            kind,
            name,
            value,
            tags,
        })
    }

    fn parse_number(raw: &str) -> Result<Number, CommandError> {
        raw.parse()
            .map_err(|_| CommandError::InvalidNumber(raw.to_string()))
    }

    /// Split `a,b,c`, dropping empty entries
    fn parse_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Apply the command to an aggregator
    pub fn execute<E: Emitter>(
        &self,
        aggregator: &Aggregator<E>,
    ) -> Result<CommandOutcome, MetricsError> {
        match self {
            MetricsCommand::Flush => aggregator.flush_all().map(CommandOutcome::Flushed),
            MetricsCommand::Record {
                kind,
                name,
                value,
                tags,
            } => {
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                match (kind, value) {
                    (MetricKind::Count, CommandValue::Number(n)) => {
                        aggregator.increment(name, *n, &tags)?
                    }
                    (MetricKind::Gauge, CommandValue::Number(n)) => {
                        aggregator.set_gauge(name, *n, &tags)?
                    }
                    (MetricKind::Histogram, CommandValue::Number(n)) => {
                        aggregator.record_histogram(name, *n, &tags)?
                    }
                    (_, CommandValue::Member(member)) => {
                        aggregator.record_set_member(name, member.clone(), &tags)?
                    }
                    (MetricKind::Set, CommandValue::Number(n)) => {
                        aggregator.record_set_member(name, n.to_string(), &tags)?
                    }
                }
                Ok(CommandOutcome::Recorded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::clock::ManualClock;
    use crate::metrics::emitter::LineEmitter;

    #[test]
    fn test_parse_count_defaults_to_one() {
        let cmd = MetricsCommand::parse("count http.requests").unwrap();
        assert_eq!(
            cmd,
            MetricsCommand::Record {
                kind: MetricKind::Count,
                name: "http.requests".to_string(),
                value: CommandValue::Number(Number::Int(1)),
                tags: vec![],
            }
        );
    }

    #[test]
    fn test_parse_gauge_with_tags() {
        let cmd = MetricsCommand::parse("gauge system.cpu 75.5 host:web01,env:prod").unwrap();
        match cmd {
            MetricsCommand::Record {
                kind,
                name,
                value,
                tags,
            } => {
                assert_eq!(kind, MetricKind::Gauge);
                assert_eq!(name, "system.cpu");
                assert_eq!(value, CommandValue::Number("75.5".parse().unwrap()));
                assert_eq!(tags, vec!["host:web01", "env:prod"]);
            }
            _ => panic!("Expected Record command"),
        }
    }

    #[test]
    fn test_parse_set_member_is_text() {
        let cmd = MetricsCommand::parse("SET users alice").unwrap();
        assert!(matches!(
            cmd,
            MetricsCommand::Record {
                kind: MetricKind::Set,
                value: CommandValue::Member(ref m),
                ..
            } if m == "alice"
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(MetricsCommand::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            MetricsCommand::parse("timer x 1"),
            Err(CommandError::UnknownCommand("timer".to_string()))
        );
        assert_eq!(
            MetricsCommand::parse("gauge x"),
            Err(CommandError::MissingArgument("value"))
        );
        assert_eq!(
            MetricsCommand::parse("histogram x fast"),
            Err(CommandError::InvalidNumber("fast".to_string()))
        );
        assert_eq!(
            MetricsCommand::parse("count x 1 a b"),
            Err(CommandError::TooManyArguments(5))
        );
        assert_eq!(MetricsCommand::parse("flush"), Ok(MetricsCommand::Flush));
    }

    #[test]
    fn test_execute_then_flush() {
        let agg = Aggregator::with_emitter(
            "test",
            None,
            LineEmitter::new(std::io::sink(), ManualClock::new(0)),
        );

        for line in ["count hits 2 a", "count hits 3 a", "set users bob"] {
            let outcome = MetricsCommand::parse(line).unwrap().execute(&agg).unwrap();
            assert_eq!(outcome, CommandOutcome::Recorded);
        }

        let outcome = MetricsCommand::Flush.execute(&agg).unwrap();
        assert_eq!(outcome, CommandOutcome::Flushed(2));
    }
}
