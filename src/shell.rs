//! Line-oriented command loop driving a [`Dashboard`].

use std::io::{self, Write};
use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use vitalwatch_types::{MetricKind, MonitorKey, UnknownMetric};

use crate::app::{Dashboard, TrackOutcome};
use crate::error::DashboardError;
use crate::input::InputError;

const HELP: &str = "\
commands:
  login <practitioner-id>        load a practitioner's patients
  patients                       list patients on the roster
  details <patient-id>           show a patient's details
  track <metric> <patient-id>    start monitoring (metric: cholesterol | blood)
  untrack <metric> <patient-id>  stop monitoring
  freq <seconds>                 set the update frequency
  thresholds <systolic> <diastolic>
  status                         show tracked monitors
  quit";

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Login(String),
    Patients,
    Details(String),
    Track(MetricKind, String),
    Untrack(MetricKind, String),
    Frequency(String),
    Thresholds(String, String),
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command {0:?}, type `help`")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Metric(#[from] UnknownMetric),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (name, args) = match words.split_first() {
            Some((name, args)) => (name.to_ascii_lowercase(), args),
            None => return Err(CommandError::Usage("help")),
        };

        let command = match (name.as_str(), args) {
            ("help" | "?", []) => Command::Help,
            ("login" | "practitioner", [id]) => Command::Login(id.to_string()),
            ("login" | "practitioner", _) => {
                return Err(CommandError::Usage("login <practitioner-id>"))
            }
            ("patients", []) => Command::Patients,
            ("details", [id]) => Command::Details(id.to_string()),
            ("details", _) => return Err(CommandError::Usage("details <patient-id>")),
            ("track", [metric, id]) => Command::Track(metric.parse()?, id.to_string()),
            ("track", _) => return Err(CommandError::Usage("track <metric> <patient-id>")),
            ("untrack", [metric, id]) => Command::Untrack(metric.parse()?, id.to_string()),
            ("untrack", _) => return Err(CommandError::Usage("untrack <metric> <patient-id>")),
            ("freq" | "frequency", [seconds]) => Command::Frequency(seconds.to_string()),
            ("freq" | "frequency", _) => return Err(CommandError::Usage("freq <seconds>")),
            ("thresholds", [systolic, diastolic]) => {
                Command::Thresholds(systolic.to_string(), diastolic.to_string())
            }
            ("thresholds", _) => {
                return Err(CommandError::Usage("thresholds <systolic> <diastolic>"))
            }
            ("status", []) => Command::Status,
            ("quit" | "exit", []) => Command::Quit,
            _ => return Err(CommandError::Unknown(line.trim().to_string())),
        };
        Ok(command)
    }
}

/// Read commands from `input` until it ends or `quit` is entered, then stop
/// periodic updates.
pub async fn run<R, W>(dashboard: &Dashboard, input: R, out: &mut W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => execute(dashboard, command, out).await?,
            Err(e) => writeln!(out, "error: {e}")?,
        }
        out.flush()?;
    }
    dashboard.shutdown();
    Ok(())
}

/// Carry out one command, writing its result to `out`.
pub async fn execute<W: Write>(
    dashboard: &Dashboard,
    command: Command,
    out: &mut W,
) -> io::Result<()> {
    let result = match command {
        Command::Help => {
            writeln!(out, "{HELP}")?;
            Ok(None)
        }
        Command::Login(id) => dashboard.load_roster(&id).await.map(|count| {
            let name = dashboard
                .practitioner()
                .map(|p| p.full_name)
                .unwrap_or_default();
            Some(format!("{name}: {count} patients"))
        }),
        Command::Patients => {
            for patient in dashboard.patients() {
                writeln!(out, "{}  {}", patient.id, patient.full_name())?;
            }
            Ok(None)
        }
        Command::Details(id) => dashboard.patient_details(&id).map(|p| {
            Some(format!(
                "{}\n  birth date: {}\n  gender: {}\n  address: {}",
                p.full_name(),
                p.birth_date,
                p.gender,
                p.address
            ))
        }),
        Command::Track(kind, id) => dashboard.track(kind, &id).await.map(|outcome| {
            (outcome == TrackOutcome::AlreadyTracked)
                .then(|| format!("{kind} already tracked for {id}"))
        }),
        Command::Untrack(kind, id) => dashboard
            .untrack(&MonitorKey::new(kind, id))
            .await
            .map(|()| None),
        Command::Frequency(text) => dashboard
            .set_frequency(&text)
            .map(|seconds| Some(format!("updating every {seconds}s"))),
        Command::Thresholds(systolic, diastolic) => dashboard
            .set_thresholds(&systolic, &diastolic)
            .map(|_| None),
        Command::Status => {
            writeln!(
                out,
                "updates {} every {}s",
                if dashboard.is_updating() { "running" } else { "stopped" },
                dashboard.frequency().as_secs()
            )?;
            for key in dashboard.tracked() {
                writeln!(out, "  {} {}", key.kind, key.patient_id)?;
            }
            Ok(None)
        }
        Command::Quit => Ok(None),
    };

    match result {
        Ok(None) => Ok(()),
        Ok(Some(message)) => writeln!(out, "{message}"),
        Err(DashboardError::Input(InputError::Frequency { min, reset_to, .. })) => writeln!(
            out,
            "error: frequency must be a whole number of seconds, at least {min}; \
             keeping {}s (default {reset_to}s)",
            dashboard.frequency().as_secs()
        ),
        Err(e) => writeln!(out, "error: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::sync::Arc;
    use std::time::Duration;
    use vitalwatch_sdk::testing::{
        cholesterol_reading, patient, FakeDirectory, FakeSource, RecordingPresenter,
    };

    #[test]
    fn parse_commands() {
        assert_eq!("help".parse(), Ok(Command::Help));
        assert_eq!(
            "track blood 42".parse(),
            Ok(Command::Track(MetricKind::BloodPressure, "42".into()))
        );
        assert_eq!(
            "  UNTRACK cholesterol 7 ".parse(),
            Ok(Command::Untrack(MetricKind::Cholesterol, "7".into()))
        );
        assert_eq!("freq 30".parse(), Ok(Command::Frequency("30".into())));
        assert_eq!(
            "thresholds 130 85".parse(),
            Ok(Command::Thresholds("130".into(), "85".into()))
        );
        assert_eq!("exit".parse(), Ok(Command::Quit));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            "track 42".parse::<Command>(),
            Err(CommandError::Usage("track <metric> <patient-id>"))
        );
        assert!(matches!(
            "track glucose 42".parse::<Command>(),
            Err(CommandError::Metric(_))
        ));
        assert!(matches!(
            "dance".parse::<Command>(),
            Err(CommandError::Unknown(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn session_script() {
        let source = Arc::new(FakeSource::new());
        let directory = Arc::new(FakeDirectory::new());
        directory.add_practitioner("500", "Dr. Jaime Ramos");
        directory.add_page(&["1"]);
        directory.add_patient(patient("1", "Ada", "Lovelace"));
        source.set_reading(
            "1",
            MetricKind::Cholesterol,
            cholesterol_reading("200", "2021-01-01T10:00:00+10:00"),
        );
        let dashboard = Dashboard::new(
            Settings::default(),
            source,
            directory,
            Arc::new(RecordingPresenter::new()),
        )
        .unwrap();

        let script = b"login 500\npatients\ntrack chol 1\nfreq 2\nstatus\nuntrack chol 1\nquit\nstatus\n";
        let mut out = Vec::new();
        run(&dashboard, &script[..], &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Dr. Jaime Ramos: 1 patients"));
        assert!(out.contains("1  Ada Lovelace"));
        assert!(out.contains("error: frequency must be a whole number of seconds, at least 5"));
        assert!(out.contains("updates running every 60s\n  CHOLESTEROL 1\n"));
        assert_eq!(out.matches("updates").count(), 1);
        assert!(dashboard.tracked().is_empty());
        assert!(!dashboard.is_updating());
    }

    struct ClosedOutput;

    impl Write for ClosedOutput {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn write_failures_are_returned() {
        let directory = Arc::new(FakeDirectory::new());
        directory.add_practitioner("500", "Dr. Jaime Ramos");
        directory.add_page(&["1"]);
        directory.add_patient(patient("1", "Ada", "Lovelace"));
        let dashboard = Dashboard::new(
            Settings::default(),
            Arc::new(FakeSource::new()),
            directory,
            Arc::new(RecordingPresenter::new()),
        )
        .unwrap();

        let commands = [
            Command::Login("500".into()),
            Command::Details("1".into()),
            Command::Frequency("30".into()),
        ];
        for command in commands {
            let err = execute(&dashboard, command, &mut ClosedOutput)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        }
        assert_eq!(dashboard.frequency(), Duration::from_secs(30));
    }
}
