//! Plain-text presenter for the terminal.

use std::collections::BTreeMap;
use std::io::{self, Write};

use parking_lot::Mutex;
use vitalwatch_sdk::{CompositeReading, Presenter, ScalarReading, SeriesPoint};
use vitalwatch_types::{Component, MetricKind, MonitorKey, ThresholdPair};

struct State<W> {
    out: W,
    thresholds: Option<ThresholdPair>,
    /// Latest composite reading per tracked patient, re-checked when
    /// thresholds change.
    composite: BTreeMap<String, CompositeReading>,
}

/// Prints one line per update and flags blood pressure readings above the
/// configured thresholds.
pub struct ConsolePresenter<W: Write + Send> {
    state: Mutex<State<W>>,
}

impl ConsolePresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsolePresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(State {
                out,
                thresholds: None,
                composite: BTreeMap::new(),
            }),
        }
    }

    pub fn into_inner(self) -> W {
        self.state.into_inner().out
    }
}

fn write_line<W: Write>(out: &mut W, line: std::fmt::Arguments<'_>) {
    // Output is best effort; a closed terminal must not stop the engine.
    let _ = out.write_fmt(line).and_then(|_| out.write_all(b"\n"));
    let _ = out.flush();
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn is_breached(reading: &CompositeReading, thresholds: Option<ThresholdPair>) -> bool {
    thresholds.is_some_and(|t| {
        t.is_breached_by(
            reading.value(Component::Systolic),
            reading.value(Component::Diastolic),
        )
    })
}

/// Width of the longest chart bar.
const BAR_WIDTH: i64 = 20;

/// One text row per point, bars scaled to the largest value.
fn chart_rows(points: &[SeriesPoint]) -> Vec<String> {
    let labels: Vec<String> = points
        .iter()
        .map(|p| format!("{} ({})", p.patient_name, p.patient_id))
        .collect();
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let max = points.iter().filter_map(|p| p.value).max().unwrap_or(0);

    points
        .iter()
        .zip(labels)
        .map(|(point, label)| {
            let bar = match point.value {
                Some(value) if max > 0 => "#".repeat((value.max(0) * BAR_WIDTH / max) as usize),
                _ => String::new(),
            };
            format!(
                "  {:<width$} |{} {}",
                label,
                bar,
                or_dash(point.value),
                width = label_width
            )
        })
        .collect()
}

fn describe_components(reading: &CompositeReading) -> String {
    reading
        .components
        .iter()
        .map(|(component, value)| {
            format!(
                "{} {} {}",
                component,
                or_dash(value.value),
                value.unit.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
    fn push_scalar_reading(&self, reading: &ScalarReading) {
        let mut state = self.state.lock();
        write_line(
            &mut state.out,
            format_args!(
                "[{}] {} ({}): {} {} at {}",
                reading.kind,
                reading.patient_name,
                reading.patient_id,
                or_dash(reading.value),
                reading.unit.as_deref().unwrap_or(""),
                reading.time.as_deref().unwrap_or("-"),
            ),
        );
    }

    fn push_composite_reading(&self, reading: &CompositeReading) {
        let mut state = self.state.lock();
        let flag = if is_breached(reading, state.thresholds) {
            " [ABOVE THRESHOLD]"
        } else {
            ""
        };
        write_line(
            &mut state.out,
            format_args!(
                "[{}] {} ({}): {} at {}{}",
                reading.kind,
                reading.patient_name,
                reading.patient_id,
                describe_components(reading),
                reading.time.as_deref().unwrap_or("-"),
                flag,
            ),
        );
        state
            .composite
            .insert(reading.patient_id.clone(), reading.clone());
    }

    fn push_average(&self, kind: MetricKind, average: Option<i64>) {
        let mut state = self.state.lock();
        write_line(
            &mut state.out,
            format_args!("[{}] average: {}", kind, or_dash(average)),
        );
    }

    fn push_thresholds(&self, kind: MetricKind, thresholds: ThresholdPair) {
        let mut state = self.state.lock();
        state.thresholds = Some(thresholds);

        let breached: Vec<String> = state
            .composite
            .values()
            .filter(|reading| is_breached(reading, Some(thresholds)))
            .map(|reading| format!("{} ({})", reading.patient_name, reading.patient_id))
            .collect();

        write_line(
            &mut state.out,
            format_args!(
                "[{}] thresholds: systolic > {}, diastolic > {}",
                kind, thresholds.first, thresholds.second
            ),
        );
        if !breached.is_empty() {
            write_line(
                &mut state.out,
                format_args!("[{}] above threshold: {}", kind, breached.join(", ")),
            );
        }
    }

    fn push_series(&self, kind: MetricKind, points: &[SeriesPoint]) {
        if points.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        write_line(&mut state.out, format_args!("[{}] by patient:", kind));
        for row in chart_rows(points) {
            write_line(&mut state.out, format_args!("{}", row));
        }
    }

    fn on_first_monitor_added(&self, kind: MetricKind) {
        let mut state = self.state.lock();
        write_line(
            &mut state.out,
            format_args!(
                "[{}] monitoring started; `freq <seconds>` changes the update frequency",
                kind
            ),
        );
    }

    fn on_last_monitor_removed(&self, kind: MetricKind) {
        let mut state = self.state.lock();
        if kind.is_composite() {
            state.composite.clear();
        }
        write_line(&mut state.out, format_args!("[{}] monitoring stopped", kind));
    }

    fn on_monitor_removed(&self, key: &MonitorKey) {
        let mut state = self.state.lock();
        if key.kind.is_composite() {
            state.composite.remove(&key.patient_id);
        }
        write_line(
            &mut state.out,
            format_args!("[{}] stopped monitoring {}", key.kind, key.patient_id),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalwatch_sdk::{ComponentValue, Observation};

    fn blood_pressure(patient: &str, systolic: &str, diastolic: &str) -> CompositeReading {
        let obs = Observation::new(
            MonitorKey::new(MetricKind::BloodPressure, patient),
            "Grace",
            "Hopper",
        );
        obs.set_value(Component::Systolic, systolic).unwrap();
        obs.set_unit(Component::Systolic, "mmHg");
        obs.set_value(Component::Diastolic, diastolic).unwrap();
        obs.set_unit(Component::Diastolic, "mmHg");
        obs.set_time("2021-01-01T10:00:00+10:00");
        CompositeReading::from_observation(&obs)
    }

    fn output(presenter: ConsolePresenter<Vec<u8>>) -> String {
        String::from_utf8(presenter.into_inner()).unwrap()
    }

    #[test]
    fn scalar_line() {
        let presenter = ConsolePresenter::new(Vec::new());
        presenter.push_scalar_reading(&ScalarReading {
            kind: MetricKind::Cholesterol,
            patient_id: "123".into(),
            patient_name: "Ada Lovelace".into(),
            value: Some(200),
            unit: Some("mg/dL".into()),
            time: Some("2021-01-01 10:00:00".into()),
        });
        presenter.push_average(MetricKind::Cholesterol, None);

        assert_eq!(
            output(presenter),
            "[CHOLESTEROL] Ada Lovelace (123): 200 mg/dL at 2021-01-01 10:00:00\n\
             [CHOLESTEROL] average: -\n"
        );
    }

    #[test]
    fn composite_line_flags_breach() {
        let presenter = ConsolePresenter::new(Vec::new());
        presenter.push_thresholds(MetricKind::BloodPressure, ThresholdPair::new(130, 85));
        presenter.push_composite_reading(&blood_pressure("42", "140", "80"));
        presenter.push_composite_reading(&blood_pressure("43", "120", "80"));

        let out = output(presenter);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines[1],
            "[BLOOD] Grace Hopper (42): SYSTOLIC 140 mmHg, DIASTOLIC 80 mmHg at 2021-01-01 10:00:00 [ABOVE THRESHOLD]"
        );
        assert!(!lines[2].contains("ABOVE THRESHOLD"));
    }

    #[test]
    fn new_thresholds_recheck_latest_readings() {
        let presenter = ConsolePresenter::new(Vec::new());
        presenter.push_composite_reading(&blood_pressure("42", "140", "90"));
        presenter.push_composite_reading(&blood_pressure("43", "120", "80"));
        presenter.push_thresholds(MetricKind::BloodPressure, ThresholdPair::new(130, 85));

        let out = output(presenter);
        assert!(out.ends_with("[BLOOD] above threshold: Grace Hopper (42)\n"));
    }

    #[test]
    fn removed_patient_is_not_flagged() {
        let presenter = ConsolePresenter::new(Vec::new());
        presenter.push_composite_reading(&blood_pressure("1", "140", "90"));
        presenter.push_composite_reading(&blood_pressure("2", "150", "95"));
        presenter.on_monitor_removed(&MonitorKey::new(MetricKind::BloodPressure, "1"));
        presenter.push_thresholds(MetricKind::BloodPressure, ThresholdPair::new(130, 85));

        let out = output(presenter);
        assert!(out.ends_with("[BLOOD] above threshold: Grace Hopper (2)\n"));
        assert!(!out.contains("above threshold: Grace Hopper (1)"));
    }

    #[test]
    fn series_renders_scaled_bars() {
        let point = |id: &str, name: &str, value| SeriesPoint {
            patient_id: id.into(),
            patient_name: name.into(),
            value,
        };
        let presenter = ConsolePresenter::new(Vec::new());
        presenter.push_series(
            MetricKind::Cholesterol,
            &[
                point("1", "Ada Lovelace", Some(200)),
                point("22", "Alan Turing", Some(100)),
                point("3", "Grace Hopper", None),
            ],
        );

        assert_eq!(
            output(presenter),
            "[CHOLESTEROL] by patient:\n\
             \x20 Ada Lovelace (1) |#################### 200\n\
             \x20 Alan Turing (22) |########## 100\n\
             \x20 Grace Hopper (3) | -\n"
        );
    }

    #[test]
    fn empty_series_prints_nothing() {
        let presenter = ConsolePresenter::new(Vec::new());
        presenter.push_series(MetricKind::Cholesterol, &[]);
        assert!(output(presenter).is_empty());
    }

    #[test]
    fn missing_component_prints_dash() {
        let mut reading = blood_pressure("42", "140", "90");
        reading
            .components
            .insert(Component::Diastolic, ComponentValue::default());

        assert_eq!(
            describe_components(&reading),
            "SYSTOLIC 140 mmHg, DIASTOLIC -"
        );
    }
}
