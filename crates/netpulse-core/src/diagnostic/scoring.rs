// ── Layer grading ──
//
// Pure functions over finished sub-test results: per-layer status, the
// bottom-up waterfall, the weighted health score and the overall verdict.

use crate::model::{Layer, LayerResult, Status, TestResult};

/// Fail if any sub-test failed, else Warning if any warned, else Pass.
/// No sub-tests at all is Unknown.
pub fn aggregate_status(tests: &[TestResult]) -> Status {
    if tests.is_empty() {
        return Status::Unknown;
    }
    if tests.iter().any(|t| t.status == Status::Fail) {
        Status::Fail
    } else if tests.iter().any(|t| t.status == Status::Warning) {
        Status::Warning
    } else {
        Status::Pass
    }
}

pub fn layer_result(layer: Layer, tests: Vec<TestResult>) -> LayerResult {
    let status = aggregate_status(&tests);
    let latency_ms = tests
        .iter()
        .filter_map(|t| t.latency_ms)
        .fold(None, |max: Option<f64>, l| Some(max.map_or(l, |m| m.max(l))));
    LayerResult {
        layer_number: layer.number(),
        layer_name: layer.name().to_owned(),
        summary: summarize(status, &tests),
        status,
        tests,
        latency_ms,
    }
}

fn summarize(status: Status, tests: &[TestResult]) -> String {
    let named = |wanted: Status| {
        tests
            .iter()
            .filter(|t| t.status == wanted)
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    match status {
        Status::Pass => format!("All {} checks passed", tests.len()),
        Status::Warning => format!("Warnings: {}", named(Status::Warning)),
        Status::Fail => format!("Failed: {}", named(Status::Fail)),
        Status::Unknown => "No checks configured".to_owned(),
        Status::Blocked => "Blocked".to_owned(),
    }
}

/// Block every layer above the lowest failing one. Sub-test results are
/// kept. Returns the number of the failing layer, if any.
pub fn apply_waterfall(layers: &mut [LayerResult]) -> Option<u8> {
    let (number, name) = layers
        .iter()
        .filter(|l| l.status == Status::Fail)
        .min_by_key(|l| l.layer_number)
        .map(|l| (l.layer_number, l.layer_name.clone()))?;

    for layer in layers.iter_mut().filter(|l| l.layer_number > number) {
        layer.status = Status::Blocked;
        layer.summary = format!("Blocked by Layer {number} ({name}) failure");
    }
    Some(number)
}

/// `round(sum(weight * contribution))`, clamped to 0..=100.
pub fn health_score(layers: &[LayerResult]) -> u8 {
    let total: f64 = layers
        .iter()
        .filter_map(|l| {
            Layer::from_number(l.layer_number)
                .map(|layer| f64::from(layer.weight()) * l.status.contribution())
        })
        .sum();
    total.round().clamp(0.0, 100.0) as u8
}

pub fn overall_status(layers: &[LayerResult]) -> Status {
    if layers.iter().any(|l| l.status == Status::Fail) {
        Status::Fail
    } else if layers.iter().any(|l| l.status == Status::Warning) {
        Status::Warning
    } else {
        Status::Pass
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layers(statuses: [Status; 7]) -> Vec<LayerResult> {
        Layer::ALL
            .into_iter()
            .zip(statuses)
            .map(|(layer, status)| {
                let test = TestResult::new(format!("t{}", layer.number()), status, "");
                layer_result(layer, vec![test])
            })
            .collect()
    }

    #[test]
    fn aggregation_prefers_worst_status() {
        let pass = TestResult::pass("a", "");
        let warn = TestResult::warning("b", "");
        let fail = TestResult::fail("c", "");
        assert_eq!(aggregate_status(&[]), Status::Unknown);
        assert_eq!(aggregate_status(&[pass.clone()]), Status::Pass);
        assert_eq!(aggregate_status(&[pass.clone(), warn.clone()]), Status::Warning);
        assert_eq!(aggregate_status(&[warn, fail, pass]), Status::Fail);
    }

    #[test]
    fn network_failure_blocks_upper_layers() {
        let mut layers = layers([
            Status::Pass,
            Status::Pass,
            Status::Fail,
            Status::Fail,
            Status::Pass,
            Status::Pass,
            Status::Warning,
        ]);
        let blocked = apply_waterfall(&mut layers);

        assert_eq!(blocked, Some(3));
        assert_eq!(layers[2].status, Status::Fail);
        for layer in &layers[3..] {
            assert_eq!(layer.status, Status::Blocked);
            assert_eq!(layer.summary, "Blocked by Layer 3 (Network) failure");
            assert_eq!(layer.tests.len(), 1);
        }
        assert_eq!(health_score(&layers), 35);
        assert_eq!(overall_status(&layers), Status::Fail);
    }

    #[test]
    fn no_failure_means_nothing_blocked() {
        let mut all_pass = layers([Status::Pass; 7]);
        assert_eq!(apply_waterfall(&mut all_pass), None);
        assert_eq!(health_score(&all_pass), 100);
        assert_eq!(overall_status(&all_pass), Status::Pass);
    }

    #[test]
    fn any_single_non_pass_layer_drops_below_100() {
        for (index, layer) in Layer::ALL.into_iter().enumerate() {
            for status in [Status::Warning, Status::Fail, Status::Blocked, Status::Unknown] {
                let mut all = layers([Status::Pass; 7]);
                all[index].status = status;

                let lost = f64::from(layer.weight()) * (1.0 - status.contribution());
                let score = health_score(&all);
                assert!(score < 100, "{layer:?} {status:?} scored {score}");
                assert!((f64::from(score) - (100.0 - lost).round()).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn warnings_earn_partial_weight() {
        let mut statuses = [Status::Pass; 7];
        statuses[0] = Status::Warning;
        let layers = layers(statuses);
        // 100 - 20 + 20 * 0.6
        assert_eq!(health_score(&layers), 92);
        assert_eq!(overall_status(&layers), Status::Warning);
    }

    #[test]
    fn unknown_layer_earns_nothing() {
        let mut layers = layers([Status::Pass; 7]);
        layers[3] = layer_result(Layer::Transport, Vec::new());
        assert_eq!(layers[3].status, Status::Unknown);
        assert_eq!(health_score(&layers), 85);
        assert_eq!(overall_status(&layers), Status::Pass);
    }

    #[test]
    fn layer_latency_is_slowest_test() {
        let result = layer_result(
            Layer::Transport,
            vec![
                TestResult::pass("tcp_443", "").with_latency(12.0),
                TestResult::pass("tcp_53", "").with_latency(30.5),
            ],
        );
        assert_eq!(result.latency_ms, Some(30.5));
        assert_eq!(result.summary, "All 2 checks passed");
    }
}
