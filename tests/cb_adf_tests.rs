// tests/cb_adf_tests.rs

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::rc::Rc;

use cb_adf_lib::driver;
use cb_adf_lib::{
    Action, BaseLearner, CbAdf, CbAdfError, CbClass, CbLabel, EstimatorMode, Feature, Label,
    OnlineRegressor, Operation, OutputSinks, ReductionConfig, RunStats, Scorer, COST_SENTINEL,
};

// --- Test doubles ---

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("sink output is utf8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Predicts the same action every time and records what it was shown.
struct ScriptedLearner {
    choice: u32,
    calls: Vec<(Operation, f32)>,
}

impl ScriptedLearner {
    fn choosing(choice: u32) -> Self {
        Self {
            choice,
            calls: Vec::new(),
        }
    }

    fn record(&mut self, operation: Operation, action: &mut Action) {
        let x = action
            .cs_label()
            .and_then(|ld| ld.costs.first())
            .map_or(f32::NAN, |wc| wc.x);
        self.calls.push((operation, x));
        action.prediction.multiclass = self.choice;
    }

    fn operations(&self) -> Vec<Operation> {
        self.calls.iter().map(|(op, _)| *op).collect()
    }

    fn xs(&self) -> Vec<f32> {
        self.calls.iter().map(|(_, x)| *x).collect()
    }
}

impl BaseLearner for ScriptedLearner {
    fn predict(&mut self, action: &mut Action) {
        self.record(Operation::Predict, action);
    }

    fn learn(&mut self, action: &mut Action) {
        self.record(Operation::Learn, action);
    }
}

/// Rejects every write, with an error or by accepting zero bytes.
struct BrokenSink {
    short_writes: bool,
}

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        if self.short_writes {
            Ok(0)
        } else {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct ConstantScorer {
    baseline: f32,
    learned: Rc<Cell<usize>>,
}

impl Scorer for ConstantScorer {
    fn predict_cost(&mut self, _action: &Action, _class_index: u32) -> f32 {
        self.baseline
    }

    fn learn_cost(&mut self, _action: &Action, _class_index: u32, _observed: &CbClass) -> f32 {
        self.learned.set(self.learned.get() + 1);
        self.baseline
    }
}

// --- Helpers ---

fn quiet_config(ring_size: usize) -> ReductionConfig {
    ReductionConfig {
        ring_size,
        quiet: true,
        ..ReductionConfig::default()
    }
}

fn candidate(index: u64) -> Action {
    Action::new(vec![Feature { index, value: 1.0 }], CbLabel::default())
}

fn labeled(index: u64, action: u32, cost: f32, probability: f32) -> Action {
    Action::new(
        vec![Feature { index, value: 1.0 }],
        CbLabel::new(vec![CbClass::new(action, cost, probability)]),
    )
}

fn header() -> Action {
    Action::new(
        vec![
            Feature {
                index: 100,
                value: 1.0,
            },
            Feature {
                index: 101,
                value: 1.0,
            },
        ],
        CbLabel::shared(),
    )
}

fn reduction_with_output(
    config: ReductionConfig,
    choice: u32,
) -> (CbAdf<ScriptedLearner>, SharedBuffer) {
    let out = SharedBuffer::default();
    let reduction = CbAdf::new(config, ScriptedLearner::choosing(choice))
        .expect("valid setup")
        .with_sinks(OutputSinks::new().with_final_prediction(Box::new(out.clone())));
    (reduction, out)
}

/// Intake followed by finish, as a driving loop does it.
fn feed<L: BaseLearner>(reduction: &mut CbAdf<L>, actions: Vec<Action>, operation: Operation) {
    for action in actions {
        let handle = reduction
            .predict_or_learn(action, operation)
            .expect("decision point accepted");
        reduction.finish_example(handle).expect("decision point reported");
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

// --- Flush controller ---

#[test]
fn test_forced_flush_when_buffer_full() {
    let (mut reduction, out) = reduction_with_output(quiet_config(5), 1);

    for index in 1..=3 {
        let handle = reduction
            .predict_or_learn(candidate(index), Operation::Learn)
            .unwrap();
        reduction.finish_example(handle).unwrap();
        assert!(!reduction.need_to_clear());
    }
    assert_eq!(reduction.batch().len(), 3);
    assert!(reduction.base().calls.is_empty());

    // The batch already holds ring_size - 2 actions, so this intake flushes.
    let handle = reduction
        .predict_or_learn(candidate(4), Operation::Learn)
        .unwrap();
    assert!(reduction.need_to_clear());
    assert_eq!(reduction.batch().len(), 4);
    assert_eq!(reduction.base().calls.len(), 4);

    reduction.finish_example(handle).unwrap();
    assert!(reduction.batch().is_empty());
    assert!(reduction.arena().is_empty());
    assert_eq!(out.contents(), "1\n1\n1\n1\n\n");
}

#[test]
fn test_forced_flush_splits_decision_point() {
    let (mut reduction, _out) = reduction_with_output(quiet_config(5), 1);

    feed(
        &mut reduction,
        vec![
            labeled(1, 1, 2.0, 0.5),
            candidate(2),
            candidate(3),
            candidate(4),
            candidate(5),
            Action::newline(),
        ],
        Operation::Learn,
    );

    // First half trains with the costed line; its last slot is the marker.
    // The remainder has no cost and is only predicted.
    assert_eq!(
        reduction.base().operations(),
        vec![
            Operation::Learn,
            Operation::Learn,
            Operation::Learn,
            Operation::Learn,
            Operation::Predict,
            Operation::Predict,
        ]
    );
    assert_eq!(
        reduction.base().xs(),
        vec![4.0, 0.0, 0.0, COST_SENTINEL, 0.0, COST_SENTINEL]
    );
    assert_eq!(reduction.shared_data().example_number, 2);
}

#[test]
fn test_blank_line_terminates_decision_point() {
    let (mut reduction, out) = reduction_with_output(quiet_config(256), 2);

    let a = reduction
        .predict_or_learn(candidate(1).with_tag("a"), Operation::Learn)
        .unwrap();
    reduction.finish_example(a).unwrap();
    let b = reduction
        .predict_or_learn(candidate(2).with_tag("b"), Operation::Learn)
        .unwrap();
    reduction.finish_example(b).unwrap();
    assert_eq!(out.contents(), "");

    let end = reduction
        .predict_or_learn(Action::newline(), Operation::Learn)
        .unwrap();
    assert!(reduction.need_to_clear());
    reduction.finish_example(end).unwrap();

    assert_eq!(out.contents(), "2 a\n2 b\n\n");
    assert!(!reduction.need_to_clear());
    assert!(reduction.arena().is_empty());
}

#[test]
fn test_priming_clears_flushed_batch_on_next_intake() {
    let (mut reduction, out) = reduction_with_output(quiet_config(256), 1);

    for action in vec![candidate(1), candidate(2), Action::newline()] {
        reduction.predict_or_learn(action, Operation::Learn).unwrap();
    }
    assert!(reduction.need_to_clear());
    assert_eq!(reduction.arena().len(), 3);

    let next = reduction
        .predict_or_learn(candidate(3), Operation::Learn)
        .unwrap();
    assert!(!reduction.need_to_clear());
    assert_eq!(reduction.batch(), &[next]);
    assert_eq!(reduction.arena().len(), 1);
    assert_eq!(out.contents(), "", "cleared batch is not reported");
    assert_eq!(reduction.shared_data().example_number, 0);
}

#[test]
fn test_end_examples_discards_flushed_batch() {
    let (mut reduction, out) = reduction_with_output(quiet_config(256), 1);

    reduction.predict_or_learn(candidate(1), Operation::Learn).unwrap();
    reduction
        .predict_or_learn(Action::newline(), Operation::Learn)
        .unwrap();
    assert!(reduction.need_to_clear());

    reduction.end_examples();
    assert!(!reduction.need_to_clear());
    assert!(reduction.batch().is_empty());
    assert!(reduction.arena().is_empty());
    assert_eq!(reduction.base().calls.len(), 2, "not processed again");
    assert_eq!(out.contents(), "");
}

#[test]
fn test_end_examples_on_idle_reduction_is_noop() {
    let (mut reduction, out) = reduction_with_output(quiet_config(256), 1);
    let before = reduction.shared_data().clone();

    reduction.end_examples();
    assert_eq!(reduction.shared_data(), &before);
    assert!(reduction.batch().is_empty());

    // A pending, unflushed batch survives both calls untouched.
    let pending = reduction
        .predict_or_learn(candidate(1), Operation::Learn)
        .unwrap();
    reduction.finish_example(pending).unwrap();
    reduction.end_examples();
    assert_eq!(reduction.batch(), &[pending]);
    assert_eq!(reduction.shared_data(), &before);
    assert_eq!(out.contents(), "");

    let sd = reduction.finish();
    assert_eq!(sd, before);
}

// --- Validation through the reduction ---

#[test]
fn test_invalid_decision_point_is_disposed() {
    let (mut reduction, out) = reduction_with_output(quiet_config(256), 1);

    reduction
        .predict_or_learn(labeled(1, 1, 1.0, 0.3), Operation::Learn)
        .unwrap();
    reduction
        .predict_or_learn(labeled(2, 2, 2.0, 0.5), Operation::Learn)
        .unwrap();
    let result = reduction.predict_or_learn(Action::newline(), Operation::Learn);

    assert!(matches!(
        result,
        Err(CbAdfError::MultipleLabeledLines { count: 2 })
    ));
    assert!(reduction.batch().is_empty());
    assert!(reduction.arena().is_empty());
    assert!(!reduction.need_to_clear());
    assert!(reduction.base().calls.is_empty());

    // The next decision point goes through normally.
    feed(
        &mut reduction,
        vec![labeled(1, 1, 1.0, 0.3), candidate(2), Action::newline()],
        Operation::Learn,
    );
    assert_eq!(out.contents(), "1\n1\n\n");
    assert_eq!(reduction.shared_data().example_number, 1);
}

#[test]
fn test_header_after_first_line_is_rejected() {
    let (mut reduction, _out) = reduction_with_output(quiet_config(256), 1);
    reduction.predict_or_learn(candidate(1), Operation::Learn).unwrap();
    reduction.predict_or_learn(header(), Operation::Learn).unwrap();
    let result = reduction.predict_or_learn(Action::newline(), Operation::Learn);
    assert!(matches!(
        result,
        Err(CbAdfError::HeaderNotFirst { position: 1 })
    ));
}

// --- Estimation and the learner adapter ---

#[test]
fn test_shared_header_labels_and_output() {
    let (mut reduction, out) = reduction_with_output(quiet_config(256), 1);

    feed(
        &mut reduction,
        vec![header(), labeled(1, 1, 2.0, 0.4), candidate(2), Action::newline()],
        Operation::Learn,
    );

    let xs = reduction.base().xs();
    assert_eq!(xs.len(), 4);
    assert_eq!(xs[0], -1.0);
    assert!((xs[1] - 5.0).abs() < 1e-5);
    assert_eq!(xs[2], 0.0);
    assert_eq!(xs[3], COST_SENTINEL);

    // The header is not reported and contributes no features.
    assert_eq!(out.contents(), "1\n1\n\n");
    assert_eq!(reduction.shared_data().total_features, 2);
}

#[test]
fn test_bandit_labels_survive_flush() {
    let (mut reduction, _out) = reduction_with_output(quiet_config(256), 1);
    let actions = vec![
        labeled(1, 1, 0.25, 0.5),
        Action::new(
            vec![Feature { index: 2, value: 1.0 }],
            CbLabel::new(vec![CbClass::new(2, COST_SENTINEL, 0.0)]),
        ),
        Action::newline(),
    ];
    let before: Vec<Label> = actions.iter().map(|a| a.label.clone()).collect();

    let handles: Vec<_> = actions
        .into_iter()
        .map(|a| reduction.predict_or_learn(a, Operation::Learn).unwrap())
        .collect();
    assert!(reduction.need_to_clear());

    let after: Vec<Label> = handles
        .iter()
        .map(|h| reduction.arena().get(*h).unwrap().label.clone())
        .collect();
    assert_eq!(before, after);
    assert!(handles
        .iter()
        .all(|h| reduction.arena().get(*h).unwrap().prediction.multiclass == 1));

    // The estimator output stays available until the batch is finished.
    let xs: Vec<f32> = reduction.cs_labels().iter().map(|ld| ld.costs[0].x).collect();
    assert_eq!(xs, vec![0.5, 0.0, COST_SENTINEL]);
    assert_eq!(reduction.known_cost(), Some(&CbClass::new(1, 0.25, 0.5)));
}

#[test]
fn test_predict_operation_never_learns() {
    let (mut reduction, _out) = reduction_with_output(quiet_config(256), 2);
    feed(
        &mut reduction,
        vec![candidate(1), labeled(2, 2, 0.7, 0.5), Action::newline()],
        Operation::Predict,
    );
    assert_eq!(
        reduction.base().operations(),
        vec![Operation::Predict, Operation::Predict, Operation::Predict]
    );
    assert!(reduction.known_cost().is_none());
    // Loss is still accounted for labeled data.
    assert_close(reduction.shared_data().sum_loss, 0.7);
}

#[test]
fn test_test_decision_point_is_predicted() {
    let (mut reduction, out) = reduction_with_output(quiet_config(256), 3);
    feed(
        &mut reduction,
        vec![candidate(1), candidate(2), candidate(3), Action::newline()],
        Operation::Learn,
    );
    assert!(reduction
        .base()
        .operations()
        .iter()
        .all(|op| *op == Operation::Predict));
    assert_eq!(out.contents(), "3\n3\n3\n\n");
    let sd = reduction.shared_data();
    assert_eq!(sd.sum_loss, 0.0);
    assert_eq!(sd.total_features, 3);
    assert_eq!(sd.weighted_examples, 1.0);
}

#[test]
fn test_doubly_robust_learning() {
    let learned = Rc::new(Cell::new(0));
    let scorer = ConstantScorer {
        baseline: 1.0,
        learned: learned.clone(),
    };
    let config = ReductionConfig {
        cb_type: EstimatorMode::Dr,
        ..quiet_config(256)
    };
    let mut reduction =
        CbAdf::with_scorer(config, ScriptedLearner::choosing(2), Box::new(scorer)).unwrap();

    feed(
        &mut reduction,
        vec![
            candidate(1),
            labeled(2, 2, 3.0, 0.5),
            candidate(3),
            Action::newline(),
        ],
        Operation::Learn,
    );

    // Baseline everywhere; the observed action gets 1 + (3 - 1) / 0.5.
    assert_eq!(reduction.base().xs(), vec![1.0, 5.0, 1.0, COST_SENTINEL]);
    assert_eq!(learned.get(), 1);
    assert_close(reduction.shared_data().sum_loss, 3.0);

    // Test decision points fall back to IPS labels and leave the scorer alone.
    feed(
        &mut reduction,
        vec![candidate(1), candidate(2), Action::newline()],
        Operation::Learn,
    );
    assert_eq!(&reduction.base().xs()[4..], &[0.0, 0.0, COST_SENTINEL]);
    assert_eq!(learned.get(), 1);
}

#[test]
fn test_dr_requires_scorer() {
    let config = ReductionConfig {
        cb_type: EstimatorMode::Dr,
        ..quiet_config(256)
    };
    let result = CbAdf::new(config, ScriptedLearner::choosing(1));
    assert!(matches!(result, Err(CbAdfError::MissingScorer)));
}

#[test]
fn test_invalid_ring_size_rejected_at_setup() {
    let result = CbAdf::new(quiet_config(2), ScriptedLearner::choosing(1));
    assert!(matches!(result, Err(CbAdfError::InvalidRingSize(2))));
}

// --- Output & loss accounting ---

#[test]
fn test_loss_matches_predicted_action() {
    let (mut reduction, _out) = reduction_with_output(quiet_config(256), 2);
    feed(
        &mut reduction,
        vec![candidate(1), labeled(2, 2, 0.7, 0.5), Action::newline()],
        Operation::Learn,
    );
    let sd = reduction.shared_data();
    assert_close(sd.sum_loss, 0.7);
    assert_close(sd.average_loss(), 0.7);
    assert_eq!(sd.example_number, 1);

    let xs = reduction.base().xs();
    assert_eq!(xs[0], 0.0);
    assert!((xs[1] - 1.4).abs() < 1e-5);
    assert_eq!(xs[2], COST_SENTINEL);
}

#[test]
fn test_loss_zero_when_prediction_misses() {
    let (mut reduction, _out) = reduction_with_output(quiet_config(256), 5);
    feed(
        &mut reduction,
        vec![candidate(1), labeled(2, 2, 0.7, 0.5), Action::newline()],
        Operation::Learn,
    );
    let sd = reduction.shared_data();
    assert_eq!(sd.sum_loss, 0.0);
    assert_eq!(sd.weighted_examples, 1.0);
}

#[test]
fn test_negative_loss_is_fatal() {
    let (mut reduction, out) = reduction_with_output(quiet_config(256), 1);
    reduction
        .predict_or_learn(labeled(1, 1, -1.0, 0.5), Operation::Learn)
        .unwrap();
    let end = reduction
        .predict_or_learn(Action::newline(), Operation::Learn)
        .unwrap();

    let result = reduction.finish_example(end);
    assert!(matches!(
        result,
        Err(CbAdfError::NegativeLoss { position: 0, .. })
    ));
    assert!(!reduction.need_to_clear());
    assert!(reduction.arena().is_empty());
    assert_eq!(out.contents(), "", "no separator after a failed report");
}

#[test]
fn test_raw_predictions() {
    let out = SharedBuffer::default();
    let raw = SharedBuffer::default();
    let config = ReductionConfig {
        raw_predictions: true,
        ..quiet_config(256)
    };
    let mut reduction = CbAdf::new(config, ScriptedLearner::choosing(1))
        .unwrap()
        .with_sinks(
            OutputSinks::new()
                .with_final_prediction(Box::new(out.clone()))
                .with_raw_prediction(Box::new(raw.clone())),
        );

    feed(
        &mut reduction,
        vec![
            labeled(1, 1, 0.5, 0.5).with_tag("a"),
            candidate(2).with_tag("b"),
            Action::newline(),
        ],
        Operation::Learn,
    );

    assert_eq!(out.contents(), "1 a\n1 b\n\n");
    assert_eq!(raw.contents(), "1:0 a\n b\n a\n");
    assert_close(reduction.shared_data().sum_loss, 0.5);
}

#[test]
fn test_every_final_sink_receives_predictions() {
    let first = SharedBuffer::default();
    let second = SharedBuffer::default();
    let mut reduction = CbAdf::new(quiet_config(256), ScriptedLearner::choosing(4))
        .unwrap()
        .with_sinks(
            OutputSinks::new()
                .with_final_prediction(Box::new(first.clone()))
                .with_final_prediction(Box::new(second.clone())),
        );
    feed(
        &mut reduction,
        vec![candidate(1), Action::newline()],
        Operation::Learn,
    );
    assert_eq!(first.contents(), "4\n\n");
    assert_eq!(second.contents(), "4\n\n");
}

#[test]
fn test_failing_sinks_do_not_stop_reporting() {
    let good = SharedBuffer::default();
    let config = ReductionConfig {
        raw_predictions: true,
        ..quiet_config(256)
    };
    let mut reduction = CbAdf::new(config, ScriptedLearner::choosing(1))
        .unwrap()
        .with_sinks(
            OutputSinks::new()
                .with_final_prediction(Box::new(BrokenSink {
                    short_writes: false,
                }))
                .with_final_prediction(Box::new(good.clone()))
                .with_final_prediction(Box::new(BrokenSink { short_writes: true }))
                .with_raw_prediction(Box::new(BrokenSink {
                    short_writes: false,
                })),
        );

    let mut last = None;
    for action in vec![labeled(1, 1, 0.5, 0.5), candidate(2), Action::newline()] {
        let handle = reduction.predict_or_learn(action, Operation::Learn).unwrap();
        last = Some(reduction.finish_example(handle));
    }

    assert!(matches!(last, Some(Ok(()))));
    assert_eq!(good.contents(), "1\n1\n\n");
    assert_close(reduction.shared_data().sum_loss, 0.5);
    assert_eq!(reduction.shared_data().example_number, 1);
    assert!(reduction.arena().is_empty());
    assert!(!reduction.need_to_clear());
}

// --- Reference learner ---

/// Teach the regressor that feature 1 costs 4 and feature 2 costs nothing.
fn trained_regressor(out: &SharedBuffer, config: ReductionConfig) -> CbAdf<OnlineRegressor> {
    let mut reduction = CbAdf::new(config, OnlineRegressor::default())
        .unwrap()
        .with_sinks(OutputSinks::new().with_final_prediction(Box::new(out.clone())));
    for _ in 0..30 {
        feed(
            &mut reduction,
            vec![labeled(1, 1, 4.0, 1.0), Action::newline()],
            Operation::Learn,
        );
    }
    reduction
}

#[test]
fn test_regressor_reports_one_choice_per_decision_point() {
    let out = SharedBuffer::default();
    let mut reduction = trained_regressor(&out, quiet_config(256));
    let trained_loss = reduction.shared_data().sum_loss;
    let seen = out.contents().len();

    // The cheap action comes second; the costed first line must not be
    // charged for a choice it did not win.
    feed(
        &mut reduction,
        vec![labeled(1, 1, 1.0, 0.5), candidate(2), Action::newline()],
        Operation::Predict,
    );
    assert_eq!(&out.contents()[seen..], "2\n2\n\n");
    assert_close(reduction.shared_data().sum_loss, trained_loss);

    // When the cheap action is the costed one, its cost is charged once.
    let seen = out.contents().len();
    feed(
        &mut reduction,
        vec![labeled(2, 1, 0.3, 0.5), candidate(1), Action::newline()],
        Operation::Predict,
    );
    assert_eq!(&out.contents()[seen..], "1\n1\n\n");
    assert!((reduction.shared_data().sum_loss - trained_loss - 0.3).abs() < 1e-5);
}

#[test]
fn test_raw_predictions_carry_learner_scores() {
    let out = SharedBuffer::default();
    let raw = SharedBuffer::default();
    let config = ReductionConfig {
        raw_predictions: true,
        ..quiet_config(256)
    };
    let reduction = trained_regressor(&out, config);
    let mut reduction = reduction.with_sinks(
        OutputSinks::new()
            .with_final_prediction(Box::new(out.clone()))
            .with_raw_prediction(Box::new(raw.clone())),
    );

    feed(
        &mut reduction,
        vec![
            Action::new(
                vec![Feature {
                    index: 1,
                    value: 1.0,
                }],
                CbLabel::new(vec![CbClass::new(3, COST_SENTINEL, 0.0)]),
            ),
            Action::newline(),
        ],
        Operation::Predict,
    );

    let contents = raw.contents();
    let first = contents.lines().next().expect("one raw record");
    let (action, score) = first.split_once(':').expect("action:score pair");
    assert_eq!(action, "3");
    let score: f32 = score.parse().expect("numeric score");
    assert!(score > 3.5 && score < 4.0, "score {}", score);
}

#[test]
fn test_progress_interval_doubles() {
    let config = ReductionConfig {
        quiet: false,
        ..quiet_config(256)
    };
    let mut reduction = CbAdf::new(config, ScriptedLearner::choosing(1)).unwrap();
    for _ in 0..3 {
        feed(
            &mut reduction,
            vec![candidate(1), Action::newline()],
            Operation::Learn,
        );
    }
    // Lines were printed after decision points 1 and 2; the next one is due at 4.
    let sd = reduction.shared_data();
    assert_eq!(sd.dump_interval, 4.0);
    assert_eq!(sd.old_weighted_examples, 2.0);
}

// --- Driver ---

const JSONL_INPUT: &str = r#"{"features":[{"index":1,"value":1.0}],"costs":[{"action":1,"cost":1.0,"probability":0.5}]}
{"features":[{"index":2,"value":1.0}]}

{"features":[{"index":1,"value":1.0}]}
{"features":[{"index":2,"value":1.0}],"costs":[{"action":2,"cost":0.0,"probability":0.5}]}

{"features":[{"index":1,"value":1.0}],"costs":[{"action":1,"cost":1.0,"probability":0.5}]}
{"features":[{"index":2,"value":1.0}],"costs":[{"action":2,"cost":0.0,"probability":0.5}]}

"#;

#[test]
fn test_driver_runs_json_lines() {
    let out = SharedBuffer::default();
    let mut reduction = CbAdf::new(quiet_config(256), OnlineRegressor::new(8, 0.1))
        .unwrap()
        .with_sinks(OutputSinks::new().with_final_prediction(Box::new(out.clone())));

    let stats = driver::run(
        &mut reduction,
        JSONL_INPUT.as_bytes(),
        Operation::Learn,
        Some("driver test".to_string()),
    )
    .unwrap();

    assert_eq!(stats.total_lines, 9);
    assert_eq!(stats.total_decisions, 2);
    assert_eq!(stats.rejected_decisions, 1);
    assert_eq!(stats.total_features, 4);

    let output = out.contents();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines.iter().filter(|l| l.is_empty()).count(), 2);
    assert!(reduction.arena().is_empty());
}

#[test]
fn test_driver_rejects_malformed_input() {
    let mut reduction = CbAdf::new(quiet_config(256), OnlineRegressor::new(8, 0.1)).unwrap();
    let result = driver::run(
        &mut reduction,
        "{\"features\": oops}\n".as_bytes(),
        Operation::Learn,
        None,
    );
    assert!(result.is_err());
}

#[test]
fn test_drive_counts_lines() {
    let mut reduction = CbAdf::new(quiet_config(256), ScriptedLearner::choosing(1)).unwrap();
    let mut stats = RunStats::new(EstimatorMode::Ips, None);
    driver::drive(
        &mut reduction,
        vec![candidate(1), candidate(2), Action::newline(), candidate(3)],
        Operation::Learn,
        &mut stats,
    );
    assert_eq!(stats.total_lines, 4);
    assert_eq!(stats.rejected_decisions, 0);
    assert_eq!(reduction.shared_data().example_number, 1);
    // The unterminated trailing line stays buffered until teardown.
    assert_eq!(reduction.batch().len(), 1);
    let sd = reduction.finish();
    assert_eq!(sd.example_number, 1);
}
