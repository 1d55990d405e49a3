use lck_conformance::{KernelOutputs, VerifyError, verify, verify_builtin};
use lck_lanes::{InputTuple, NamedArg, VectorWidth};
use lck_reference::{FunctionCatalog, MathFunction};
use lck_tolerance::{BoundKind, PrecisionMode, ToleranceSpec, ToleranceTable};
use proptest::prelude::*;

fn unary(values: Vec<f32>) -> InputTuple {
    InputTuple::new(vec![NamedArg::lanes("v", values)])
}

fn tuple_for(function: MathFunction, lanes: &[f32]) -> InputTuple {
    InputTuple::new(
        function
            .roles()
            .iter()
            .map(|role| NamedArg::lanes(*role, lanes.to_vec()))
            .collect(),
    )
}

#[test]
fn copysign_scenario_reports_each_candidate() {
    let rows = vec![
        InputTuple::new(vec![
            NamedArg::lanes("magnitude_value", vec![3.5]),
            NamedArg::lanes("sign_value", vec![-1.0]),
        ]);
        3
    ];
    let outputs = KernelOutputs::single(
        PrecisionMode::Full,
        vec![vec![-3.5], vec![3.5], vec![f32::NAN]],
    );
    let report = verify_builtin("copysign", &rows, VectorWidth::One, &outputs)
        .expect("valid setup");
    let verdicts: Vec<bool> = report.outcomes.iter().map(|outcome| outcome.passed()).collect();
    assert_eq!(verdicts, vec![true, false, false]);

    let diagnostic = report.outcomes[1]
        .verdict
        .diagnostic
        .as_deref()
        .expect("failing lane carries a diagnostic");
    assert!(diagnostic.contains("copysign"), "{diagnostic}");
    assert!(diagnostic.contains("{c0600000}"), "{diagnostic}");
    assert!(diagnostic.contains("-0x1.cp1"), "{diagnostic}");
}

#[test]
fn padding_lane_corruption_never_changes_the_report() {
    let rows = vec![unary(vec![1.0, 4.0, 9.0, 0.0])];
    let clean = KernelOutputs::single(PrecisionMode::Full, vec![vec![1.0, 2.0, 3.0, 0.0]]);
    let baseline = verify_builtin("sqrt", &rows, VectorWidth::Three, &clean).expect("valid setup");
    assert!(baseline.all_passed());

    for garbage in [f32::NAN, f32::INFINITY, f32::MIN, f32::from_bits(0xffff_ffff)] {
        let dirty = KernelOutputs::single(
            PrecisionMode::Full,
            vec![vec![1.0, 2.0, 3.0, garbage]],
        );
        let report =
            verify_builtin("sqrt", &rows, VectorWidth::Three, &dirty).expect("valid setup");
        assert_eq!(report.digest(), baseline.digest());
    }
}

#[test]
fn missing_tolerance_entry_is_a_setup_failure() {
    let mut table = ToleranceTable::builtin();
    table.remove("sin");
    let catalog = FunctionCatalog::with_tolerances(table);
    let outputs = KernelOutputs::single(PrecisionMode::Full, vec![vec![0.0]]);
    let err = verify(&catalog, "sin", &[unary(vec![0.0])], VectorWidth::One, &outputs)
        .expect_err("no entry for sin");
    assert_eq!(err.reason_code(), "tolerance_entry_missing");
    assert!(matches!(err, VerifyError::Catalog(_)));
}

#[test]
fn custom_tolerance_tiers_drive_the_verdict() {
    let mut table = ToleranceTable::builtin();
    table.insert(
        "sqrt",
        ToleranceSpec::new(BoundKind::UlpBound(0), Some(BoundKind::UlpBound(2)))
            .expect("relaxed is looser"),
    );
    let catalog = FunctionCatalog::with_tolerances(table);
    let two_up = f32::from_bits(2.0_f32.to_bits() + 2);
    let outputs = KernelOutputs::new()
        .with(PrecisionMode::Full, vec![vec![two_up]])
        .with(PrecisionMode::Relaxed, vec![vec![two_up]]);
    let report = verify(&catalog, "sqrt", &[unary(vec![4.0])], VectorWidth::One, &outputs)
        .expect("valid setup");
    assert!(!report.outcomes_for(PrecisionMode::Full)[0].passed());
    assert!(report.outcomes_for(PrecisionMode::Relaxed)[0].passed());
}

#[test]
fn verification_is_callable_from_many_threads() {
    let rows: Vec<InputTuple> = (1..=64_u16)
        .map(|step| unary(vec![f32::from(step) * 0.125; 4]))
        .collect();
    let outputs = KernelOutputs::single(
        PrecisionMode::Full,
        rows.iter()
            .map(|row| {
                let v = row.lane(0)[0];
                vec![v.sin(); 4]
            })
            .collect(),
    );
    let expected = verify_builtin("sin", &rows, VectorWidth::Four, &outputs)
        .expect("valid setup")
        .digest();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| verify_builtin("sin", &rows, VectorWidth::Four, &outputs)))
            .collect();
        for handle in handles {
            let report = handle.join().expect("thread").expect("valid setup");
            assert_eq!(report.digest(), expected);
        }
    });
}

fn any_f32() -> impl Strategy<Value = f32> {
    any::<u32>().prop_map(f32::from_bits)
}

proptest! {
    #[test]
    fn nan_inputs_accept_every_output(
        index in 0..MathFunction::ALL.len(),
        candidate in any_f32(),
        width_lanes in 1_usize..=4,
    ) {
        let function = MathFunction::ALL[index];
        let width = VectorWidth::from_lanes(width_lanes).expect("1..=4");
        let lanes = vec![f32::NAN; width.stride()];
        let rows = vec![tuple_for(function, &lanes)];
        let outputs = KernelOutputs::new()
            .with(PrecisionMode::Full, vec![vec![candidate; width.stride()]])
            .with(PrecisionMode::Relaxed, vec![vec![candidate; width.stride()]]);
        let report = verify_builtin(function.name(), &rows, width, &outputs)
            .expect("valid setup");
        // Functions that ignore a NaN operand still produce a number.
        if report.outcomes.iter().all(|outcome| outcome.verdict.reference_value.is_nan()) {
            prop_assert!(report.all_passed());
        }
        prop_assert_eq!(report.total_lanes, 2 * width.lanes());
    }

    #[test]
    fn identical_inputs_give_identical_digests(
        inputs in proptest::collection::vec(any_f32(), 4),
        outputs in proptest::collection::vec(any_f32(), 4),
    ) {
        let rows = vec![
            InputTuple::new(vec![
                NamedArg::lanes("numerator", inputs.clone()),
                NamedArg::splat("denominator", 3.0),
            ]);
            2
        ];
        let kernel = KernelOutputs::new()
            .with(PrecisionMode::Full, vec![outputs.clone(); 2])
            .with(PrecisionMode::Relaxed, vec![outputs; 2]);
        let first =
            verify_builtin("atan2", &rows, VectorWidth::Four, &kernel).expect("valid setup");
        let second =
            verify_builtin("atan2", &rows, VectorWidth::Four, &kernel).expect("valid setup");
        prop_assert_eq!(first.digest(), second.digest());
        prop_assert_eq!(first.failed_lanes, second.failed_lanes);
        prop_assert!(first
            .outcomes
            .iter()
            .zip(&second.outcomes)
            .all(|(lhs, rhs)| lhs.verdict.same_as(&rhs.verdict)));
    }

    #[test]
    fn relaxed_never_rejects_what_full_accepts(
        index in 0..MathFunction::ALL.len(),
        x in any_f32(),
        candidate in any_f32(),
    ) {
        let function = MathFunction::ALL[index];
        let rows = vec![tuple_for(function, &[x])];
        let outputs = KernelOutputs::new()
            .with(PrecisionMode::Full, vec![vec![candidate]])
            .with(PrecisionMode::Relaxed, vec![vec![candidate]]);
        let report = verify_builtin(function.name(), &rows, VectorWidth::One, &outputs)
            .expect("valid setup");
        let full = report.outcomes_for(PrecisionMode::Full)[0].passed();
        let relaxed = report.outcomes_for(PrecisionMode::Relaxed)[0].passed();
        prop_assert!(!full || relaxed, "{} x={x:e} candidate={candidate:e}", function);
    }
}
