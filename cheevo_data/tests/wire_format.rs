use cheevo_data::{
    Field, FieldKind, FieldSize, Requirement, RequirementOperator, RequirementType, Trigger, ValueExpression, optimize,
};

#[test]
fn published_triggers_round_trip_unchanged() {
    let samples = [
        "0xH001234=5",
        "R:0xH001234=0_P:d0x 002000>=100_0xX000010!=d0xX000010.3.",
        "I:0x 002222_0xH001234=5",
        "A:0xH000001*2_B:0xH000002/3_0=10",
        "K:0xH000001*3_A:{recall}_0xH000003>20",
        "C:0xH000001=1.2._D:0xH000002=1_0=1.10.",
        "N:0xM000010=1_O:0xT000010=1_Z:b0xH000020=5_0xU000030<7.4.",
        "0xH000010=1S0xH000011=1S0xH000012=1.5.",
        "M:0xH000010=1.100._Q:0xH000020=3_G:0xH000021=4_T:0xK000022>2",
        "A:fF000040*f1.5_0=f2.0",
        "~0xW000123>=p0xG000456",
    ];
    for sample in samples {
        let trigger: Trigger = sample.parse().unwrap_or_else(|err| panic!("{sample}: {err}"));
        assert_eq!(trigger.to_string(), sample);
    }
}

#[test]
fn legacy_forms_normalise() {
    let trigger: Trigger = "0x1234=h10_0xh12>=3(2)".parse().expect("parse");
    assert_eq!(trigger.to_string(), "0x 001234=16_0xH000012>=3.2.");
}

#[test]
fn parsed_requirements_expose_their_parts() {
    let req: Requirement = "R:d0xX001234<=4294967295.7.".parse().expect("parse");
    assert_eq!(req.kind, RequirementType::ResetIf);
    assert_eq!(req.left.kind, FieldKind::Previous);
    assert_eq!(req.left.size, FieldSize::DWord);
    assert_eq!(req.operator, RequirementOperator::LessThanOrEqual);
    assert_eq!(req.right, Field::value(u32::MAX));
    assert_eq!(req.hit_count, 7);
}

#[test]
fn optimized_alts_serialize_in_order() {
    let mut trigger: Trigger = "0xH000001=1S0xH000002=2_0xH000009=9S0xH000003=3_0xH000009=9"
        .parse()
        .expect("parse");
    let mut groups = std::mem::take(&mut trigger).into_groups();
    optimize(&mut groups, false).expect("optimize");
    let trigger = Trigger::from_groups(groups);
    assert_eq!(trigger.to_string(), "0xH000001=1_0xH000009=9S0xH000002=2S0xH000003=3");
}

#[test]
fn value_groups_parse_independently() {
    let value: ValueExpression = "A:0xH000001_M:0xH000002$M:0x 000003".parse().expect("parse");
    assert_eq!(value.values.len(), 2);
    assert_eq!(value.values[0][0].kind, RequirementType::AddSource);
    assert!("M:0xH000002$".parse::<ValueExpression>().map(|v| v.values[1].is_empty()).unwrap_or(false));
}
