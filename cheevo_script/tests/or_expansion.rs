use cheevo_script::{CompileError, ScriptError, Trigger, compile_trigger_expression};

fn disjunction(list: u32, size: u32, wrap: impl Fn(String) -> String) -> String {
    let parts: Vec<String> = (0..size)
        .map(|i| wrap(format!("byte(0x{:x}) == 1", list * 16 + i)))
        .collect();
    format!("({})", parts.join(" || "))
}

fn product(lists: u32, size: u32, wrap: impl Fn(String) -> String + Copy) -> String {
    (0..lists)
        .map(|list| disjunction(list, size, wrap))
        .collect::<Vec<_>>()
        .join(" && ")
}

#[test]
fn two_or_lists_cross_multiply() {
    let trigger = compile_trigger_expression("(byte(1) == 1 || byte(2) == 2) && (byte(3) == 3 || byte(4) == 4)")
        .expect("compiles");
    assert!(trigger.core.is_empty());
    assert_eq!(trigger.alts.len(), 4);
    assert!(trigger.alts.iter().all(|alt| alt.len() == 2));
    let first = Trigger::new(trigger.alts[0].clone(), Vec::new());
    assert_eq!(first.to_string(), "0xH000001=1_0xH000003=3");
}

#[test]
fn three_by_three_yields_nine_alts() {
    let source = product(2, 3, |text| text);
    let trigger = compile_trigger_expression(&source).expect("compiles");
    assert_eq!(trigger.alts.len(), 9);
}

#[test]
fn products_over_the_limit_are_rejected() {
    let source = product(5, 7, |text| format!("once({text})"));
    match compile_trigger_expression(&source) {
        Err(ScriptError::Compile(CompileError::ExpansionLimit { projected, limit })) => {
            assert_eq!(projected, 16_807);
            assert_eq!(limit, 10_000);
        },
        other => panic!("expected an expansion error, got {other:?}"),
    }
}

#[test]
fn simple_lists_collapse_into_or_next_chains() {
    let source = product(5, 7, |text| text);
    let trigger = compile_trigger_expression(&source).expect("compiles");
    assert_eq!(trigger.alts.len(), 7);
    let serialized = trigger.to_string();
    assert!(serialized.contains("O:"), "{serialized}");
}
