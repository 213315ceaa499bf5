use cheevo_script::{PrintOptions, compile_trigger_expression, compile_value_expression, decompile, decompile_value};

fn reprint(source: &str) -> String {
    let trigger = compile_trigger_expression(source).expect("compiles");
    decompile(&trigger, &PrintOptions::default())
}

#[test]
fn canonical_sources_print_back_unchanged() {
    for source in [
        "tally(3, once(byte(0x000001) == 1), byte(0x000002) == 2)",
        "tally(4, byte(0x000001) == 1, deduct(byte(0x000002) == 2))",
        "once(byte(0x000010) == 1) && never(byte(0x000011) == 0)",
        "disable_when(byte(0x000001) == 1, until=byte(0x000002) == 1)",
        "measured(repeated(10, byte(0x000001) == 1), when=byte(0x000002) == 1)",
        "byte(word(0x002222) + 0x000010) > 3",
    ] {
        assert_eq!(reprint(source), source);
    }
}

#[test]
fn decompiled_text_compiles_to_the_same_trigger() {
    for source in [
        "(byte(0x1) == 1 || byte(0x2) == 2) && byte(0x3) == 3",
        "repeated(5, byte(0x10) == 1 && never(byte(0x11) == 0))",
        "byte(0x1) - byte(0x2) > 5",
        "(byte(0x1) + byte(0x2)) / 2 > 10",
        "trigger_when(byte(0x1) == 1) && byte(0x2) == 2",
        "unless(prev(byte(0x1)) > byte(0x1))",
        "never(repeated(3, byte(0x20) == 1 && byte(0x21) == 2))",
    ] {
        let trigger = compile_trigger_expression(source).expect("compiles");
        let text = decompile(&trigger, &PrintOptions::default());
        let again = compile_trigger_expression(&text).unwrap_or_else(|err| panic!("{text}: {err}"));
        assert_eq!(again, trigger, "{source} printed as {text}");
    }
}

#[test]
fn values_round_trip() {
    let value = compile_value_expression("byte(0x10) * 10 + byte(0x11)").expect("compiles");
    let text = decompile_value(&value, &PrintOptions::default());
    assert_eq!(text, "byte(0x000010) * 10 + byte(0x000011)");
    assert_eq!(compile_value_expression(&text).expect("recompiles"), value);
}

#[test]
fn serialized_triggers_decompile() {
    let trigger = "0xH000001=1.1._R:0xH000002=0".parse().expect("parses");
    assert_eq!(
        decompile(&trigger, &PrintOptions::default()),
        "once(byte(0x000001) == 1) && never(byte(0x000002) == 0)"
    );
}

#[test]
fn disable_when_over_a_tally_round_trips() {
    let source = "disable_when(tally(3, byte(0x000001) == 1, byte(0x000002) == 2), until=byte(0x000003) == 1)";
    let trigger = compile_trigger_expression(source).expect("compiles");
    assert_eq!(trigger.to_string(), "Z:0xH000003=1_C:0xH000001=1_P:0xH000002=2.3.");
    assert_eq!(decompile(&trigger, &PrintOptions::default()), source);
}
