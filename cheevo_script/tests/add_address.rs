use cheevo_data::RequirementType;
use cheevo_script::compile_trigger_expression;

#[test]
fn shared_pointer_chain_is_emitted_once() {
    let trigger = compile_trigger_expression("byte(word(0x2222) + 0x1234) == byte(word(0x2222) + 0x1235)")
        .expect("compiles");
    assert_eq!(trigger.to_string(), "I:0x 002222_0xH001234=0xH001235");
}

#[test]
fn pointer_and_plain_read_are_separated() {
    let trigger = compile_trigger_expression("byte(word(0x2222) + 0x1234) == byte(0x10)").expect("compiles");
    assert_eq!(trigger.to_string(), "I:0x 002222_B:0xH001234_0xH000010=0");
}

#[test]
fn distinct_pointers_each_get_a_chain() {
    let trigger = compile_trigger_expression("byte(word(0x2222) + 0x10) == byte(word(0x3333) + 0x10)")
        .expect("compiles");
    let add_address = trigger
        .core
        .iter()
        .filter(|req| req.kind == RequirementType::AddAddress)
        .count();
    assert_eq!(add_address, 2);
    let last = trigger.core.last().expect("terminator");
    assert!(last.is_comparison());
    assert!(!last.right.is_memory_reference(), "{trigger}");
}

#[test]
fn pointer_reads_keep_their_modifiers() {
    let trigger =
        compile_trigger_expression("prev(byte(word(0x2222) + 0x10)) < byte(word(0x2222) + 0x10)").expect("compiles");
    let serialized = trigger.to_string();
    assert!(serialized.starts_with("I:0x 002222_"), "{serialized}");
    assert!(serialized.contains("d0xH000010"), "{serialized}");
}

#[test]
fn each_pointer_comparison_carries_one_indirection() {
    let trigger =
        compile_trigger_expression("byte(0x1234 + word(0x2222)) == 5 && byte(0x1234 + word(0x2222)) == 7").expect("compiles");
    assert_eq!(trigger.to_string(), "I:0x 002222_0xH001234=5_I:0x 002222_0xH001234=7");
    for clause in trigger.core.chunks(2) {
        assert_eq!(clause[0].kind, RequirementType::AddAddress);
        assert!(clause[1].is_comparison());
    }
}
