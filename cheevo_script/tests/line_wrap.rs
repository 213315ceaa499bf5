use cheevo_script::{PrintOptions, compile_trigger_expression, decompile};

const LONG: &str = "byte(0x10) == 1 && byte(0x11) == 2 && byte(0x12) == 3 && byte(0x13) == 4 && \
                    never(repeated(3, byte(0x20) == 1 && byte(0x21) == 2))";

fn narrow(width: usize) -> PrintOptions {
    PrintOptions {
        width,
        ..PrintOptions::default()
    }
}

#[test]
fn wrapped_lines_fit_the_width() {
    let trigger = compile_trigger_expression(LONG).expect("compiles");
    let text = decompile(&trigger, &narrow(50));
    assert!(text.lines().count() > 1);
    for line in text.lines() {
        assert!(line.len() <= 50, "line too long: {line:?}\n{text}");
    }
}

#[test]
fn wrapped_text_still_compiles() {
    let trigger = compile_trigger_expression(LONG).expect("compiles");
    let text = decompile(&trigger, &narrow(50));
    assert_eq!(compile_trigger_expression(&text).expect("recompiles"), trigger);
}

#[test]
fn wide_settings_keep_one_line() {
    let trigger = compile_trigger_expression(LONG).expect("compiles");
    let text = decompile(&trigger, &narrow(400));
    assert_eq!(text.lines().count(), 1);
}
