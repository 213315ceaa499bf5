use cheevo_script::{ScriptError, compile_script};

fn points_of(source: &str) -> u32 {
    let output = compile_script(source).expect("script runs");
    output.achievements.first().expect("one achievement").points
}

#[test]
fn named_functions_do_not_see_caller_locals() {
    let source = r#"
function read_secret() { return secret }
function outer() {
    secret = 7
    return read_secret()
}
achievement("t", "d", outer(), byte(0x1) == 1)
"#;
    match compile_script(source) {
        Err(ScriptError::Eval(err)) => assert!(err.root_cause().message.contains("secret"), "{err}"),
        other => panic!("expected an evaluation error, got {other:?}"),
    }
}

#[test]
fn lambdas_capture_caller_locals() {
    let source = r#"
function outer() {
    secret = 7
    reader = () => secret
    return reader()
}
achievement("t", "d", outer(), byte(0x1) == 1)
"#;
    assert_eq!(points_of(source), 7);
}

#[test]
fn named_functions_see_globals_and_parameters() {
    let source = r#"
bonus = 3
function score(base) { return base + bonus }
achievement("t", "d", score(2), byte(0x1) == 1)
"#;
    assert_eq!(points_of(source), 5);
}

#[test]
fn loop_variables_stay_inside_the_loop() {
    let source = r#"
for i in range(1, 3) {
    last = i
}
achievement("t", "d", i, byte(0x1) == 1)
"#;
    assert!(matches!(compile_script(source), Err(ScriptError::Eval(_))));
}

#[test]
fn lambdas_read_their_defining_scope_not_the_caller() {
    let source = r#"
y = 1
reader = () => y
function call_it(h, y) { return h() }
achievement("t", "d", call_it(reader, 5), byte(0x1) == 1)
"#;
    assert_eq!(points_of(source), 1);
}

#[test]
fn lambdas_passed_to_a_function_keep_their_captures() {
    let source = r#"
function apply(h) {
    local = 100
    return h()
}
function outer() {
    local = 4
    return apply(() => local)
}
achievement("t", "d", outer(), byte(0x1) == 1)
"#;
    assert_eq!(points_of(source), 4);
}
