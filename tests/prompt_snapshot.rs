use riddle_solver::solver::{UNSOLVABLE_TOKEN, render_system_prompt};

#[test]
fn system_prompt_snapshot() {
    let prompt = render_system_prompt().unwrap();
    assert!(prompt.contains(UNSOLVABLE_TOKEN));
    insta::assert_snapshot!(prompt);
}
