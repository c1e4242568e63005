use super::*;

fn noop(_: &mut Engine, _: NodeId, _: &Message) -> Result<(), ListenerError> {
    Ok(())
}

#[test]
fn declarations_keep_order_and_dedupe() {
    let behavior = Behavior::new().broadcast("b").broadcast("a").broadcast("b");
    assert_eq!(behavior.broadcasts(), &["b".to_owned(), "a".to_owned()]);
}

#[test]
fn valid_behavior_passes() {
    let behavior = Behavior::new()
        .broadcast("count")
        .default_broadcast("count")
        .listener("increment", noop)
        .default_listener("increment");
    behavior.validate().expect("valid");
}

#[test]
fn undeclared_default_broadcast_is_rejected() {
    let err = Behavior::new().default_broadcast("ghost").validate().expect_err("invalid");
    assert!(matches!(err, EngineError::Configuration(ref m) if m.contains("ghost")));
}

#[test]
fn undeclared_default_listener_is_rejected() {
    let err = Behavior::new().default_listener("ghost").validate().expect_err("invalid");
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[test]
fn duplicate_listener_is_rejected() {
    let err = Behavior::new()
        .listener("in", noop)
        .listener("in", noop)
        .validate()
        .expect_err("invalid");
    assert!(matches!(err, EngineError::Configuration(ref m) if m.contains("twice")));
}

#[test]
fn editable_redeclaration_replaces() {
    let behavior = Behavior::new()
        .editable("step", Editable::new().meta("label", "Step"))
        .editable("color", Editable::new())
        .editable("step", Editable::new().meta("label", "Increment"));
    assert_eq!(behavior.editable_names(), vec!["color", "step"]);
}

#[test]
fn editable_metadata_is_kept() {
    let editable = Editable::new().meta("type", "number").meta("min", 1);
    assert_eq!(editable.metadata().get("type"), Some(&Value::from("number")));
    assert_eq!(editable.metadata().get("min"), Some(&Value::from(1)));
}

#[test]
fn listener_error_displays_message() {
    assert_eq!(ListenerError::from("boom").to_string(), "boom");
}
