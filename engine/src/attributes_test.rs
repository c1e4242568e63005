use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::behavior::Editable;
use crate::lifecycle::{ConvertOptions, Finalize};
use crate::observers::Hook;
use crate::registry::ComponentDefinition;
use crate::test_helpers::*;

/// `lamp`: editable `color` (post-set records the value) and `size`.
fn lamp(events: &Rc<RefCell<Vec<String>>>) -> ComponentDefinition {
    let events = Rc::clone(events);
    ComponentDefinition::new("lamp").constructor(move |engine: &mut Engine, finalize: Finalize| {
        let events = Rc::clone(&events);
        let behavior = Behavior::new()
            .editable(
                "color",
                Editable::new().meta("type", "color").postset(move |_, _, value| {
                    events.borrow_mut().push(format!("color={}", value.unwrap_or("<removed>")));
                }),
            )
            .editable("size", Editable::new());
        engine.setup(finalize.instance(), behavior)
    })
}

fn converted_lamp(markup: &str) -> (Engine, NodeId, Rc<RefCell<Vec<String>>>) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine_with(markup, &[]);
    engine.register_component(lamp(&events));
    let node = first(&engine, "lamp");
    engine.instantiate(node, ConvertOptions::defaults()).expect("convert");
    (engine, node, events)
}

#[test]
fn shadow_starts_at_host_value() {
    let (engine, node, events) = converted_lamp(r#"<lamp color="red"></lamp>"#);
    assert_eq!(engine.editable(node, "color"), Some("red"));
    assert_eq!(engine.editable(node, "size"), None);
    assert!(events.borrow().is_empty());
}

#[test]
fn write_goes_to_host_and_shadow_follows_on_processing() {
    let (mut engine, node, events) = converted_lamp("<lamp></lamp>");
    let changes = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&changes);
    engine.register_hook(Hook::change(move || *counter.borrow_mut() += 1));

    engine.set_editable(node, "color", "blue").expect("write");
    assert_eq!(engine.tree().attribute(node, "color"), Some("blue"));
    assert_eq!(engine.editable(node, "color"), None);

    assert_eq!(engine.process_mutations(), 1);
    assert_eq!(engine.editable(node, "color"), Some("blue"));
    assert_eq!(*events.borrow(), vec!["color=blue"]);
    assert_eq!(*changes.borrow(), 1);
}

#[test]
fn external_writes_are_observed() {
    let (mut engine, node, events) = converted_lamp("<lamp></lamp>");
    engine.tree_mut().set_attribute(node, "COLOR", "green").expect("write");
    engine.tree_mut().set_attribute(node, "title", "ignored").expect("write");
    assert_eq!(engine.process_mutations(), 1);
    assert_eq!(engine.editable(node, "color"), Some("green"));
    assert_eq!(*events.borrow(), vec!["color=green"]);
}

#[test]
fn removal_clears_shadow() {
    let (mut engine, node, events) = converted_lamp(r#"<lamp color="red"></lamp>"#);
    assert!(engine.tree_mut().remove_attribute(node, "color"));
    engine.process_mutations();
    assert_eq!(engine.editable(node, "color"), None);
    assert_eq!(*events.borrow(), vec!["color=<removed>"]);
}

#[test]
fn each_change_is_delivered_in_order() {
    let (mut engine, node, events) = converted_lamp("<lamp></lamp>");
    engine.set_editable(node, "color", "red").expect("write");
    engine.set_editable(node, "color", "blue").expect("write");
    assert_eq!(engine.process_mutations(), 2);
    // Each record reads the host value at processing time.
    assert_eq!(*events.borrow(), vec!["color=blue", "color=blue"]);
}

#[test]
fn postset_writes_are_drained_too() {
    let mut engine = engine_with("<mirror></mirror>", &[]);
    engine.register_component(ComponentDefinition::new("mirror").constructor(
        |engine: &mut Engine, finalize: Finalize| {
            let behavior = Behavior::new()
                .editable(
                    "source",
                    Editable::new().postset(|engine, node, value| {
                        if let Some(value) = value {
                            engine.set_editable(node, "copy", value).expect("copy is editable");
                        }
                    }),
                )
                .editable("copy", Editable::new());
            engine.setup(finalize.instance(), behavior)
        },
    ));
    let node = first(&engine, "mirror");
    engine.instantiate(node, ConvertOptions::defaults()).expect("convert");

    engine.set_editable(node, "source", "x").expect("write");
    assert_eq!(engine.process_mutations(), 2);
    assert_eq!(engine.editable(node, "copy"), Some("x"));
}

#[test]
fn non_editable_write_is_rejected() {
    let (mut engine, node, _) = converted_lamp("<lamp></lamp>");
    let err = engine.set_editable(node, "title", "x").expect_err("not editable");
    assert!(matches!(err, EngineError::Configuration(_)));
    assert_eq!(engine.tree().attribute(node, "title"), None);
}

#[test]
fn unloaded_instance_stops_observing() {
    let (mut engine, node, events) = converted_lamp("<lamp></lamp>");
    engine.unload(node).expect("unload");
    engine.tree_mut().set_attribute(node, "color", "red").expect("write");
    assert_eq!(engine.process_mutations(), 0);
    assert!(events.borrow().is_empty());
}

#[test]
fn describe_lists_editable_values() {
    let (mut engine, node, _) = converted_lamp(r#"<lamp size="3"></lamp>"#);
    engine.set_editable(node, "color", "red").expect("write");
    engine.process_mutations();
    let description = engine.describe(node).expect("instance");
    assert_eq!(description.tag, "lamp");
    assert_eq!(description.id.as_deref(), Some("lamp-1"));
    assert_eq!(description.editable, vec![
        ("color".to_owned(), Some("red".to_owned())),
        ("size".to_owned(), Some("3".to_owned())),
    ]);
    assert_eq!(description.attributes.editable_attributes, vec!["color", "size"]);
}
