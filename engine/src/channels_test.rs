use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::behavior::Behavior;
use crate::lifecycle::{ConvertOptions, Finalize};
use crate::observers::Hook;
use crate::registry::ComponentDefinition;
use crate::test_helpers::*;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

fn seq(list: &[&str]) -> Vec<Channel> {
    list.iter().map(|s| Channel::named(*s)).collect()
}

/// `mixer`: broadcasts a, b, c (a and c default); listens on x (default) and y.
fn mixer(changes: &Rc<RefCell<Vec<String>>>) -> ComponentDefinition {
    let changes = Rc::clone(changes);
    ComponentDefinition::new("mixer").constructor(move |engine: &mut Engine, finalize: Finalize| {
        let on_broadcast = Rc::clone(&changes);
        let on_subscription = Rc::clone(&changes);
        let behavior = Behavior::new()
            .broadcast("a")
            .broadcast("b")
            .broadcast("c")
            .default_broadcast("a")
            .default_broadcast("c")
            .listener("x", |_, _, _| Ok(()))
            .listener("y", |_, _, _| Ok(()))
            .default_listener("x")
            .on_broadcast_channel_changed(move |_, _, channel, name| {
                on_broadcast.borrow_mut().push(format!("broadcast {name}={channel}"));
            })
            .on_subscription_channel_changed(move |_, _, channel, name| {
                on_subscription.borrow_mut().push(format!("listen {name}={channel}"));
            });
        engine.setup(finalize.instance(), behavior)
    })
}

fn converted_mixer(markup: &str, channels: &[&str], options: ConvertOptions) -> (Engine, NodeId, Rc<RefCell<Vec<String>>>) {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine_with(markup, channels);
    engine.register_component(mixer(&changes));
    let node = first(&engine, "mixer");
    engine.instantiate(node, options).expect("convert");
    (engine, node, changes)
}

// =============================================================
// Allocation
// =============================================================

#[test]
fn default_broadcasts_cycle_through_sequence() {
    let got = default_broadcast_channels(&names(&["a", "b", "c"]), &names(&["a", "b", "c"]), &seq(&["blue", "red"]));
    assert_eq!(got, vec![
        ("a".to_owned(), Channel::named("blue")),
        ("b".to_owned(), Channel::named("red")),
        ("c".to_owned(), Channel::named("blue")),
    ]);
}

#[test]
fn non_default_broadcasts_get_sentinel_and_do_not_consume() {
    let got = default_broadcast_channels(&names(&["a", "b", "c"]), &names(&["a", "c"]), &seq(&["blue", "red"]));
    assert_eq!(got, vec![
        ("a".to_owned(), Channel::named("blue")),
        ("b".to_owned(), Channel::Empty),
        ("c".to_owned(), Channel::named("red")),
    ]);
}

#[test]
fn empty_sequence_yields_sentinels() {
    let got = default_broadcast_channels(&names(&["a"]), &names(&["a"]), &[]);
    assert_eq!(got, vec![("a".to_owned(), Channel::Empty)]);
    let got = default_listener_channels(&["x"], Some("x"), &[]);
    assert_eq!(got, vec![("x".to_owned(), Channel::Empty)]);
}

#[test]
fn default_listener_takes_first_channel() {
    let got = default_listener_channels(&["x", "y"], Some("y"), &seq(&["blue", "red"]));
    assert_eq!(got, vec![("x".to_owned(), Channel::Empty), ("y".to_owned(), Channel::named("blue"))]);
}

#[test]
fn channel_from_attribute_treats_empty_as_sentinel() {
    assert_eq!(Channel::from_attribute(Some("")), Channel::Empty);
    assert_eq!(Channel::from_attribute(None), Channel::Empty);
    assert_eq!(Channel::from_attribute(Some("blue")).as_str(), Some("blue"));
}

// =============================================================
// Wiring
// =============================================================

#[test]
fn fresh_instance_gets_defaults_and_only_bound_nodes() {
    let (engine, node, _) = converted_mixer("<mixer></mixer>", &["blue", "red"], ConvertOptions::defaults());
    assert_eq!(engine.broadcast_channels(node), vec![
        ("a".to_owned(), Channel::named("blue")),
        ("b".to_owned(), Channel::Empty),
        ("c".to_owned(), Channel::named("red")),
    ]);
    assert_eq!(engine.subscription_channels(node), vec![
        ("x".to_owned(), Channel::named("blue")),
        ("y".to_owned(), Channel::Empty),
    ]);
    assert_eq!(
        engine.tree().inner_markup(node),
        r#"<broadcast on="blue" from="a"></broadcast><broadcast on="red" from="c"></broadcast><listen on="blue" for="x"></listen>"#
    );
}

#[test]
fn each_instance_starts_from_the_top_of_the_sequence() {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine_with("<mixer></mixer><mixer></mixer>", &["blue", "red", "green"]);
    engine.register_component(mixer(&changes));
    let converted = engine
        .convert_container(engine.tree().root(), ConvertOptions::defaults())
        .expect("convert");
    for node in converted {
        assert_eq!(engine.broadcast_channel(node, "a"), Channel::named("blue"));
        assert_eq!(engine.broadcast_channel(node, "c"), Channel::named("red"));
    }
}

#[test]
fn replaced_sequence_applies_to_later_conversions() {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine_with("<mixer></mixer><mixer></mixer>", &["blue"]);
    engine.register_component(mixer(&changes));
    let nodes = engine.tree().select_all(engine.tree().root(), &Selector::tag("mixer"));

    engine.instantiate(nodes[0], ConvertOptions::defaults()).expect("convert first");
    engine.set_default_channels(seq(&["green", "gold"]));
    assert_eq!(engine.default_channels(), seq(&["green", "gold"]).as_slice());
    engine.instantiate(nodes[1], ConvertOptions::defaults()).expect("convert second");

    assert_eq!(engine.broadcast_channel(nodes[0], "a"), Channel::named("blue"));
    assert_eq!(engine.subscription_channel(nodes[0], "x"), Channel::named("blue"));
    assert_eq!(engine.broadcast_channel(nodes[1], "a"), Channel::named("green"));
    assert_eq!(engine.broadcast_channel(nodes[1], "c"), Channel::named("gold"));
    assert_eq!(engine.subscription_channel(nodes[1], "x"), Channel::named("green"));
}

#[test]
fn restore_reads_declaration_bindings() {
    let markup = r#"<mixer id="m"><broadcast from="b" on="green"></broadcast><listen for="y" on="red"></listen><listen for="x"></listen></mixer>"#;
    let (engine, node, _) = converted_mixer(markup, &["blue"], ConvertOptions::restore());
    assert_eq!(engine.broadcast_channels(node), vec![
        ("a".to_owned(), Channel::Empty),
        ("b".to_owned(), Channel::named("green")),
        ("c".to_owned(), Channel::Empty),
    ]);
    assert_eq!(engine.subscription_channels(node), vec![
        ("x".to_owned(), Channel::Empty),
        ("y".to_owned(), Channel::named("red")),
    ]);
    assert_eq!(engine.bus().len(), 1);
}

#[test]
fn restore_survives_template_replacement() {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let mut engine = engine_with(r#"<mixer><listen for="x" on="red"></listen></mixer>"#, &["blue"]);
    engine.register_component(mixer(&changes).template("<span>mix</span>"));
    let node = first(&engine, "mixer");
    engine.instantiate(node, ConvertOptions::restore()).expect("convert");
    assert_eq!(engine.subscription_channel(node, "x"), Channel::named("red"));
    assert_eq!(engine.tree().inner_markup(node), r#"<span>mix</span><listen on="red" for="x"></listen>"#);
}

#[test]
fn wiring_runs_channel_changed_hooks_for_every_name() {
    let (_, _, changes) = converted_mixer("<mixer></mixer>", &["blue"], ConvertOptions::defaults());
    assert_eq!(*changes.borrow(), vec![
        "broadcast a=blue",
        "broadcast b=(none)",
        "broadcast c=blue",
        "listen x=blue",
        "listen y=(none)",
    ]);
}

// =============================================================
// Rebinding
// =============================================================

#[test]
fn set_broadcast_overwrites_single_binding() {
    let (mut engine, node, _) = converted_mixer("<mixer></mixer>", &["blue"], ConvertOptions::defaults());
    engine.set_broadcast(node, "a", Channel::named("green")).expect("rebind");
    let bindings = engine
        .tree()
        .select_children(node, &Selector::tag("broadcast").with_attr("from", "a"));
    assert_eq!(bindings.len(), 1);
    assert_eq!(engine.broadcast_channel(node, "a"), Channel::named("green"));
}

#[test]
fn set_broadcast_sentinel_removes_binding() {
    let (mut engine, node, _) = converted_mixer("<mixer></mixer>", &["blue"], ConvertOptions::defaults());
    engine.set_broadcast(node, "a", Channel::Empty).expect("unbind");
    assert!(engine.tree().select_child(node, &Selector::tag("broadcast").with_attr("from", "a")).is_none());
    assert_eq!(engine.broadcast_channel(node, "a"), Channel::Empty);
}

#[test]
fn undeclared_names_are_rejected() {
    let (mut engine, node, _) = converted_mixer("<mixer></mixer>", &["blue"], ConvertOptions::defaults());
    assert!(matches!(
        engine.set_broadcast(node, "ghost", Channel::named("blue")),
        Err(EngineError::Configuration(_))
    ));
    assert!(matches!(
        engine.set_subscription(node, "ghost", Channel::named("blue")),
        Err(EngineError::Configuration(_))
    ));
}

#[test]
fn set_subscription_replaces_previous_registration() {
    let (mut engine, node, _) = converted_mixer("<mixer></mixer>", &["blue"], ConvertOptions::defaults());
    engine.set_subscription(node, "x", Channel::named("red")).expect("rebind");
    assert_eq!(engine.bus().len(), 1);
    assert!(engine.bus().subscribers("blue").is_empty());
    assert_eq!(engine.bus().subscribers("red").len(), 1);
    assert_eq!(engine.tree().select_children(node, &Selector::tag("listen")).len(), 1);
}

#[test]
fn set_subscription_sentinel_removes_binding_and_notifies() {
    let (mut engine, node, changes) = converted_mixer("<mixer></mixer>", &["blue"], ConvertOptions::defaults());
    let notified = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&notified);
    engine.register_hook(Hook::change(move || *counter.borrow_mut() += 1));

    engine.set_subscription(node, "x", Channel::Empty).expect("unsubscribe");
    assert!(engine.bus().is_empty());
    assert!(engine.tree().select_child(node, &Selector::tag("listen")).is_none());
    assert_eq!(*notified.borrow(), 1);
    assert_eq!(changes.borrow().last().map(String::as_str), Some("listen x=(none)"));
}

#[test]
fn broadcast_changes_do_not_notify_change_observers() {
    let (mut engine, node, _) = converted_mixer("<mixer></mixer>", &["blue"], ConvertOptions::defaults());
    let notified = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&notified);
    engine.register_hook(Hook::change(move || *counter.borrow_mut() += 1));
    engine.set_broadcast(node, "b", Channel::named("red")).expect("bind");
    assert_eq!(*notified.borrow(), 0);
}

#[test]
fn remove_subscription_runs_no_hooks() {
    let (mut engine, node, changes) = converted_mixer("<mixer></mixer>", &["blue"], ConvertOptions::defaults());
    let before = changes.borrow().len();
    engine.remove_subscription(node, "x").expect("remove");
    assert!(engine.bus().is_empty());
    assert_eq!(changes.borrow().len(), before);
}
