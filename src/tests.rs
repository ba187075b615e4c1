//! End-to-end scenarios: templates rendered into the in-memory DOM and driven
//! through the update queue.
use crate::dom::{self, Event, Host, Node};
use crate::observation::{
    BindingFn, ChangeArgs, Subscriber, set_array_observer_factory, signal_notifier,
};
use crate::template::{Interpolation, RepeatDirective};
use crate::updates::{self, UpdateMode};
use crate::{
    BindingObserver, Error, ExecutionContext, ObservableArray, Object, Value, ViewTemplate, bind,
    define_property, enable_array_observation, html, length_of, one_time, prop, repeat,
    send_signal, signal, two_way_prop,
};
use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing_test::traced_test;

fn define_types() {
    define_property("Item", "name");
    define_property("Model", "name");
    define_property("Model", "items");
    define_property("Model", "title");
    define_property("Model", "hidden");
    define_property("Model", "kind");
    define_property("Model", "flag");
    define_property("Model", "template");
    define_property("Model", "detailed");
    define_property("Model", "fail");
    define_property("Model", "value");
    define_property("Model", "count");
}

fn item(name: &str) -> Value {
    Object::new("Item").with("name", name).into()
}

fn items(names: &[&str]) -> ObservableArray {
    ObservableArray::from_values(names.iter().map(|name| item(name)))
}

fn model() -> Object {
    define_types();
    Object::new("Model")
}

fn name_template() -> ViewTemplate {
    html(&["", ""], [prop("name")]).unwrap()
}

fn list_template(item_template: ViewTemplate) -> ViewTemplate {
    html(
        &["<div>", "</div>"],
        [Interpolation::from(repeat(prop("items"), item_template))],
    )
    .unwrap()
}

fn render(template: &ViewTemplate, source: &Object) -> (Node, crate::View) {
    let host = Node::element("section");
    let view = template
        .render(&Value::from(source.clone()), &host)
        .unwrap();
    (host, view)
}

/// Content nodes of the repeat container, one text node per rendered item.
fn item_nodes(host: &Node) -> Vec<Node> {
    let container = host.first_child().unwrap();
    container
        .children()
        .into_iter()
        .filter(|n| *n.kind() == dom::NodeKind::Text)
        .collect()
}

// === Observation and bindings ===

#[test]
fn content_binding_tracks_the_source() {
    let m = model().with("name", "world");
    let template = html(&["<p>Hello ", "!</p>"], [prop("name")]).unwrap();
    let (host, _view) = render(&template, &m);
    assert_eq!(host.text_content(), "Hello world!");

    m.set("name", "there");
    assert_eq!(host.text_content(), "Hello world!");
    updates::process();
    assert_eq!(host.text_content(), "Hello there!");
}

struct RecordingHost {
    text_writes: Cell<usize>,
}

impl Host for RecordingHost {
    fn set_text(&self, node: &Node, text: &str) {
        self.text_writes.set(self.text_writes.get() + 1);
        node.set_data(text);
    }
}

#[test]
fn bursts_of_writes_coalesce_into_one_update() {
    let recorder = Rc::new(RecordingHost {
        text_writes: Cell::new(0),
    });
    dom::set_host(recorder.clone());

    let evaluations = Rc::new(Cell::new(0));
    let counter = evaluations.clone();
    let m = model().with("name", "a");
    let template = html(
        &["<p>", "</p>"],
        [bind(move |x, _| {
            counter.set(counter.get() + 1);
            Ok(x.get("name"))
        })],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    assert_eq!((evaluations.get(), recorder.text_writes.get()), (1, 1));

    m.set("name", "b");
    m.set("name", "c");
    m.set("name", "d");
    updates::process();
    assert_eq!(host.text_content(), "d");
    assert_eq!((evaluations.get(), recorder.text_writes.get()), (2, 2));
}

#[test]
fn one_time_bindings_never_update() {
    let m = model().with("name", "first");
    let template = html(&["<p>", "</p>"], [one_time(|x, _| Ok(x.get("name")))]).unwrap();
    let (host, _view) = render(&template, &m);
    m.set("name", "second");
    updates::settle();
    assert_eq!(host.text_content(), "first");
    assert_eq!(m.notifier().subscriber_count(Some("name")), 0);
}

#[test]
fn conditional_bindings_follow_the_active_branch() {
    let m = model().with("flag", false).with("title", "T").with("name", "N");
    let template = html(
        &["<p>", "</p>"],
        [bind(|x, _| {
            Ok(if x.get("flag").truthy() {
                x.get("title")
            } else {
                x.get("name")
            })
        })],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    assert_eq!(host.text_content(), "N");

    m.set("flag", true);
    updates::process();
    assert_eq!(host.text_content(), "T");

    m.set("title", "T2");
    updates::process();
    assert_eq!(host.text_content(), "T2");
}

#[test]
fn attribute_aspects() {
    let m = model()
        .with("title", "greeting")
        .with("hidden", true)
        .with("kind", "primary");
    let template = html(
        &["<a title=", " ?hidden=", " class=\"btn ", "\"></a>"],
        [prop("title"), prop("hidden"), prop("kind")],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    let link = host.first_child().unwrap();
    assert_eq!(link.get_attribute("title").as_deref(), Some("greeting"));
    assert!(link.has_attribute("hidden"));
    assert_eq!(link.get_attribute("class").as_deref(), Some("btn primary"));

    m.set("title", Value::Null);
    m.set("hidden", false);
    m.set("kind", "secondary");
    updates::process();
    assert!(!link.has_attribute("title"));
    assert!(!link.has_attribute("hidden"));
    assert_eq!(link.get_attribute("class").as_deref(), Some("btn secondary"));
}

#[test]
fn property_aspect_sets_node_properties() {
    let m = model().with("count", 3);
    let template = html(&["<x-counter :count=", "></x-counter>"], [prop("count")]).unwrap();
    let (host, _view) = render(&template, &m);
    let counter = host.first_child().unwrap();
    assert_eq!(counter.get_property("count"), Value::from(3));
    m.set("count", 4);
    updates::process();
    assert_eq!(counter.get_property("count"), Value::from(4));
}

#[test]
fn two_way_bindings_work_in_both_directions_until_unbound() {
    let m = model().with("value", "init");
    let template = html(&["<input :value=", ">"], [two_way_prop("value")]).unwrap();
    let (host, view) = render(&template, &m);
    let input = host.first_child().unwrap();
    assert_eq!(input.get_property("value"), Value::from("init"));

    input.set_property("value", "typed".into());
    input.dispatch_event(&Event::new("change"));
    assert_eq!(m.peek("value"), Value::from("typed"));

    m.set("value", "model");
    assert_eq!(input.get_property("value"), Value::from("model"));

    view.unbind();
    m.set("value", "after");
    updates::settle();
    assert_eq!(input.get_property("value"), Value::from("model"));
    input.set_property("value", "ignored".into());
    input.dispatch_event(&Event::new("change"));
    assert_eq!(m.peek("value"), Value::from("after"));
}

#[test]
fn two_way_bindings_convert_and_choose_their_event() {
    let m = model().with("count", 1);
    let binding = two_way_prop("count")
        .change_event("input")
        .convert(|v| {
            v.as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .map_or(Value::Null, Value::from)
        });
    let template = html(&["<input :value=", ">"], [binding]).unwrap();
    let (host, _view) = render(&template, &m);
    let input = host.first_child().unwrap();

    input.set_property("value", "42".into());
    input.dispatch_event(&Event::new("change"));
    assert_eq!(m.peek("count"), Value::from(1));
    input.dispatch_event(&Event::new("input"));
    assert_eq!(m.peek("count"), Value::from(42));
}

#[test]
fn signal_bindings_wait_for_their_signal() {
    let m = model().with("name", "a");
    let template = html(&["<p>", "</p>"], [signal("refresh-names", |x, _| Ok(x.get("name")))]).unwrap();
    let (host, view) = render(&template, &m);

    m.set("name", "b");
    updates::settle();
    assert_eq!(host.text_content(), "a");

    send_signal("refresh-names");
    assert_eq!(host.text_content(), "a");
    updates::process();
    assert_eq!(host.text_content(), "b");

    view.unbind();
    assert_eq!(signal_notifier("refresh-names").subscriber_count(Some("refresh-names")), 0);
}

#[test]
fn event_bindings_see_the_event_and_control_default() {
    let m = model().with("count", 0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let template = html(
        &["<button @click=", ">go</button>"],
        [bind(move |x, c| {
            if let Some(event) = c.event() {
                log.borrow_mut().push(event.event_type().to_owned());
            }
            let count = x.get("count").as_number().unwrap_or(0.0);
            if let Some(counter) = x.as_object() {
                counter.set("count", count + 1.0);
            }
            Ok(Value::from(count >= 1.0))
        })],
    )
    .unwrap();
    let (host, view) = render(&template, &m);
    let button = host.first_child().unwrap();

    assert!(!button.dispatch_event(&Event::new("click")));
    assert!(button.dispatch_event(&Event::new("click")));
    assert_eq!(m.peek("count"), Value::from(2));
    assert_eq!(*seen.borrow(), ["click", "click"]);

    view.unbind();
    button.dispatch_event(&Event::new("click"));
    assert_eq!(m.peek("count"), Value::from(2));
    assert_eq!(button.listener_count("click"), 0);
}

#[test]
fn one_time_event_bindings_fire_once() {
    let m = model().with("count", 0);
    let template = html(
        &["<button @click=", "></button>"],
        [one_time(|x, _| {
            let count = x.get("count").as_number().unwrap_or(0.0);
            if let Some(counter) = x.as_object() {
                counter.set("count", count + 1.0);
            }
            Ok(Value::Bool(true))
        })],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    let button = host.first_child().unwrap();
    button.dispatch_event(&Event::new("click"));
    button.dispatch_event(&Event::new("click"));
    assert_eq!(m.peek("count"), Value::from(1));
}

#[test]
fn composed_views_are_reused_across_rebinds() {
    cov_mark::check!(composed_view_reused);
    let detail = html(&["<b>", "</b>"], [prop("name")]).unwrap();
    let m = model().with("detailed", false).with("name", "n");
    let template = html(
        &["<p>", "</p>"],
        [bind(move |x, _| {
            Ok(if x.get("detailed").truthy() {
                Value::Template(detail.clone())
            } else {
                x.get("name")
            })
        })],
    )
    .unwrap();
    let (host, view) = render(&template, &m);
    assert_eq!(host.to_html(), "<section><p>n</p></section>");

    m.set("detailed", true);
    updates::process();
    assert_eq!(host.to_html(), "<section><p><b>n</b></p></section>");
    let bold = host.first_child().unwrap().first_child().unwrap();

    m.set("name", "m");
    updates::process();
    assert_eq!(host.to_html(), "<section><p><b>m</b></p></section>");

    view.unbind();
    view.bind(&Value::from(m.clone()), &ExecutionContext::new()).unwrap();
    let same_bold = host.first_child().unwrap().first_child().unwrap();
    assert!(bold.ptr_eq(&same_bold));

    m.set("detailed", false);
    updates::process();
    assert_eq!(host.to_html(), "<section><p>m</p></section>");
}

#[test]
fn switching_templates_replaces_the_composed_view() {
    let first = html(&["<i>", "</i>"], [prop("name")]).unwrap();
    let second = html(&["<u>", "</u>"], [prop("name")]).unwrap();
    let m = model()
        .with("name", "x")
        .with("template", first);
    let template = html(&["<p>", "</p>"], [prop("template")]).unwrap();
    let (host, _view) = render(&template, &m);
    assert_eq!(host.to_html(), "<section><p><i>x</i></p></section>");

    m.set("template", second);
    updates::process();
    assert_eq!(host.to_html(), "<section><p><u>x</u></p></section>");
}

#[test]
fn initial_bind_errors_propagate() {
    let m = model();
    let template = html(&["<p>", "</p>"], [bind(|_, _| Err(Error::binding("boom")))]).unwrap();
    let host = Node::element("div");
    let err = template.render(&Value::from(m), &host).unwrap_err();
    assert!(matches!(err, Error::Binding(message) if message == "boom"));
}

#[test]
#[traced_test]
fn failing_updates_do_not_stop_the_flush() {
    let m = model().with("fail", false).with("name", "a");
    let template = html(
        &["<p>", "</p><span>", "</span>"],
        [
            bind(|x, _| {
                if x.get("fail").truthy() {
                    Err(Error::binding("refused"))
                } else {
                    Ok(Value::from("ok"))
                }
            }),
            prop("name"),
        ],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);

    m.set("fail", true);
    m.set("name", "b");
    let report = updates::process();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(host.text_content(), "okb");
    assert!(logs_contain("queued update failed"));
}

#[test]
fn nested_observers_keep_their_own_dependencies() {
    let m = model().with("name", "n").with("title", "t");
    let inner: BindingFn = Rc::new(|x, _| Ok(x.get("title")));
    let inner_observer = BindingObserver::new(inner, false, || Ok(()));
    let nested = inner_observer.clone();
    let outer: BindingFn = Rc::new(move |x, c| {
        let title = nested.observe(x, c)?;
        Ok(format!("{}{}", x.get("name").to_display_string(), title.to_display_string()).into())
    });
    let outer_observer = BindingObserver::new(outer, false, || Ok(()));
    let value = outer_observer
        .observe(&Value::from(m), &ExecutionContext::new())
        .unwrap();
    assert_eq!(value, Value::from("nt"));
    assert_eq!(outer_observer.dependencies().iter().map(|d| d.to_string()).collect::<Vec<_>>(), ["name"]);
    assert_eq!(inner_observer.dependencies().iter().map(|d| d.to_string()).collect::<Vec<_>>(), ["title"]);
}

#[test]
fn sync_mode_updates_immediately() {
    updates::configure().mode(UpdateMode::Sync).install();
    let m = model().with("name", "a");
    let template = html(&["<p>", "</p>"], [prop("name")]).unwrap();
    let (host, _view) = render(&template, &m);
    m.set("name", "b");
    assert_eq!(host.text_content(), "b");
    updates::configure().install();
}

struct NotificationCounter(Cell<usize>);

impl Subscriber for NotificationCounter {
    fn handle_change(&self, _args: &ChangeArgs) {
        self.0.set(self.0.get() + 1);
    }
}

proptest! {
    #[test]
    fn unchanged_writes_never_notify(writes in prop::collection::vec(0u8..4, 0..32)) {
        let m = model().with("count", 0);
        let counter = Rc::new(NotificationCounter(Cell::new(0)));
        let weak: Weak<NotificationCounter> = Rc::downgrade(&counter);
        m.notifier().subscribe(weak, Some("count"));

        let mut previous = 0u8;
        let mut expected = 0;
        for value in writes {
            if value != previous {
                expected += 1;
            }
            previous = value;
            m.set("count", i32::from(value));
        }
        prop_assert_eq!(counter.0.get(), expected);
    }
}

// === Repeat ===

#[test]
fn repeat_renders_and_applies_splices() {
    enable_array_observation();
    let list = items(&["item1", "item2"]);
    let m = model().with("items", list.clone());
    let (host, _view) = render(&list_template(name_template()), &m);
    assert_eq!(host.text_content(), "item1item2");

    list.splice(0, 1, [item("a"), item("b")]);
    updates::process();
    assert_eq!(host.text_content(), "abitem2");
}

#[test]
fn push_adds_one_trailing_view() {
    enable_array_observation();
    let list = items(&["a", "b"]);
    let m = model().with("items", list.clone());
    let (host, _view) = render(&list_template(name_template()), &m);
    let before = item_nodes(&host);

    list.push(item("c"));
    updates::process();
    let after = item_nodes(&host);
    assert_eq!(host.text_content(), "abc");
    assert_eq!(after.len(), 3);
    assert!(before.iter().zip(&after).all(|(a, b)| a.ptr_eq(b)));
}

#[test]
fn removing_one_item_keeps_every_other_view() {
    enable_array_observation();
    let list = items(&["a", "b", "c", "d"]);
    let m = model().with("items", list.clone());
    let (host, _view) = render(&list_template(name_template()), &m);
    let before = item_nodes(&host);

    list.remove(1);
    updates::process();
    let after = item_nodes(&host);
    assert_eq!(host.text_content(), "acd");
    assert!(after[0].ptr_eq(&before[0]));
    assert!(after[1].ptr_eq(&before[2]));
    assert!(after[2].ptr_eq(&before[3]));
}

#[test]
fn removed_views_are_recycled_for_inserts() {
    cov_mark::check!(repeat_view_recycled);
    enable_array_observation();
    let list = items(&["a", "b"]);
    let m = model().with("items", list.clone());
    let (host, _view) = render(&list_template(name_template()), &m);
    list.set(0, item("z"));
    updates::process();
    assert_eq!(host.text_content(), "zb");
}

#[test]
fn views_are_disposed_when_recycling_is_off() {
    enable_array_observation();
    let list = items(&["a", "b"]);
    let m = model().with("items", list.clone());
    let template = html(
        &["<div>", "</div>"],
        [Interpolation::from(
            repeat(prop("items"), name_template()).recycle(false),
        )],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    let before = item_nodes(&host);
    list.set(0, item("z"));
    updates::process();
    let after = item_nodes(&host);
    assert_eq!(host.text_content(), "zb");
    assert!(!after[0].ptr_eq(&before[0]));
    assert!(after[1].ptr_eq(&before[1]));
}

#[test]
fn empty_replacement_clears_and_restores() {
    enable_array_observation();
    let list = items(&["item1", "item2"]);
    let m = model().with("items", list.clone());
    let (host, _view) = render(&list_template(name_template()), &m);

    m.set("items", ObservableArray::new());
    updates::process();
    assert_eq!(host.text_content(), "");
    assert_eq!(host.first_child().unwrap().child_count(), 1);

    m.set("items", list.clone());
    updates::process();
    assert_eq!(host.text_content(), "item1item2");

    list.push(item("item3"));
    updates::process();
    assert_eq!(host.text_content(), "item1item2item3");
}

#[test]
fn replaced_arrays_stop_driving_the_view() {
    enable_array_observation();
    let old = items(&["a"]);
    let m = model().with("items", old.clone());
    let (host, _view) = render(&list_template(name_template()), &m);
    m.set("items", items(&["x", "y"]));
    updates::process();
    old.push(item("b"));
    updates::process();
    assert_eq!(host.text_content(), "xy");
}

#[test]
fn rebinding_reflects_mutations_made_while_unbound() {
    enable_array_observation();
    let list = items(&["a", "b"]);
    let m = model().with("items", list.clone());
    let (host, view) = render(&list_template(name_template()), &m);

    view.unbind();
    list.push(item("c"));
    list.remove(0);
    updates::process();
    assert_eq!(host.text_content(), "ab");

    view.bind(&Value::from(m.clone()), &ExecutionContext::new()).unwrap();
    assert_eq!(host.text_content(), "bc");
    updates::process();
    assert_eq!(host.text_content(), "bc");

    list.unshift(item("z"));
    updates::process();
    assert_eq!(host.text_content(), "zbc");
}

#[test]
fn positioning_keeps_item_contexts_current() {
    enable_array_observation();
    let list = items(&["a", "b"]);
    let m = model().with("items", list.clone());
    let item_template = html(
        &["", ""],
        [bind(|x, c| {
            Ok(format!("{}{}{};", c.index(), x.get("name").to_display_string(), if c.is_last() { "!" } else { "" }).into())
        })],
    )
    .unwrap();
    let template = html(
        &["<ol>", "</ol>"],
        [Interpolation::from(
            RepeatDirective::new(prop("items"), crate::template::Binding::new({
                let t = Value::Template(item_template);
                move |_, _| Ok(t.clone())
            }))
            .positioning(true),
        )],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    assert_eq!(host.text_content(), "0a;1b!;");

    list.unshift(item("z"));
    updates::settle();
    assert_eq!(host.text_content(), "0z;1a;2b!;");
}

#[test]
fn template_changes_rerender_every_item() {
    enable_array_observation();
    let plain = name_template();
    let bracketed = html(&["[", "]"], [prop("name")]).unwrap();
    let list = items(&["a", "b"]);
    let m = model().with("items", list).with("template", plain);
    let template = html(
        &["<div>", "</div>"],
        [Interpolation::from(RepeatDirective::new(prop("items"), prop("template")))],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    assert_eq!(host.text_content(), "ab");

    m.set("template", bracketed);
    updates::process();
    assert_eq!(host.text_content(), "[a][b]");
}

fn switchable_list(recycle: bool) -> ViewTemplate {
    html(
        &["<div>", "</div>"],
        [Interpolation::from(
            RepeatDirective::new(
                bind(|x, _| {
                    let _ = x.get("kind");
                    Ok(x.get("items"))
                }),
                prop("template"),
            )
            .recycle(recycle),
        )],
    )
    .unwrap()
}

#[test]
fn template_change_and_push_in_one_flush_render_each_item_once() {
    enable_array_observation();
    let plain = name_template();
    let bracketed = html(&["[", "]"], [prop("name")]).unwrap();

    let list = items(&["a", "b"]);
    let m = model().with("items", list.clone()).with("template", plain.clone());
    let (host, _view) = render(&switchable_list(true), &m);
    m.set("template", bracketed.clone());
    list.push(item("c"));
    updates::settle();
    assert_eq!(host.text_content(), "[a][b][c]");

    let list = items(&["a", "b"]);
    let m = model().with("items", list.clone()).with("template", plain);
    let (host, _view) = render(&switchable_list(true), &m);
    list.push(item("c"));
    m.set("template", bracketed);
    updates::settle();
    assert_eq!(host.text_content(), "[a][b][c]");
}

#[test]
fn refreshing_the_same_array_does_not_replay_its_splices() {
    enable_array_observation();
    let list = items(&["a", "b"]);
    let m = model()
        .with("items", list.clone())
        .with("template", name_template())
        .with("kind", 0_i32);
    let (host, _view) = render(&switchable_list(true), &m);

    m.set("kind", 1_i32);
    list.push(item("c"));
    list.remove(0);
    updates::settle();
    assert_eq!(host.text_content(), "bc");
    assert_eq!(item_nodes(&host).len(), 2);
}

#[test]
fn unchanged_template_keeps_existing_views() {
    enable_array_observation();
    let plain = name_template();
    let list = items(&["a", "b"]);
    let m = model().with("items", list).with("kind", 0_i32);
    let template = html(
        &["<div>", "</div>"],
        [Interpolation::from(
            RepeatDirective::new(prop("items"), {
                let plain = Value::Template(plain);
                bind(move |x, _| {
                    let _ = x.get("kind");
                    Ok(plain.clone())
                })
            })
            .recycle(false),
        )],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    let before = item_nodes(&host);

    m.set("kind", 1_i32);
    updates::settle();
    let after = item_nodes(&host);
    assert_eq!(host.text_content(), "ab");
    assert!(before.iter().zip(&after).all(|(a, b)| a.ptr_eq(b)));
}

#[derive(Clone, Debug)]
enum ListEdit {
    Push(u8),
    Insert(usize, u8),
    Remove(usize),
    Replace(usize, u8),
    SwitchTemplate,
    Touch,
    Flush,
}

fn list_edit() -> impl Strategy<Value = ListEdit> {
    prop_oneof![
        any::<u8>().prop_map(ListEdit::Push),
        (any::<usize>(), any::<u8>()).prop_map(|(at, v)| ListEdit::Insert(at, v)),
        any::<usize>().prop_map(ListEdit::Remove),
        (any::<usize>(), any::<u8>()).prop_map(|(at, v)| ListEdit::Replace(at, v)),
        Just(ListEdit::SwitchTemplate),
        Just(ListEdit::Touch),
        Just(ListEdit::Flush),
    ]
}

fn numbered(v: u8) -> Value {
    item(&format!("{v},"))
}

proptest! {
    #[test]
    fn interleaved_edits_match_a_fresh_render(
        edits in prop::collection::vec(list_edit(), 0..24),
        recycle in any::<bool>(),
    ) {
        enable_array_observation();
        let plain = name_template();
        let bracketed = html(&["[", "]"], [prop("name")]).unwrap();
        let list = items(&["a", "b"]);
        let m = model()
            .with("items", list.clone())
            .with("template", plain.clone())
            .with("kind", 0_i32);
        let template = switchable_list(recycle);
        let (host, _view) = render(&template, &m);

        let mut touches: i32 = 0;
        let mut use_brackets = false;
        for edit in edits {
            let len = list.len();
            match edit {
                ListEdit::Push(v) => list.push(numbered(v)),
                ListEdit::Insert(at, v) => list.insert(at % (len + 1), numbered(v)),
                ListEdit::Remove(at) => {
                    if len > 0 {
                        list.remove(at % len);
                    }
                }
                ListEdit::Replace(at, v) => {
                    if len > 0 {
                        list.set(at % len, numbered(v));
                    }
                }
                ListEdit::SwitchTemplate => {
                    use_brackets = !use_brackets;
                    let next = if use_brackets { bracketed.clone() } else { plain.clone() };
                    m.set("template", next);
                }
                ListEdit::Touch => {
                    touches += 1;
                    m.set("kind", touches);
                }
                ListEdit::Flush => {
                    updates::process();
                }
            }
        }
        updates::settle();

        let (fresh, _fresh_view) = render(&template, &m);
        prop_assert_eq!(host.text_content(), fresh.text_content());
    }
}

#[test]
fn nested_repeats_reach_the_root_through_parent_contexts() {
    enable_array_observation();
    define_property("Branch", "children");
    const N: usize = 3;
    let leaf = html(
        &["<i>", "</i>"],
        [bind(|_, c| {
            Ok(c.parent_context()
                .map(|outer| outer.parent().get("name"))
                .unwrap_or_default())
        })],
    )
    .unwrap();
    let branch = html(
        &["<ul>", "</ul>"],
        [Interpolation::from(repeat(prop("children"), leaf))],
    )
    .unwrap();
    let branches = ObservableArray::from_values((0..N).map(|_| {
        Object::new("Branch").with("children", ObservableArray::from_values(0..N as i32))
    }));
    let m = model().with("name", "root").with("items", branches);
    let (host, _view) = render(&list_template(branch), &m);

    let leaves = host.to_html().matches("<i>root</i>").count();
    assert_eq!(leaves, N * N);
}

#[test]
fn repeat_requires_array_observation() {
    set_array_observer_factory(None);
    let m = model().with("items", items(&["a"]));
    let host = Node::element("div");
    let err = list_template(name_template())
        .render(&Value::from(m), &host)
        .unwrap_err();
    assert!(matches!(err, Error::ArrayObservationDisabled));
}

#[test]
fn tracked_array_length_requires_array_observation() {
    set_array_observer_factory(None);
    let binding: BindingFn = Rc::new(|x, _| {
        Ok(x.get("items").as_array().map_or(0, length_of).into())
    });
    let observer = BindingObserver::new(binding, false, || Ok(()));
    let m = model().with("items", items(&["a"]));
    let result = observer.observe(&Value::from(m), &ExecutionContext::new());
    assert!(matches!(result, Err(Error::ArrayObservationDisabled)));
}

#[test]
fn array_length_is_observable() {
    enable_array_observation();
    let list = items(&["a"]);
    let m = model().with("items", list.clone());
    let template = html(
        &["<p>", "</p>"],
        [bind(|x, _| Ok(x.get("items").as_array().map_or(0, length_of).into()))],
    )
    .unwrap();
    let (host, _view) = render(&template, &m);
    assert_eq!(host.text_content(), "1");
    list.push(item("b"));
    updates::settle();
    assert_eq!(host.text_content(), "2");
}
