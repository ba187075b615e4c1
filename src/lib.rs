#![deny(missing_docs)]

//! Fine-grained observation, template bindings and list reconciliation for
//! web-component views.
//!
//! State lives in observable [`Object`]s and [`ObservableArray`]s. Templates
//! compiled with [`html`] are instantiated into [`View`]s whose bindings
//! observe exactly the properties they read and update the DOM through a
//! batched, deduplicated [update queue](updates).
//!
//! # Quick Start
//!
//! ```ignore
//! use filament::{Object, Value, define_property, html, prop, updates};
//! use filament::dom::Node;
//!
//! define_property("Greeting", "name");
//! let greeting = Object::new("Greeting").with("name", "world");
//!
//! let template = html(&["<p>Hello ", "!</p>"], [prop("name")])?;
//! let host = Node::element("div");
//! let view = template.render(&Value::from(greeting.clone()), &host)?;
//! assert_eq!(host.text_content(), "Hello world!");
//!
//! greeting.set("name", "there");
//! updates::process();
//! assert_eq!(host.text_content(), "Hello there!");
//! ```
//!
//! # Observation
//!
//! ```ignore
//! define_type("Person", Some("Named"));          // accessors inherit
//! define_property("Person", Accessor::new("age").on_changed(|obj, old, new| { ... }));
//! person.get("age");                             // tracked read
//! person.set("age", 42);                         // notifies if changed
//! length_of(&array);                             // tracked array length
//! track_volatile();                              // branchy binding, re-discover reads
//! untracked(|| person.get("age"));               // read without subscribing
//! ```
//!
//! # Arrays
//!
//! Arrays can only be observed once an observer factory is registered, which
//! keeps splice bookkeeping out of programs that never bind to lists:
//!
//! ```ignore
//! enable_array_observation();
//! let items = ObservableArray::from_values(["a", "b"]);
//! let list = html(&["<ul>", "</ul>"], [repeat(prop("items"), item_template)])?;
//! items.splice(0, 1, ["x".into(), "y".into()]);
//! updates::process();   // one flush applies the splice to the rendered views
//! ```
//!
//! # Updates
//!
//! ```ignore
//! updates::process();                            // run one flush
//! updates::settle();                             // flush until idle
//! updates::next().await;                         // wait for the next flush
//! updates::configure().mode(UpdateMode::Sync).install();
//! ```

mod context;
pub mod dom;
mod error;
mod hash;
pub mod observation;
pub mod template;
pub mod updates;
mod value;

// Core types
pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use value::Value;

pub use observation::{
    Accessor, BindingObserver, ObservableArray, Object, Splice, define_property, define_type,
    enable_array_observation, length_of, send_signal, set_array_observer_factory, track,
    track_volatile, untracked,
};
pub use template::{
    Aspect, Binding, RepeatOptions, View, ViewTemplate, bind, html, one_time, prop, repeat,
    signal, two_way, two_way_prop,
};
pub use updates::{FlushReport, UpdateMode};

#[cfg(test)]
mod tests;
