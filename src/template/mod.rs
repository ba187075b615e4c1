//! Templates, views and the directives that connect them to data.
//!
//! A [`ViewTemplate`] is compiled once, from markup via [`html`] or from a
//! fragment and directive list via [`ViewTemplate::from_parts`]. Each call to
//! [`ViewTemplate::create`] clones the fragment into a [`View`] with one
//! [`Behavior`] per directive. Binding the view to a source connects every
//! behavior; unbinding disconnects them and leaves the nodes in place.

mod behavior;
mod binding;
mod binding_behavior;
mod markup;
mod repeat;
#[allow(clippy::module_inception)]
mod template;
mod view;

pub use behavior::{Aspect, Behavior, HtmlDirective};
pub use binding::{
    AssignFn, Binding, BindingMode, ConvertFn, TwoWayOptions, bind, one_time, prop, signal,
    two_way, two_way_prop,
};
pub use binding_behavior::BindingDirective;
pub use markup::{Interpolation, html};
pub use repeat::{RepeatDirective, RepeatOptions, repeat};
pub use template::{DirectiveDescriptor, TargetPath, ViewTemplate};
pub use view::View;
