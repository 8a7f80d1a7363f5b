#![forbid(unsafe_code)]

//! Core: listener registries, property events and resource keys.
//!
//! Everything observable in weft (controls, button models, executability
//! sources) embeds an [`ObservableBase`] and announces changes through typed
//! [`EventType`] descriptors. Listeners are held by identity, dispatch always
//! iterates a defensive copy, and a listener that detaches itself while an
//! event is being delivered never disturbs the remaining deliveries.

pub mod event;
pub mod logging;
pub mod observable;
pub mod res_key;

pub use event::{
    Bubble, EventType, INVALIDATION_EVENT, InvalidationListener, PropertyListener,
    notify_bubbling,
};
pub use observable::{ListenerKey, ObservableBase, PropertyObservable, panic_message};
pub use res_key::ResKey;
