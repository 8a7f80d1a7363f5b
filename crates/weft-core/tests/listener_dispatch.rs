#![forbid(unsafe_code)]

//! Dispatch behaviour of property events across a chain of observables.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use weft_core::event::listener;
use weft_core::{Bubble, EventType, ObservableBase, PropertyListener, notify_bubbling};

struct Field {
    name: &'static str,
}

const VALUE: EventType<Field, i32> = EventType::new("value");

type Log = Rc<RefCell<Vec<String>>>;

fn recording(log: &Log, tag: &'static str, answer: Bubble) -> Rc<PropertyListener<Field, i32>> {
    let log = log.clone();
    listener(move |field: &Field, old: &i32, new: &i32| {
        log.borrow_mut().push(format!("{tag}:{}:{old}->{new}", field.name));
        answer
    })
}

#[test]
fn event_bubbles_until_stopped() {
    let log: Log = Rc::default();
    let (field, group, form) = (ObservableBase::new(), ObservableBase::new(), ObservableBase::new());
    field.add_property_listener(&VALUE, recording(&log, "field", Bubble::Bubble));
    group.add_property_listener(&VALUE, recording(&log, "group", Bubble::Stop));
    form.add_property_listener(&VALUE, recording(&log, "form", Bubble::Bubble));

    let sender = Field { name: "age" };
    let result = notify_bubbling([&field, &group, &form], &VALUE, &sender, &1, &2);

    assert_eq!(result, Bubble::Stop);
    assert_eq!(*log.borrow(), ["field:age:1->2", "group:age:1->2"]);
}

#[test]
fn listener_removing_itself_does_not_skip_others() {
    let log: Log = Rc::default();
    let observable = Rc::new(ObservableBase::new());
    let slot: Rc<RefCell<Option<Rc<PropertyListener<Field, i32>>>>> = Rc::default();

    let once = {
        let (log, slot, observable) = (log.clone(), slot.clone(), Rc::downgrade(&observable));
        listener(move |_: &Field, _: &i32, _: &i32| {
            log.borrow_mut().push("once".into());
            if let (Some(me), Some(observable)) = (slot.borrow().as_ref(), observable.upgrade()) {
                observable.remove_property_listener(&VALUE, me);
            }
            Bubble::Bubble
        })
    };
    *slot.borrow_mut() = Some(once.clone());
    observable.add_property_listener(&VALUE, once);
    observable.add_property_listener(&VALUE, recording(&log, "after", Bubble::Bubble));

    let sender = Field { name: "x" };
    observable.notify_listeners(&VALUE, &sender, &0, &1);
    observable.notify_listeners(&VALUE, &sender, &1, &2);

    assert_eq!(*log.borrow(), ["once", "after:x:0->1", "after:x:1->2"]);
}

#[test]
fn first_panic_resurfaces_after_all_listeners_ran() {
    let log: Log = Rc::default();
    let observable = ObservableBase::new();
    observable.add_property_listener(
        &VALUE,
        listener(|_: &Field, _: &i32, _: &i32| -> Bubble { panic!("first") }),
    );
    observable.add_property_listener(
        &VALUE,
        listener(|_: &Field, _: &i32, _: &i32| -> Bubble { panic!("second") }),
    );
    observable.add_property_listener(&VALUE, recording(&log, "last", Bubble::Bubble));

    let sender = Field { name: "x" };
    let payload = catch_unwind(AssertUnwindSafe(|| {
        observable.notify_listeners(&VALUE, &sender, &0, &1)
    }))
    .unwrap_err();

    assert_eq!(weft_core::panic_message(payload.as_ref()), "first");
    assert_eq!(*log.borrow(), ["last:x:0->1"]);
}
