#![forbid(unsafe_code)]

//! End-to-end command flows: a button control dispatching its command model,
//! dirty-form confirmation around it, and the logs of refused executions.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tracing_subscriber::layer::{Context, SubscriberExt};
use weft_command::{
    ChangeHandler, CheckScope, CommandModel, DirtyConfirmation, ExecutabilitySwitch,
    ExecutableState,
};
use weft_core::ResKey;
use weft_runtime::{
    Command, CommandArguments, Control, ControlCommand, DisplayContext, FnControlCommand,
    FrameScope, HandlerResult, HtmlWriter, LocalScope, command_map, view_fn,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn counter_model(runs: Rc<Cell<u32>>) -> Rc<CommandModel> {
    CommandModel::new(Rc::new(move |_: &mut DisplayContext| {
        runs.set(runs.get() + 1);
        HandlerResult::new()
    }))
}

/// A button control whose `click` command executes the invoking model.
fn button(model: Rc<CommandModel>) -> Rc<Control> {
    let click = FnControlCommand::new(
        "click",
        |ctx: &mut DisplayContext, _: &Control, args: &CommandArguments| {
            match args.invoking_model::<CommandModel>() {
                Some(model) => model.execute(ctx),
                None => HandlerResult::error(ResKey::constant("button.noModel")),
            }
        },
    );
    let label = model.button().label().unwrap_or_default();
    Control::with_commands(
        view_fn(move |_, out, control| {
            out.begin_tag("button");
            control.write_control_attributes(out);
            out.text(&label);
            out.end_tag();
            Ok(())
        }),
        command_map(None, [Rc::new(click) as Rc<dyn ControlCommand>]),
    )
}

fn click(frame: &FrameScope, ctx: &mut DisplayContext, model: &Rc<CommandModel>) -> HandlerResult {
    let args = model.invoking_arguments(CommandArguments::new());
    frame
        .dispatch_command(ctx, &"c1".into(), "click", &args)
        .unwrap()
}

fn rendered(model: &Rc<CommandModel>) -> (Rc<FrameScope>, Rc<Control>) {
    let frame = FrameScope::new("main");
    let root = LocalScope::root(frame.clone());
    let control = button(model.clone());
    let mut ctx = DisplayContext::with_scope(root);
    let mut out = HtmlWriter::new();
    control.write(&mut ctx, &mut out);
    (frame, control)
}

struct Editor {
    changed: Cell<bool>,
}

impl ChangeHandler for Editor {
    fn is_changed(&self) -> bool {
        self.changed.get()
    }

    fn description(&self) -> ResKey {
        ResKey::constant("editor")
    }

    fn apply_command(&self) -> Option<Rc<dyn Command>> {
        None
    }

    fn discard_command(&self) -> Option<Rc<dyn Command>> {
        Some(Rc::new(|_: &mut DisplayContext| HandlerResult::new()))
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────────

#[test]
fn click_runs_executable_model() {
    let runs = Rc::new(Cell::new(0));
    let model = counter_model(runs.clone());
    let (frame, _button) = rendered(&model);

    let result = click(&frame, &mut DisplayContext::new(), &model);
    assert!(result.is_success());
    assert_eq!(runs.get(), 1);
}

#[test]
fn dynamic_source_disables_click() {
    let runs = Rc::new(Cell::new(0));
    let model = counter_model(runs.clone());
    let switch = Rc::new(ExecutabilitySwitch::default());
    model.set_executability(Some(switch.clone()));
    let (frame, _button) = rendered(&model);

    switch.set_state(ExecutableState::Disabled(ResKey::constant("no.selection")));
    let result = click(&frame, &mut DisplayContext::new(), &model);
    assert_eq!(result.errors(), [ResKey::constant("no.selection")]);
    assert_eq!(runs.get(), 0);
}

#[test]
fn dirty_editor_defers_click_until_discarded() {
    let runs = Rc::new(Cell::new(0));
    let model = counter_model(runs.clone());
    let editor: Rc<dyn ChangeHandler> = Rc::new(Editor {
        changed: Cell::new(true),
    });
    model.set_check_scope(Some(Rc::new(vec![editor]) as Rc<dyn CheckScope>));
    let (frame, _button) = rendered(&model);

    let mut ctx = DisplayContext::new();
    let result = click(&frame, &mut ctx, &model);
    assert!(result.is_suspended());
    assert_eq!(runs.get(), 0);

    let (_, confirmation) = ctx.window().dialogs_of::<DirtyConfirmation>().pop().unwrap();
    assert_eq!(confirmation.pending(), [ResKey::constant("editor")]);
    let resolved = confirmation.discard(&mut ctx);
    assert!(resolved.is_success());
    assert_eq!(runs.get(), 1);
    assert!(!ctx.skip_dirty_handling());
}

// ── Logging ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    fields: HashMap<String, String>,
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor(HashMap<String, String>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor(HashMap::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            fields: visitor.0,
        });
    }
}

#[test]
fn refused_execution_is_logged() {
    let model = counter_model(Rc::new(Cell::new(0)));
    model.button().set_label(Some("Save".into()));
    model.set_visible(false);

    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        events: events.clone(),
    });
    tracing::subscriber::with_default(subscriber, || {
        let result = model.execute(&mut DisplayContext::new());
        assert!(!result.is_success());
    });

    let events = events.lock().unwrap();
    let warning = events
        .iter()
        .find(|e| e.level == tracing::Level::WARN)
        .expect("warning logged");
    assert_eq!(warning.fields.get("state").map(String::as_str), Some("hidden"));
    assert!(warning.fields["label"].contains("Save"));
}
