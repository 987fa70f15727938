//! Browser bindings, built with the `wasm` feature.
//!
//! The module starts itself when loaded: links are marked once the document
//! is ready and again after every back/forward navigation. Client-side
//! routers report their own history pushes and replaces:
//!
//! ```javascript,ignore
//! import init, { notifyNavigation } from './active_links.js';
//!
//! await init();
//! history.pushState({}, '', '/docs/intro');
//! notifyNavigation('push');
//! ```

use std::{cell::RefCell, rc::Rc};

use wasm_bindgen::prelude::*;
use web_sys::{Element, EventTarget, HtmlAnchorElement, HtmlAreaElement};

use crate::{
    document::{LinkDocument, ReadyState},
    matcher::Matcher,
    observer::{ActiveLinks, Navigation, NavigationHub, Scheduler, Task},
};

thread_local! {
    static HUB: NavigationHub = NavigationHub::new();
    static ACTIVE: RefCell<Option<ActiveLinks<WebDocument>>> = const { RefCell::new(None) };
}

/// The live page.
pub struct WebDocument {
    document: web_sys::Document,
}

impl LinkDocument for WebDocument {
    type Element = Element;

    fn location(&self) -> String {
        self.document
            .location()
            .and_then(|l| l.href().ok())
            .unwrap_or_default()
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_dom(&self.document.ready_state())
    }

    fn links(&self) -> Vec<Element> {
        let links = self.document.links();
        (0..links.length()).filter_map(|i| links.item(i)).collect()
    }

    fn href(&self, link: &Element) -> Option<String> {
        if let Some(anchor) = link.dyn_ref::<HtmlAnchorElement>() {
            Some(anchor.href())
        } else if let Some(area) = link.dyn_ref::<HtmlAreaElement>() {
            Some(area.href())
        } else {
            link.get_attribute("href")
        }
    }

    fn query_selector_all(&self, selectors: &str) -> Vec<Element> {
        match self.document.query_selector_all(selectors) {
            Ok(list) => (0..list.length())
                .filter_map(|i| list.item(i))
                .filter_map(|node| node.dyn_into::<Element>().ok())
                .collect(),
            Err(err) => {
                tracing::warn!(selectors, ?err, "querySelectorAll failed");
                Vec::new()
            }
        }
    }

    fn add_class(&mut self, element: &Element, class: &str) {
        if let Err(err) = element.class_list().add_1(class) {
            tracing::warn!(class, ?err, "classList.add failed");
        }
    }

    fn remove_classes(&mut self, element: &Element, classes: &[&str]) {
        let list = element.class_list();
        for class in classes {
            if let Err(err) = list.remove_1(class) {
                tracing::warn!(class, ?err, "classList.remove failed");
            }
        }
    }
}

/// Defers tasks with `setTimeout(task, 0)`.
struct TimeoutScheduler {
    window: web_sys::Window,
}

impl Scheduler for TimeoutScheduler {
    fn defer(&self, task: Task) {
        let callback = Closure::once_into_js(move || task());
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 0)
        {
            tracing::warn!(?err, "setTimeout failed, pass dropped");
        }
    }
}

fn listen(target: &EventTarget, event: &str, navigation: Navigation) -> Result<(), JsValue> {
    let callback = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
        HUB.with(|hub| hub.emit(navigation))
    });
    target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
    // Listeners live as long as the page.
    callback.forget();
    Ok(())
}

fn try_start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    listen(&window, "popstate", Navigation::Traverse)?;
    if ReadyState::from_dom(&document.ready_state()) == ReadyState::Loading {
        listen(&document, "DOMContentLoaded", Navigation::Ready)?;
    }

    let links = ActiveLinks::new(
        Matcher::default(),
        Rc::new(RefCell::new(WebDocument { document })),
    );
    let scheduler = Rc::new(TimeoutScheduler { window });
    HUB.with(|hub| links.start(hub, scheduler));
    ACTIVE.with(|active| *active.borrow_mut() = Some(links));
    Ok(())
}

/// Hook the page up. Runs once, when the module loads.
#[wasm_bindgen(start)]
pub fn start() {
    if let Err(err) = try_start() {
        tracing::warn!(?err, "active links not started");
    }
}

/// Re-mark the links against the current location right away.
#[wasm_bindgen]
pub fn refresh() {
    ACTIVE.with(|active| {
        if let Some(links) = active.borrow().as_ref() {
            links.refresh();
        }
    });
}

/// Report a navigation the page performed itself: `"push"`, `"replace"`,
/// `"traverse"` or `"ready"` (the `pushState`/`replaceState`/`popstate`
/// spellings work too).
#[wasm_bindgen(js_name = notifyNavigation)]
pub fn notify_navigation(kind: &str) -> Result<(), JsValue> {
    let navigation: Navigation = kind
        .parse()
        .map_err(|err: crate::Error| JsValue::from_str(&err.to_string()))?;
    HUB.with(|hub| hub.emit(navigation));
    Ok(())
}
