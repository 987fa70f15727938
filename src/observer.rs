use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    str::FromStr,
};

use crate::{
    document::{LinkDocument, ReadyState},
    error::Error,
    matcher::Matcher,
};

/// Something that changed what page the document shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The document finished loading.
    Ready,
    /// History back/forward.
    Traverse,
    /// A new history entry was pushed.
    Push,
    /// The current history entry was replaced.
    Replace,
}

impl Navigation {
    /// Push and replace are reported as soon as the call returns, before the
    /// page has had a chance to update, so their pass runs on the next turn.
    pub fn is_deferred(self) -> bool {
        matches!(self, Self::Push | Self::Replace)
    }
}

impl FromStr for Navigation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ready" | "DOMContentLoaded" => Self::Ready,
            "traverse" | "popstate" => Self::Traverse,
            "push" | "pushState" => Self::Push,
            "replace" | "replaceState" => Self::Replace,
            _ => return Err(Error::UnknownNavigation(s.to_owned())),
        })
    }
}

pub type NavigationCallback = Box<dyn FnMut(Navigation)>;
pub type Task = Box<dyn FnOnce()>;

/// A host that reports navigations to whoever subscribed.
pub trait NavigationSource {
    fn subscribe(&self, callback: NavigationCallback);
}

/// Posts work to run after the current turn of the event loop.
pub trait Scheduler {
    fn defer(&self, task: Task);
}

/// In-process [`NavigationSource`]: the host calls [`emit`] after each
/// navigation it performs.
///
/// [`emit`]: NavigationHub::emit
#[derive(Default)]
pub struct NavigationHub {
    subscribers: RefCell<Vec<NavigationCallback>>,
}

impl NavigationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call every subscriber with `navigation`. Subscribers added while
    /// emitting only hear later navigations, and an `emit` from inside a
    /// subscriber reaches nobody.
    pub fn emit(&self, navigation: Navigation) {
        let mut subscribers = self.subscribers.take();
        tracing::trace!(?navigation, subscribers = subscribers.len(), "emit");
        for callback in subscribers.iter_mut() {
            callback(navigation);
        }
        let mut slot = self.subscribers.borrow_mut();
        subscribers.append(&mut slot);
        *slot = subscribers;
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl NavigationSource for NavigationHub {
    fn subscribe(&self, callback: NavigationCallback) {
        self.subscribers.borrow_mut().push(callback);
    }
}

/// FIFO [`Scheduler`] drained by the host with [`run_pending`].
///
/// [`run_pending`]: TaskQueue::run_pending
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the tasks queued so far, oldest first. Tasks they defer wait for
    /// the next call. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let count = self.tasks.borrow().len();
        for _ in 0..count {
            let Some(task) = self.tasks.borrow_mut().pop_front() else {
                break;
            };
            task();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl Scheduler for TaskQueue {
    fn defer(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

/// Keeps the active/ancestor classes of a document in sync with its
/// location as the host navigates.
pub struct ActiveLinks<D> {
    matcher: Rc<Matcher>,
    document: Rc<RefCell<D>>,
    awaiting_ready: Rc<Cell<bool>>,
}

impl<D> Clone for ActiveLinks<D> {
    fn clone(&self) -> Self {
        Self {
            matcher: Rc::clone(&self.matcher),
            document: Rc::clone(&self.document),
            awaiting_ready: Rc::clone(&self.awaiting_ready),
        }
    }
}

impl<D: LinkDocument + 'static> ActiveLinks<D> {
    pub fn new(matcher: Matcher, document: Rc<RefCell<D>>) -> Self {
        Self {
            matcher: Rc::new(matcher),
            document,
            awaiting_ready: Rc::new(Cell::new(false)),
        }
    }

    pub fn document(&self) -> &Rc<RefCell<D>> {
        &self.document
    }

    /// Run a matching pass now against the document's current location.
    pub fn refresh(&self) {
        let Ok(mut document) = self.document.try_borrow_mut() else {
            tracing::warn!("document busy, skipping pass");
            return;
        };
        let location = document.location();
        self.matcher.apply(&mut *document, &location);
    }

    /// Run the first pass (now, or once loading ends) and follow every
    /// navigation `source` reports afterwards.
    pub fn start(&self, source: &impl NavigationSource, scheduler: Rc<dyn Scheduler>) {
        let loading = self.document.borrow().ready_state() == ReadyState::Loading;
        if loading {
            self.awaiting_ready.set(true);
        } else {
            self.refresh();
        }

        let this = self.clone();
        source.subscribe(Box::new(move |navigation| {
            this.on_navigation(navigation, scheduler.as_ref())
        }));
    }

    fn on_navigation(&self, navigation: Navigation, scheduler: &dyn Scheduler) {
        tracing::debug!(?navigation, "navigation");
        match navigation {
            Navigation::Ready => {
                if self.awaiting_ready.replace(false) {
                    self.refresh();
                }
            }
            Navigation::Traverse => self.refresh(),
            Navigation::Push | Navigation::Replace => {
                let this = self.clone();
                scheduler.defer(Box::new(move || this.refresh()));
            }
        }
    }
}
