/// Loading state of a document, mirroring `document.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    /// Read a `document.readyState` string. Anything unrecognised counts as
    /// complete so a pass is never held back.
    pub fn from_dom(state: &str) -> Self {
        match state {
            "loading" => Self::Loading,
            "interactive" => Self::Interactive,
            _ => Self::Complete,
        }
    }
}

/// The view of a document the matcher needs: its location, its hyperlinks,
/// and a way to change class lists.
///
/// `Element` is a cheap handle to a node of the document, e.g. an index or
/// a reference-counted DOM node.
pub trait LinkDocument {
    type Element: Clone;

    /// Absolute URL of the page.
    fn location(&self) -> String;

    fn ready_state(&self) -> ReadyState {
        ReadyState::Complete
    }

    /// Every `a` and `area` element carrying an `href`, in document order.
    fn links(&self) -> Vec<Self::Element>;

    /// The link target, either absolute or relative to [`location`].
    ///
    /// [`location`]: LinkDocument::location
    fn href(&self, link: &Self::Element) -> Option<String>;

    /// Elements matching a CSS selector list, in document order.
    fn query_selector_all(&self, selectors: &str) -> Vec<Self::Element>;

    fn add_class(&mut self, element: &Self::Element, class: &str);

    fn remove_classes(&mut self, element: &Self::Element, classes: &[&str]);
}
