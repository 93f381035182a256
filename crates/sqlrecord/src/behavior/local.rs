use super::Behavior;
use crate::orm::Lookup;
use crate::record::Record;
use sqlrecord_core::Result;

/// Lifecycle event passed to a [`LocalBehavior`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Construct,
    Create,
    Update,
}

impl Event {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Event::Construct => "construct",
            Event::Create => "create",
            Event::Update => "update",
        }
    }
}

type LocalCallback = dyn Fn(Event, Option<&Lookup>) -> Option<bool> + Send + Sync;

/// A behavior backed by a closure.
///
/// The closure gets the event and, on construct, the lookup. Its result only
/// matters on construct: `Some(false)` stops construction, anything else
/// lets it continue.
///
/// ```rust,ignore
/// let def = ModelDef::new("post").behavior(LocalBehavior::new(|event, _| {
///     tracing::info!(event = event.as_str(), "post lifecycle");
///     None
/// }));
/// ```
pub struct LocalBehavior {
    callback: Box<LocalCallback>,
}

impl LocalBehavior {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Event, Option<&Lookup>) -> Option<bool> + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl Behavior for LocalBehavior {
    fn on_construct(&self, _record: &mut Record, lookup: Option<&Lookup>) -> Result<bool> {
        Ok((self.callback)(Event::Construct, lookup).unwrap_or(true))
    }

    fn on_create(&self, _record: &mut Record) -> Result<()> {
        (self.callback)(Event::Create, None);
        Ok(())
    }

    fn on_update(&self, _record: &mut Record) -> Result<()> {
        (self.callback)(Event::Update, None);
        Ok(())
    }
}
