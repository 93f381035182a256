//! Hooks run when records are constructed, created and updated.
//!
//! Behaviors are attached to a model with
//! [`ModelDef::behavior`](crate::ModelDef::behavior) and run in the order they
//! were attached.

mod guid;
mod local;
mod token;

pub use guid::GuidBehavior;
pub use local::{Event, LocalBehavior};
pub use token::TokenBehavior;

use crate::orm::Lookup;
use crate::record::Record;
use sqlrecord_core::Result;

/// A hook on the record lifecycle.
pub trait Behavior: Send + Sync {
    /// Called when a record is constructed, before `lookup` is applied.
    ///
    /// Returning `false` stops construction: later behaviors do not run and
    /// the lookup is not applied. A behavior that loads the record itself
    /// has the same effect.
    fn on_construct(&self, _record: &mut Record, _lookup: Option<&Lookup>) -> Result<bool> {
        Ok(true)
    }

    /// Called before a record is inserted.
    fn on_create(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }

    /// Called before a record is updated, even when nothing changed.
    fn on_update(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }
}
