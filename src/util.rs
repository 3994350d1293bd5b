//! Internal utility types and functions.

use std::marker::PhantomData;

/// Used to force a type to be `!Sync`.
pub type PhantomUnsync = PhantomData<std::cell::Cell<()>>;
