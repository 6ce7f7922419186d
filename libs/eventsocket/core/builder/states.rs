/// Type-state markers for the builder pattern
///
/// These types track at compile time whether a configuration source has
/// been provided, so a client without one cannot be built.

use std::marker::PhantomData;

/// Marker trait for configuration source state
pub trait SourceState {}

/// Configuration source has not been set
pub struct NoSource;
impl SourceState for NoSource {}

/// Configuration source has been set
pub struct HasSource;
impl SourceState for HasSource {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<S> {
    _source: PhantomData<S>,
}

impl<S> TypeState<S> {
    pub(crate) fn new() -> Self {
        Self {
            _source: PhantomData,
        }
    }
}

impl<S> Default for TypeState<S> {
    fn default() -> Self {
        Self::new()
    }
}
