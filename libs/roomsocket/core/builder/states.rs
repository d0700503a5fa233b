/// Type-state markers for the builder pattern
///
/// These types track at compile time whether the connection
/// parameters have been supplied.
use std::marker::PhantomData;

/// Marker trait for connection-config state
pub trait ConfigState {}

/// Connection config has not been set
pub struct NoConfig;
impl ConfigState for NoConfig {}

/// Connection config has been set
pub struct HasConfig;
impl ConfigState for HasConfig {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<C> {
    _config: PhantomData<C>,
}

impl<C> TypeState<C> {
    pub(crate) fn new() -> Self {
        Self { _config: PhantomData }
    }
}

impl<C> Default for TypeState<C> {
    fn default() -> Self {
        Self::new()
    }
}
