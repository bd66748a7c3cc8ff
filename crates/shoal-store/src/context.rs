use std::sync::Arc;

use shoal_shape::TypeStore;

/// Process-wide collaborators, built once by the process bootstrap and
/// passed down to every [`Group`](crate::Group) and store handle.
#[derive(Clone, Debug)]
pub struct ProcessContext {
    types: Arc<TypeStore>,
}

impl ProcessContext {
    /// Build the context for this process.
    pub fn bootstrap() -> Self {
        Self {
            types: TypeStore::instance(),
        }
    }

    /// The process's type interning store.
    pub fn types(&self) -> &Arc<TypeStore> {
        &self.types
    }
}
