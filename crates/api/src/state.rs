//! Shared application state.

use std::sync::Arc;

use domain::{CatalogService, CoordinatorConfig, ReservationCoordinator};
use store::BookstoreStore;

/// Services shared by all handlers. Both wrap the same store, so stock
/// seen by the catalog is the stock the coordinator moves.
pub struct AppState<S: BookstoreStore> {
    pub catalog: CatalogService<S>,
    pub reservations: ReservationCoordinator<S>,
}

impl<S: BookstoreStore + Clone> AppState<S> {
    pub fn new(store: S, config: CoordinatorConfig) -> Arc<Self> {
        Arc::new(Self {
            catalog: CatalogService::with_config(store.clone(), config),
            reservations: ReservationCoordinator::with_config(store, config),
        })
    }
}
