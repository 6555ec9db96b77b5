//! State

use std::sync::Arc;

use stockroom_app::{
    context::AppContext,
    domain::{
        carts::CartsService, lifecycle::LifecycleService, orders::OrdersService,
        seckill::SeckillService,
    },
};

use crate::auth::JwtKeys;

#[derive(Clone)]
pub(crate) struct State {
    pub(crate) carts: Arc<dyn CartsService>,
    pub(crate) orders: Arc<dyn OrdersService>,
    pub(crate) lifecycle: Arc<dyn LifecycleService>,
    pub(crate) seckill: Arc<dyn SeckillService>,
    pub(crate) jwt: JwtKeys,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("jwt", &self.jwt)
            .finish_non_exhaustive()
    }
}

impl State {
    #[must_use]
    pub(crate) fn new(
        carts: Arc<dyn CartsService>,
        orders: Arc<dyn OrdersService>,
        lifecycle: Arc<dyn LifecycleService>,
        seckill: Arc<dyn SeckillService>,
        jwt: JwtKeys,
    ) -> Self {
        Self {
            carts,
            orders,
            lifecycle,
            seckill,
            jwt,
        }
    }

    #[must_use]
    pub(crate) fn from_app_context(app: &AppContext, jwt: JwtKeys) -> Arc<Self> {
        Arc::new(Self::new(
            app.carts.clone(),
            app.orders.clone(),
            app.lifecycle.clone(),
            app.seckill.clone(),
            jwt,
        ))
    }
}
