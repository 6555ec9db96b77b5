//! Test helpers.

use std::sync::Arc;

use salvo::{affix_state::inject, prelude::*};
use stockroom_app::{
    domain::{
        carts::MockCartsService, lifecycle::MockLifecycleService, orders::MockOrdersService,
        seckill::MockSeckillService,
    },
    ids::UserId,
};

use crate::{auth::JwtKeys, extensions::*, state::State};

pub(crate) const TEST_USER: UserId = UserId::from_i64(7);

pub(crate) const TEST_JWT_SECRET: &str = "test-secret";

#[salvo::handler]
pub(crate) async fn inject_user(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    depot.insert_user_id(TEST_USER);
    ctrl.call_next(req, depot, res).await;
}

fn strict_carts_mock() -> MockCartsService {
    let mut carts = MockCartsService::new();

    carts.expect_add_or_update().never();
    carts.expect_remove().never();
    carts.expect_set_selected().never();
    carts.expect_list().never();
    carts.expect_count().never();
    carts.expect_remove_lines().never();

    carts
}

fn strict_orders_mock() -> MockOrdersService {
    let mut orders = MockOrdersService::new();

    orders.expect_create_pre_submit_order().never();
    orders.expect_is_order_number_live().never();
    orders.expect_create_submit_order().never();
    orders.expect_get_order().never();

    orders
}

fn strict_lifecycle_mock() -> MockLifecycleService {
    let mut lifecycle = MockLifecycleService::new();

    lifecycle.expect_schedule_timeout().never();
    lifecycle.expect_confirm_payment().never();
    lifecycle.expect_delete_order().never();

    lifecycle
}

fn strict_seckill_mock() -> MockSeckillService {
    let mut seckill = MockSeckillService::new();

    seckill.expect_list_skus().never();
    seckill.expect_admit().never();
    seckill.expect_purchase_status().never();

    seckill
}

fn state(
    carts: MockCartsService,
    orders: MockOrdersService,
    lifecycle: MockLifecycleService,
    seckill: MockSeckillService,
) -> Arc<State> {
    Arc::new(State::new(
        Arc::new(carts),
        Arc::new(orders),
        Arc::new(lifecycle),
        Arc::new(seckill),
        JwtKeys::from_secret(TEST_JWT_SECRET),
    ))
}

pub(crate) fn strict_state() -> Arc<State> {
    state(
        strict_carts_mock(),
        strict_orders_mock(),
        strict_lifecycle_mock(),
        strict_seckill_mock(),
    )
}

fn service(state: Arc<State>, route: Router) -> Service {
    Service::new(
        Router::new()
            .hoop(inject(state))
            .hoop(inject_user)
            .push(route),
    )
}

pub(crate) fn carts_service(carts: MockCartsService, route: Router) -> Service {
    service(
        state(
            carts,
            strict_orders_mock(),
            strict_lifecycle_mock(),
            strict_seckill_mock(),
        ),
        route,
    )
}

pub(crate) fn orders_service(
    orders: MockOrdersService,
    lifecycle: MockLifecycleService,
    route: Router,
) -> Service {
    service(
        state(strict_carts_mock(), orders, lifecycle, strict_seckill_mock()),
        route,
    )
}

pub(crate) fn seckill_service(seckill: MockSeckillService, route: Router) -> Service {
    service(
        state(
            strict_carts_mock(),
            strict_orders_mock(),
            strict_lifecycle_mock(),
            seckill,
        ),
        route,
    )
}

/// A lifecycle mock that must not be touched, for order routes that only read.
pub(crate) fn untouched_lifecycle() -> MockLifecycleService {
    strict_lifecycle_mock()
}
