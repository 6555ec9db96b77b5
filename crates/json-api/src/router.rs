//! App Router

use salvo::Router;

use crate::{auth, carts, orders, seckill};

pub fn app_router() -> Router {
    Router::new()
        .hoop(auth::middleware::handler)
        .push(
            Router::with_path("cart")
                .get(carts::index::handler)
                .post(carts::upsert::handler)
                .push(Router::with_path("count").get(carts::count::handler))
                .push(Router::with_path("selection").put(carts::selection::handler))
                .push(Router::with_path("{sku}").delete(carts::delete::handler)),
        )
        .push(
            Router::with_path("orders")
                .post(orders::submit::handler)
                .push(Router::with_path("presubmit").post(orders::presubmit::handler))
                .push(
                    Router::with_path("{order}")
                        .get(orders::get::handler)
                        .delete(orders::delete::handler)
                        .push(Router::with_path("payment").post(orders::payment::handler)),
                ),
        )
        .push(
            Router::with_path("seckill")
                .push(Router::with_path("skus").get(seckill::index::handler))
                .push(
                    Router::with_path("purchases")
                        .post(seckill::admit::handler)
                        .push(Router::with_path("{sku}").get(seckill::status::handler)),
                ),
        )
}
