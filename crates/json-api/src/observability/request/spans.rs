//! Route classification for request spans and metrics.
//!
//! Numeric path segments are ids. They are lifted into span attributes and
//! replaced with placeholders so route labels stay low-cardinality.

/// Functional area a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Area {
    Cart,
    Orders,
    Seckill,
    Platform,
}

impl Area {
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Orders => "orders",
            Self::Seckill => "seckill",
            Self::Platform => "platform",
        }
    }

    fn of(first_segment: &str) -> Self {
        match first_segment {
            "cart" => Self::Cart,
            "orders" => Self::Orders,
            "seckill" => Self::Seckill,
            _ => Self::Platform,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RequestRoute {
    pub(super) area: Area,
    /// Path with ids replaced by named placeholders, e.g. `/orders/{order}/payment`.
    pub(super) template: String,
    pub(super) order: Option<String>,
    pub(super) sku: Option<String>,
}

impl RequestRoute {
    pub(super) fn classify(path: &str) -> Self {
        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let area = segments.first().map_or(Area::Platform, |first| Area::of(first));

        let mut template = String::new();
        let mut order = None;
        let mut sku = None;

        for segment in &segments {
            template.push('/');

            if !is_numeric_id(segment) {
                template.push_str(segment);
                continue;
            }

            if area == Area::Orders {
                template.push_str("{order}");
                order = Some((*segment).to_owned());
            } else {
                template.push_str("{sku}");
                sku = Some((*segment).to_owned());
            }
        }

        if template.is_empty() {
            template.push('/');
        }

        Self {
            area,
            template,
            order,
            sku,
        }
    }

    pub(super) fn span_name(&self, method: &str) -> String {
        format!("{method} {}", self.template)
    }
}

fn is_numeric_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_become_order_attributes() {
        let route = RequestRoute::classify("/orders/1790000000000000123/payment");

        assert_eq!(route.area, Area::Orders);
        assert_eq!(route.template, "/orders/{order}/payment");
        assert_eq!(route.order.as_deref(), Some("1790000000000000123"));
        assert_eq!(route.sku, None);
        assert_eq!(route.span_name("POST"), "POST /orders/{order}/payment");
    }

    #[test]
    fn cart_and_seckill_ids_are_skus() {
        let cart = RequestRoute::classify("/cart/101");
        let seckill = RequestRoute::classify("/seckill/purchases/501");

        assert_eq!((cart.area, cart.template.as_str()), (Area::Cart, "/cart/{sku}"));
        assert_eq!(cart.sku.as_deref(), Some("101"));
        assert_eq!(seckill.template, "/seckill/purchases/{sku}");
        assert_eq!(seckill.sku.as_deref(), Some("501"));
    }

    #[test]
    fn named_routes_are_kept_verbatim() {
        assert_eq!(RequestRoute::classify("/cart/count").template, "/cart/count");
        assert_eq!(RequestRoute::classify("/healthcheck").area, Area::Platform);
        assert_eq!(RequestRoute::classify("/").template, "/");
    }
}
